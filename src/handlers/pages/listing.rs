//! 创作者列表页：首页、分类页与国家页，中英两种语言共用一套渲染流程

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Datelike, Utc};
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, error, warn};

use crate::core::state::AppState;
use crate::core::upstream::{ilike_any, ProfileQuery, CARD_COLUMNS, POPULAR_ORDER};
use crate::error::{SiteError, SiteResult};
use crate::handlers::{found, page_offset, plain, HtmlPage, PAGE_CACHE};
use crate::models::catalog::CountryLocale;
use crate::models::{CategoryFilters, Config, Creator, Row};
use crate::theme::locale::hreflang_links;
use crate::theme::{anchors, jsonld, Injector, Locale};
use crate::utils::{escape_attr, escape_html, responsive_sources, script_json};

/// 分类页与国家页每页条数
pub const LISTING_PAGE_SIZE: u64 = 50;
pub const HOME_POPULAR_LIMIT: u64 = 25;
pub const HOME_NEWEST_LIMIT: u64 = 25;

const MATCH_COLUMNS: [&str; 4] = ["username", "name", "about", "location"];
const HOME_COLUMNS: &str =
    "id,username,name,avatar,avatar_c144,isverified,subscribeprice,favoritedcount,subscriberscount,joindate";

/// 列表页类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingKind {
    Home,
    Category { slug: String, page: u64 },
    Country { slug: String, page: u64 },
}

pub async fn render_listing(state: &AppState, kind: ListingKind, locale: Locale) -> Response {
    match kind {
        ListingKind::Home => home(state, locale).await,
        ListingKind::Category { slug, page } => category(state, &slug, page, locale).await,
        ListingKind::Country { slug, page } => country(state, &slug, page, locale).await,
    }
}

/// 各语言的模板路径：英文在根目录，西语在 `es/` 下
pub fn localized_template(locale: Locale, name: &str) -> String {
    match locale {
        Locale::En => name.to_string(),
        Locale::Es => format!("es/{}", name),
    }
}

// ---------------------------------------------------------------------------
// 首页
// ---------------------------------------------------------------------------

async fn home(state: &AppState, locale: Locale) -> Response {
    let path = localized_template(locale, "index.html");
    let template = match state.templates.get(&path).await {
        Ok(template) => template,
        Err(e) => {
            error!(page = "home", "无法读取模板 {}: {}", path, e);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    if !state.store.is_configured() {
        return HtmlPage::new(&*template).into_response();
    }

    match render_home(state, &template, locale).await {
        Ok(page) => page.into_response(),
        Err(e) => {
            warn!(page = "home", error = %e, "首页渲染失败，返回静态模板");
            HtmlPage::new(&*template).into_response()
        }
    }
}

async fn render_home(state: &AppState, template: &str, locale: Locale) -> SiteResult<HtmlPage> {
    let popular = ProfileQuery::new()
        .select(HOME_COLUMNS)
        .order("favoritedcount.desc")
        .limit(HOME_POPULAR_LIMIT);
    let newest = ProfileQuery::new()
        .select(HOME_COLUMNS)
        .order("joindate.desc")
        .limit(HOME_NEWEST_LIMIT);
    let (popular, newest) =
        tokio::try_join!(state.store.fetch(&popular), state.store.fetch(&newest))?;

    let creators = dedupe_by_id(popular.rows.iter().chain(newest.rows.iter()));
    debug!(count = creators.len(), "home creators fetched");

    let base = state.base_url();
    let canonical = format!("{}{}", base, locale.path("/"));
    let list_name = match locale {
        Locale::En => format!("The Best OnlyFans Creators ({})", year()),
        Locale::Es => format!("Las Mejores Creadoras de OnlyFans ({})", year()),
    };
    let json_ld = jsonld::scripts(&[
        jsonld::website(
            &state.config.site.name,
            &canonical,
            &format!("{}/?q={{search_term_string}}", base),
            locale.code(),
        ),
        jsonld::item_list(
            &list_name,
            Some(canonical.as_str()),
            creators.len(),
            &top_items(&creators, &state.config),
        ),
    ]);
    let hydration = json!({
        "count": creators.len(),
        "hasMore": true,
        "updatedAt": locale.format_date_short(&Utc::now().format("%Y-%m-%d").to_string()),
    });
    let head = head_block(&[
        lcp_preload(&creators).unwrap_or_default(),
        json_ld,
        format!("<script>window.__HOME_SSR={};</script>", script_json(&hydration)),
        hreflang_links(&format!("{}/", base), &format!("{}/es/", base)),
    ]);
    let cards = state.fragments.creator_cards(&creators, locale, &state.config)?;

    let mut page = Injector::new("home", template);
    page.replace(
        &anchors::BODY_OPEN,
        &format!("<body data-ssr=\"true\" data-initial-creators=\"{}\"", creators.len()),
    )
    .replace(&anchors::CANONICAL, &canonical)
    .insert_before(&anchors::HEAD_END, &head);
    if !creators.is_empty() {
        page.replace(&anchors::RESULTS_GRID, &grid(&cards));
    }
    Ok(HtmlPage::rendered(page.finish()).cache(PAGE_CACHE))
}

// ---------------------------------------------------------------------------
// 分类页
// ---------------------------------------------------------------------------

async fn category(state: &AppState, slug: &str, page: u64, locale: Locale) -> Response {
    let slug = slug.trim().to_lowercase();
    if slug.is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Missing slug");
    }
    let fallback = locale.path("/category.html");
    if !state.store.is_configured() {
        return found(&fallback);
    }

    match render_category(state, &slug, page.max(1), locale).await {
        Ok(page) => page.into_response(),
        Err(e) => {
            error!(page = "category", slug = %slug, error = %e, "分类页渲染失败");
            found(&fallback)
        }
    }
}

async fn render_category(
    state: &AppState,
    slug: &str,
    page: u64,
    locale: Locale,
) -> SiteResult<HtmlPage> {
    let resolved = state.catalog.resolve(slug);
    let (creators, total) =
        fetch_matching(state, &resolved.terms, resolved.filters.as_ref(), page).await?;
    let template = state
        .templates
        .get(&localized_template(locale, "category.html"))
        .await?;

    let base = state.base_url();
    let section = format!("/categories/{}/", urlencoding::encode(slug));
    let links = LocalizedLinks::new(base, &section, page, locale);
    let has_more = creators.len() as u64 == LISTING_PAGE_SIZE;
    let copy = ListingCopy::category(locale, &resolved.label, total, page, &state.config.site.name);
    let labels = locale.labels();

    let home_url = format!("{}{}", base, locale.path("/"));
    let hub_url = format!("{}{}", base, locale.path("/categories/"));
    let json_ld = jsonld::scripts(&[
        jsonld::breadcrumb(&[
            (labels.home, home_url.as_str()),
            (labels.categories, hub_url.as_str()),
            (resolved.label.as_str(), links.canonical.as_str()),
        ]),
        jsonld::item_list(
            &copy.list_name,
            Some(links.canonical.as_str()),
            creators.len(),
            &top_items(&creators, &state.config),
        ),
    ]);
    let hydration = json!({"slug": slug, "count": total, "hasMore": has_more, "page": page});
    let head = head_block(&[
        lcp_preload(&creators).unwrap_or_default(),
        json_ld,
        format!("<script>window.__CATEGORY_SSR={};</script>", script_json(&hydration)),
        links.hreflang(),
        links.pagination(has_more),
    ]);
    let body = results_markup(state, &creators, locale, &copy)?;

    let mut injector = Injector::new("category", &*template);
    injector
        .replace(&anchors::TITLE, &escape_html(&copy.title))
        .replace(&anchors::META_DESCRIPTION, &escape_attr(&copy.description))
        .replace(&anchors::CANONICAL, &escape_attr(&links.canonical))
        .insert_before(&anchors::HEAD_END, &head)
        .replace(&anchors::CATEGORY_H1, &escape_html(&copy.h1))
        .replace(&anchors::CATEGORY_SUBTITLE, &escape_html(&copy.subtitle))
        .replace(&anchors::RESULTS_GRID, &grid(&body));
    Ok(HtmlPage::rendered(injector.finish()).cache(PAGE_CACHE))
}

// ---------------------------------------------------------------------------
// 国家页
// ---------------------------------------------------------------------------

async fn country(state: &AppState, name: &str, page: u64, locale: Locale) -> Response {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Missing country name");
    }
    let Some(country) = state.catalog.country(&name) else {
        debug!(country = %name, "未知国家，跳转首页");
        return found(&locale.path("/"));
    };
    let fallback = format!("/{}", country.locale(locale).template.trim_start_matches('/'));
    if !state.store.is_configured() {
        return found(&fallback);
    }

    match render_country(state, &name, page.max(1), locale).await {
        Ok(page) => page.into_response(),
        Err(e) => {
            error!(page = "country", country = %name, error = %e, "国家页渲染失败");
            found(&fallback)
        }
    }
}

async fn render_country(
    state: &AppState,
    name: &str,
    page: u64,
    locale: Locale,
) -> SiteResult<HtmlPage> {
    let country = state
        .catalog
        .country(name)
        .ok_or_else(|| SiteError::Config {
            message: format!("unknown country {}", name),
        })?;
    let local = country.locale(locale);
    let (creators, total) = fetch_matching(state, &country.terms, None, page).await?;
    let template = state
        .templates
        .get(local.template.trim_start_matches('/'))
        .await?;

    let base = state.base_url();
    let section = format!("/country/{}/", name);
    let links = LocalizedLinks::new(base, &section, page, locale);
    let has_more = creators.len() as u64 == LISTING_PAGE_SIZE;
    let copy = ListingCopy::country(locale, local, page, &state.config.site.name);
    let labels = locale.labels();

    let home_url = format!("{}{}", base, locale.path("/"));
    let countries_url = format!("{}{}", base, locale.path("/country/"));
    let json_ld = jsonld::scripts(&[
        jsonld::breadcrumb(&[
            (labels.home, home_url.as_str()),
            (labels.countries, countries_url.as_str()),
            (local.label.as_str(), links.canonical.as_str()),
        ]),
        jsonld::item_list(
            &copy.list_name,
            Some(links.canonical.as_str()),
            creators.len(),
            &top_items(&creators, &state.config),
        ),
    ]);
    let hydration = json!({"name": name, "count": total, "hasMore": has_more, "page": page});
    let head = head_block(&[
        lcp_preload(&creators).unwrap_or_default(),
        json_ld,
        format!("<script>window.__COUNTRY_SSR={};</script>", script_json(&hydration)),
        links.hreflang(),
        links.pagination(has_more),
    ]);
    let body = results_markup(state, &creators, locale, &copy)?;

    let mut injector = Injector::new("country", &*template);
    injector.replace_or_insert(
        &anchors::CANONICAL,
        &escape_attr(&links.canonical),
        &anchors::HEAD_END,
        &format!("<link rel=\"canonical\" href=\"{}\">", escape_attr(&links.canonical)),
    );
    injector.replace(&anchors::TITLE, &escape_html(&copy.title));
    if page == 1 {
        injector.replace(&anchors::META_DESCRIPTION, &escape_attr(&copy.description));
    }
    if !copy.h1.is_empty() {
        injector.try_replace(&anchors::PAGE_H1, &escape_html(&copy.h1));
    }
    injector
        .insert_before(&anchors::HEAD_END, &head)
        .replace(&anchors::RESULTS_GRID, &grid(&body));
    Ok(HtmlPage::rendered(injector.finish()).cache(PAGE_CACHE))
}

// ---------------------------------------------------------------------------
// 共用部分
// ---------------------------------------------------------------------------

/// 页面文案
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCopy {
    pub title: String,
    pub description: String,
    pub h1: String,
    pub subtitle: String,
    /// 无结果时的提示，`{label}` 已转义
    pub empty: String,
    pub list_name: String,
}

impl ListingCopy {
    pub fn category(locale: Locale, label: &str, total: u64, page: u64, site: &str) -> Self {
        let year = year();
        let safe_label = escape_html(label);
        match locale {
            Locale::En => {
                let count = if total > 0 { format!("{}+", total) } else { "top".to_string() };
                let page_label = page_suffix(page, "Page");
                let page_note = if page > 1 { format!(" Page {}.", page) } else { String::new() };
                Self {
                    title: format!("Best {} OnlyFans Creators{} ({}) | {}", label, page_label, year, site),
                    description: format!(
                        "Browse {} {} OnlyFans creators on {}. Filter by verified status, bundles, and price.{}",
                        count, label, site, page_note
                    ),
                    h1: format!("Best OnlyFans {} Creators", label),
                    subtitle: format!(
                        "Explore top {} OnlyFans creators. Use filters to find verified models, free accounts, and bundle deals.",
                        label
                    ),
                    empty: format!("No results found for <strong>{}</strong>.", safe_label),
                    list_name: format!("Best {} OnlyFans Creators", label),
                }
            }
            Locale::Es => {
                let count = if total > 0 { format!("{}+", total) } else { "las mejores".to_string() };
                let page_label = page_suffix(page, "Página");
                let page_note = if page > 1 { format!(" Página {}.", page) } else { String::new() };
                Self {
                    title: format!("Mejores Creadoras de OnlyFans {}{} ({}) | {}", label, page_label, year, site),
                    description: format!(
                        "Explora {} creadoras de OnlyFans de {} en {}. Filtra por verificadas, paquetes y precio.{}",
                        count, label, site, page_note
                    ),
                    h1: format!("Mejores Creadoras de OnlyFans {}", label),
                    subtitle: format!(
                        "Explora las mejores modelos de OnlyFans de {}. Usa filtros para refinar tus resultados.",
                        label
                    ),
                    empty: format!("No se encontraron creadoras de <strong>{}</strong>.", safe_label),
                    list_name: format!("Mejores Creadoras de OnlyFans de {}", label),
                }
            }
        }
    }

    pub fn country(locale: Locale, local: &CountryLocale, page: u64, site: &str) -> Self {
        let year = year();
        let label = &local.label;
        let safe_label = escape_html(label);
        let (default_title, page_word, list_name, empty) = match locale {
            Locale::En => (
                format!("Best {} OnlyFans Creators", label),
                "Page",
                format!("Best {} OnlyFans Creators ({})", label, year),
                format!("No creators found from <strong>{}</strong>.", safe_label),
            ),
            Locale::Es => (
                format!("Mejores Creadoras de OnlyFans en {}", label),
                "Página",
                format!("Mejores Creadoras de OnlyFans en {} ({})", label, year),
                format!("No se encontraron creadoras de <strong>{}</strong>.", safe_label),
            ),
        };
        let prefix = local
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or(default_title);
        Self {
            title: format!("{}{} ({}) | {}", prefix, page_suffix(page, page_word), year, site),
            description: local.meta_description.clone(),
            h1: local.h1.clone(),
            subtitle: String::new(),
            empty,
            list_name,
        }
    }
}

/// canonical、hreflang 与分页链接
#[derive(Debug, Clone)]
struct LocalizedLinks {
    canonical: String,
    en_url: String,
    es_url: String,
    section: String,
    page: u64,
}

impl LocalizedLinks {
    fn new(base: &str, section: &str, page: u64, locale: Locale) -> Self {
        let en_url = page_url(&format!("{}{}", base, section), page);
        let es_url = page_url(&format!("{}{}", base, Locale::Es.path(section)), page);
        Self {
            canonical: match locale {
                Locale::En => en_url.clone(),
                Locale::Es => es_url.clone(),
            },
            section: format!("{}{}", base, locale.path(section)),
            en_url,
            es_url,
            page,
        }
    }

    fn hreflang(&self) -> String {
        hreflang_links(&escape_attr(&self.en_url), &escape_attr(&self.es_url))
    }

    fn pagination(&self, has_more: bool) -> String {
        let mut links = Vec::new();
        if self.page > 1 {
            links.push(format!(
                "<link rel=\"prev\" href=\"{}\">",
                escape_attr(&page_url(&self.section, self.page - 1))
            ));
        }
        if has_more {
            links.push(format!(
                "<link rel=\"next\" href=\"{}\">",
                escape_attr(&page_url(&self.section, self.page + 1))
            ));
        }
        links.join("\n")
    }
}

/// 第一页就是栏目地址，其余在后面追加 `N/`
pub fn page_url(section: &str, page: u64) -> String {
    if page > 1 {
        format!("{}{}/", section, page)
    } else {
        section.to_string()
    }
}

fn page_suffix(page: u64, word: &str) -> String {
    if page > 1 {
        format!(" - {} {}", word, page)
    } else {
        String::new()
    }
}

fn year() -> i32 {
    Utc::now().year()
}

async fn fetch_matching(
    state: &AppState,
    terms: &[String],
    filters: Option<&CategoryFilters>,
    page: u64,
) -> SiteResult<(Vec<Creator>, u64)> {
    let mut query = ProfileQuery::new()
        .select(CARD_COLUMNS)
        .order(POPULAR_ORDER)
        .limit(LISTING_PAGE_SIZE)
        .offset(page_offset(page, LISTING_PAGE_SIZE))
        .or(&ilike_any(&MATCH_COLUMNS, terms))
        .with_count();
    if let Some(filters) = filters {
        if let Some(max_price) = filters.max_price {
            query = query.filter("subscribeprice", &format!("lte.{}", max_price));
        }
        if filters.verified {
            query = query.filter("isverified", "eq.true");
        }
        if filters.bundles {
            query = query.filter("bundle1_price", "gt.0");
        }
    }

    match state.store.fetch(&query).await {
        Ok(result) => {
            let total = result.total_or_len();
            Ok((creators_from(&result.rows), total))
        }
        Err(SiteError::RangeNotSatisfiable) => {
            debug!(page, "offset 超出结果集，按空页处理");
            Ok((Vec::new(), 0))
        }
        Err(e) => Err(e),
    }
}

fn creators_from(rows: &[Row]) -> Vec<Creator> {
    rows.iter().filter_map(Creator::from_row).collect()
}

/// 按 id 去重，保留先出现的
fn dedupe_by_id<'a>(rows: impl Iterator<Item = &'a Row>) -> Vec<Creator> {
    let mut seen = HashSet::new();
    rows.filter_map(Creator::from_row)
        .filter(|c| {
            let key = if c.id.is_null() {
                format!("@{}", c.username)
            } else {
                c.id.to_string()
            };
            seen.insert(key)
        })
        .collect()
}

/// 结构化数据里的前 10 位创作者
fn top_items(creators: &[Creator], config: &Config) -> Vec<(String, String)> {
    creators
        .iter()
        .take(10)
        .map(|c| (c.display_name().to_string(), config.profile_url(&c.username)))
        .collect()
}

/// 首张卡片图片的预加载
fn lcp_preload(creators: &[Creator]) -> Option<String> {
    let avatar = creators.first()?.avatar_url();
    if !avatar.starts_with("http") {
        return None;
    }
    let sources = responsive_sources(avatar);
    Some(format!(
        "<link rel=\"preload\" as=\"image\" fetchpriority=\"high\" href=\"{}\" imagesrcset=\"{}\" imagesizes=\"{}\">",
        escape_attr(&sources.src),
        escape_attr(&sources.srcset),
        sources.sizes
    ))
}

fn results_markup(
    state: &AppState,
    creators: &[Creator],
    locale: Locale,
    copy: &ListingCopy,
) -> SiteResult<String> {
    if creators.is_empty() {
        return Ok(format!(
            "<p class=\"text-muted text-center w-100 py-4\">{}</p>",
            copy.empty
        ));
    }
    state.fragments.creator_cards(creators, locale, &state.config)
}

fn head_block(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

fn grid(inner: &str) -> String {
    format!("\n{}\n", inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_urls_and_links() {
        assert_eq!(page_url("https://a/categories/x/", 1), "https://a/categories/x/");
        assert_eq!(page_url("https://a/categories/x/", 3), "https://a/categories/x/3/");

        let links = LocalizedLinks::new("https://a", "/categories/x/", 2, Locale::Es);
        assert_eq!(links.canonical, "https://a/es/categories/x/2/");
        assert_eq!(links.en_url, "https://a/categories/x/2/");
        assert_eq!(
            links.pagination(true),
            "<link rel=\"prev\" href=\"https://a/es/categories/x/\">\n\
             <link rel=\"next\" href=\"https://a/es/categories/x/3/\">"
        );
        assert_eq!(LocalizedLinks::new("https://a", "/c/", 1, Locale::En).pagination(false), "");

        let quoted = LocalizedLinks::new("https://a", "/c/x\"y/", 2, Locale::En);
        assert!(quoted.hreflang().contains("href=\"https://a/c/x&quot;y/2/\""));
        assert!(quoted.pagination(false).contains("href=\"https://a/c/x&quot;y/\""));
    }

    #[test]
    fn category_copy_per_locale() {
        let en = ListingCopy::category(Locale::En, "Big Cats", 120, 2, "Demo");
        assert!(en.title.starts_with("Best Big Cats OnlyFans Creators - Page 2 ("));
        assert!(en.title.ends_with(") | Demo"));
        assert!(en.description.starts_with("Browse 120+ Big Cats"));
        assert!(en.description.ends_with(" Page 2."));

        let es = ListingCopy::category(Locale::Es, "<b>", 0, 1, "Demo");
        assert!(es.description.starts_with("Explora las mejores creadoras"));
        assert!(es.empty.contains("&lt;b&gt;"));
        assert_eq!(es.h1, "Mejores Creadoras de OnlyFans <b>");
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let rows: Vec<Row> = [
            json!({"id": 1, "username": "a"}),
            json!({"id": 2, "username": "b"}),
            json!({"id": 1, "username": "a-again"}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        let creators = dedupe_by_id(rows.iter());
        let names: Vec<_> = creators.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn templates_are_localized() {
        assert_eq!(localized_template(Locale::En, "index.html"), "index.html");
        assert_eq!(localized_template(Locale::Es, "category.html"), "es/category.html");
    }
}
