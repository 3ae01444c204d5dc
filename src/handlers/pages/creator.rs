//! 创作者详情页
//!
//! 按用户名（不区分大小写）查询一条记录，整页由片段模板生成。查询有单独的
//! 超时；查不到、超时或上游未配置都返回 404 页面。

use axum::http::header::{ETAG, VARY};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::core::state::AppState;
use crate::core::upstream::ProfileQuery;
use crate::error::SiteResult;
use crate::handlers::{plain, HtmlPage};
use crate::models::Creator;
use crate::theme::jsonld;
use crate::theme::renderer::{format_price, ProfileView, StatView};
use crate::utils::{escape_html, format_count, proxy_image, script_json, truncate_chars};

pub const PROFILE_CACHE: &str = "public, max-age=0, s-maxage=3600, stale-while-revalidate=86400";
pub const NOT_FOUND_CACHE: &str = "public, max-age=300, s-maxage=300";

/// 渲染失败时附带的响应头
pub const RENDER_ERROR_HEADER: &str = "x-render-error";

const PREVIEW_CHARS: usize = 155;

static ESCAPED_BR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)&lt;br\s*/?&gt;").expect("hardcoded br regex is invalid - fix source code")
});
static NEWLINES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\r?\n)+").expect("hardcoded newline regex is invalid - fix source code")
});
static TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^>]*>").expect("hardcoded tag regex is invalid - fix source code")
});
static SPACES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("hardcoded whitespace regex is invalid - fix source code")
});

pub async fn creator_page(state: &AppState, username: &str, if_none_match: Option<&str>) -> Response {
    let username = username.trim().trim_start_matches('@');
    if username.is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Username required");
    }

    if !super::is_valid_username(username) {
        debug!(username, "用户名含非法字符");
        return not_found(state, username);
    }

    let Some(creator) = lookup(state, username).await else {
        return not_found(state, username);
    };

    let etag = etag_for(&creator);
    if if_none_match.is_some_and(|value| value.trim() == etag) {
        debug!(username, "etag 命中");
        return (StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response();
    }

    match render_profile(state, &creator) {
        Ok(html) => HtmlPage::new(html)
            .cache(PROFILE_CACHE)
            .header(ETAG, etag)
            .header(VARY, "Accept-Encoding")
            .into_response(),
        Err(e) => {
            error!(username, error = %e, "详情页渲染失败");
            render_error(state, username)
        }
    }
}

async fn lookup(state: &AppState, username: &str) -> Option<Creator> {
    if !state.store.is_configured() {
        return None;
    }
    let timeout = state.creator_timeout();
    let query = ProfileQuery::new()
        .select("*")
        .filter("username", &format!("ilike.{}", escape_like(username)))
        .limit(1)
        .timeout(timeout);

    match tokio::time::timeout(timeout, state.store.fetch(&query)).await {
        Ok(Ok(page)) => page.rows.first().and_then(Creator::from_row),
        Ok(Err(e)) => {
            warn!(username, error = %e, "查询创作者失败");
            None
        }
        Err(_) => {
            warn!(username, timeout_ms = timeout.as_millis() as u64, "查询创作者超时");
            None
        }
    }
}

/// `_` 在 ilike 中匹配任意单个字符，转义后只做不区分大小写的精确匹配
pub fn escape_like(name: &str) -> String {
    name.replace('\\', "\\\\")
        .replace('_', "\\_")
        .replace('%', "\\%")
        .replace('*', "\\*")
}

fn not_found(state: &AppState, username: &str) -> Response {
    match state
        .fragments
        .creator_not_found(username, &state.config.site.name)
    {
        Ok(html) => HtmlPage::new(html)
            .status(StatusCode::NOT_FOUND)
            .cache(NOT_FOUND_CACHE)
            .into_response(),
        Err(_) => plain(StatusCode::NOT_FOUND, "Creator not found"),
    }
}

fn render_error(state: &AppState, username: &str) -> Response {
    let target = format!("/creator.html?username={}", urlencoding::encode(username));
    match state.fragments.fallback_redirect(&target) {
        Ok(html) => HtmlPage::new(html)
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(HeaderName::from_static(RENDER_ERROR_HEADER), "true")
            .into_response(),
        Err(_) => plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
    }
}

fn render_profile(state: &AppState, creator: &Creator) -> SiteResult<String> {
    let config = &state.config;
    let name = creator.display_name();
    let about = creator.about.as_deref().unwrap_or("");
    let price = format_price(creator.subscribe_price)
        .map(|p| format!("{}/month", p))
        .unwrap_or_else(|| "Free".to_string());
    let count = |n: Option<u64>| format_count(n.unwrap_or(0));

    let avatar = creator.avatar_url();
    let og_image = proxy_image(avatar, 1200, 630);
    let canonical = config.absolute_url(&format!("/{}", urlencoding::encode(&creator.username)));
    let modified = creator
        .last_seen_at
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    let page = ProfileView {
        display_name: name.to_string(),
        username: creator.username.clone(),
        meta_description: meta_description(creator, &price),
        og_image: og_image.clone(),
        avatar_thumb: proxy_image(avatar, 400, 400),
        header_image: creator
            .header
            .as_deref()
            .map(|h| proxy_image(h, 1600, 360))
            .unwrap_or_default(),
        profile_url: config.profile_url(&creator.username),
        profile_host: url::Url::parse(&config.site.profile_url_prefix)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_default(),
        verified: creator.is_verified,
        stats: vec![
            StatView { label: "Posts", value: count(creator.posts_count) },
            StatView { label: "Photos", value: count(creator.photos_count) },
            StatView { label: "Videos", value: count(creator.videos_count) },
            StatView { label: "Favorites", value: count(creator.favorited_count) },
        ],
        bio_html: bio_html(about),
        json_ld: script_json(&jsonld::profile_page(creator, &og_image, &canonical, &modified)),
        hydration: script_json(creator),
        canonical_url: canonical,
        price,
    };
    state.fragments.creator_profile(&page)
}

/// 简介转义后保留换行
pub fn bio_html(about: &str) -> String {
    let escaped = escape_html(about.trim());
    let with_breaks = ESCAPED_BR.replace_all(&escaped, "<br>");
    NEWLINES.replace_all(&with_breaks, "<br>").into_owned()
}

/// 去掉标签后的简介摘要
pub fn bio_preview(about: &str) -> String {
    let text = TAGS.replace_all(about, " ");
    let text = SPACES.replace_all(&text, " ");
    truncate_chars(text.trim(), PREVIEW_CHARS)
}

fn meta_description(creator: &Creator, price: &str) -> String {
    let count = |n: Option<u64>| format_count(n.unwrap_or(0));
    let description = format!(
        "{} OnlyFans profile. {} posts • {} photos • {} videos. Subscribe for {}. {}",
        creator.display_name(),
        count(creator.posts_count),
        count(creator.photos_count),
        count(creator.videos_count),
        price,
        bio_preview(creator.about.as_deref().unwrap_or(""))
    );
    description.trim_end().to_string()
}

/// 以最后活跃时间生成 ETag
pub fn etag_for(creator: &Creator) -> String {
    let stamp = creator
        .last_seen_at
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    let encoded = base64::engine::general_purpose::STANDARD.encode(stamp.as_bytes());
    format!("\"{}\"", encoded.chars().take(16).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creator(value: serde_json::Value) -> Creator {
        Creator::from_row(value.as_object().expect("object")).expect("creator")
    }

    #[test]
    fn bio_keeps_line_breaks_but_escapes_markup() {
        assert_eq!(
            bio_html("hi <b>there</b>\n\nnew line<br/>x"),
            "hi &lt;b&gt;there&lt;/b&gt;<br>new line<br>x"
        );
    }

    #[test]
    fn preview_strips_tags_and_truncates() {
        assert_eq!(bio_preview("<p>Hello</p>   <i>world</i>"), "Hello world");
        let long = "a".repeat(400);
        assert!(bio_preview(&long).chars().count() <= PREVIEW_CHARS + 3);
    }

    #[test]
    fn meta_description_mentions_counts_and_price() {
        let c = creator(json!({
            "username": "jane",
            "name": "Jane",
            "postscount": 1200,
            "photoscount": 3,
            "videoscount": 0,
            "about": "Hi!"
        }));
        assert_eq!(
            meta_description(&c, "Free"),
            "Jane OnlyFans profile. 1,200 posts • 3 photos • 0 videos. Subscribe for Free. Hi!"
        );
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("maria_co"), "maria\\_co");
        assert_eq!(escape_like("jane"), "jane");
        assert_eq!(escape_like("a*b%"), "a\\*b\\%");
    }

    #[test]
    fn etag_is_stable_for_same_activity() {
        let c = creator(json!({"username": "jane", "last_seen_at": "2026-01-05T10:00:00Z"}));
        let tag = etag_for(&c);
        assert_eq!(tag, etag_for(&c));
        assert_eq!(tag.len(), 18);
        assert!(tag.starts_with('"') && tag.ends_with('"'));
    }
}
