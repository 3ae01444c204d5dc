use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::core::blog::is_valid_slug;
use crate::core::state::AppState;
use crate::error::SiteResult;
use crate::handlers::{plain, HtmlPage, PAGE_CACHE};
use crate::models::{BlogPost, PostSummary};
use crate::theme::locale::hreflang_links;
use crate::theme::renderer::{ArticleView, BlogCardView, HeroImage};
use crate::theme::{anchors, jsonld, Injector, Locale};
use crate::utils::{escape_attr, escape_html, proxy_image_full, script_json};

/// 列表页直接渲染的卡片数，其余由前端加载
pub const BLOG_CARDS: usize = 9;
const JSONLD_POSTS: usize = 10;
const JSONLD_ITEMS: usize = 20;

/// 博客列表页
pub async fn blog_list(state: &AppState, locale: Locale) -> Response {
    let template = match state.templates.get("blog.html").await {
        Ok(template) => template,
        Err(e) => {
            error!(page = "blog", "无法读取模板 blog.html: {}", e);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Blog template not found");
        }
    };

    let posts = match state.blog.list().await {
        Ok(posts) => posts,
        Err(e) => {
            warn!(page = "blog", error = %e, "读取文章失败，返回静态模板");
            return HtmlPage::new(&*template).into_response();
        }
    };

    match render_list(state, &template, &posts, locale) {
        Ok(page) => page.into_response(),
        Err(e) => {
            warn!(page = "blog", error = %e, "博客列表渲染失败，返回静态模板");
            HtmlPage::new(&*template).into_response()
        }
    }
}

/// 列表页标题与描述
pub fn list_copy(locale: Locale, site: &str, count: usize, year: i32) -> (String, String) {
    match locale {
        Locale::En => (
            format!(
                "{} Blog — {} Articles on OnlyFans Tips & Creator News ({})",
                site, count, year
            ),
            format!(
                "Browse {} articles on OnlyFans creators, tips, guides and news. Updated weekly.",
                count
            ),
        ),
        Locale::Es => (
            format!(
                "Blog de {} — {} Artículos sobre OnlyFans y Creadoras ({})",
                site, count, year
            ),
            format!(
                "Descubre {} artículos sobre creadoras de OnlyFans, consejos, guías y noticias. Actualizado semanalmente.",
                count
            ),
        ),
    }
}

fn render_list(
    state: &AppState,
    template: &str,
    posts: &[PostSummary],
    locale: Locale,
) -> SiteResult<HtmlPage> {
    let base = state.base_url();
    let site = &state.config.site.name;
    let canonical = format!("{}{}", base, locale.path("/blog/"));
    let post_url = |slug: &str| format!("{}{}", base, locale.path(&format!("/blog/{}/", slug)));
    let (title, description) = list_copy(locale, site, posts.len(), Utc::now().year());

    let cards = posts
        .iter()
        .take(BLOG_CARDS)
        .enumerate()
        .map(|(i, post)| {
            state.fragments.blog_card(&BlogCardView {
                url: post_url(&post.slug),
                image: (!post.featured_image.is_empty())
                    .then(|| proxy_image_full(&post.featured_image, 600, 338)),
                image_alt: post.featured_image_alt.clone(),
                emoji: post.emoji.clone(),
                tag: post.category_label.clone(),
                title: post.title.clone(),
                excerpt: post.excerpt.clone(),
                date: locale.format_date_short(&post.date),
                read_time: post.read_time.clone(),
                eager: i == 0,
            })
        })
        .collect::<SiteResult<Vec<_>>>()?
        .join("\n");

    let postings: Vec<Value> = posts
        .iter()
        .take(JSONLD_POSTS)
        .map(|post| {
            jsonld::blog_posting(
                &post.title,
                &post_url(&post.slug),
                &post.date,
                &post.excerpt,
                site,
                &post.featured_image,
            )
        })
        .collect();
    let items: Vec<(String, String)> = posts
        .iter()
        .take(JSONLD_ITEMS)
        .map(|post| (post.title.clone(), post_url(&post.slug)))
        .collect();
    let home = format!("{}/", base);
    let json_ld = jsonld::scripts(&[
        jsonld::blog(
            &format!("{} Blog", site),
            &canonical,
            &description,
            locale.code(),
            (site.as_str(), home.as_str()),
            &postings,
        ),
        jsonld::item_list(
            &format!("{} Blog", site),
            Some(canonical.as_str()),
            posts.len(),
            &items,
        ),
    ]);

    let head = [
        social_meta("website", &title, &description, &canonical, None),
        hreflang_links(&format!("{}/blog/", base), &format!("{}/es/blog/", base)),
        json_ld,
        format!("<script>window.__BLOG_SSR_POSTS={};</script>", script_json(posts)),
    ]
    .join("\n");

    let mut page = Injector::new("blog", template);
    if locale == Locale::Es {
        page.replace(&anchors::HTML_OPEN, "<!DOCTYPE html>\n<html lang=\"es\">");
    }
    page.replace(&anchors::TITLE, &escape_html(&title))
        .replace(&anchors::META_DESCRIPTION, &escape_attr(&description))
        .replace(&anchors::CANONICAL, &canonical)
        .insert_before(&anchors::HEAD_END, &head)
        .replace(&anchors::BLOG_GRID, &format!("\n{}\n", cards));
    Ok(HtmlPage::rendered(page.finish()).cache(PAGE_CACHE))
}

/// 博客文章页
pub async fn blog_post(state: &AppState, slug: &str) -> Response {
    let slug = slug.trim();
    if !is_valid_slug(slug) {
        return plain(StatusCode::BAD_REQUEST, "Invalid slug");
    }
    let template = match state.templates.get("blog-post.html").await {
        Ok(template) => template,
        Err(e) => {
            error!(page = "blog-post", "无法读取模板 blog-post.html: {}", e);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    let post = match state.blog.get(slug).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            debug!(slug, "文章不存在，返回静态模板");
            return HtmlPage::new(&*template).into_response();
        }
        Err(e) => {
            warn!(slug, error = %e, "读取文章失败，返回静态模板");
            return HtmlPage::new(&*template).into_response();
        }
    };

    match render_post(state, &template, &post) {
        Ok(page) => page.into_response(),
        Err(e) => {
            warn!(slug, error = %e, "文章渲染失败，返回静态模板");
            HtmlPage::new(&*template).into_response()
        }
    }
}

fn render_post(state: &AppState, template: &str, post: &BlogPost) -> SiteResult<HtmlPage> {
    let base = state.base_url();
    let site = &state.config.site.name;
    let canonical = format!("{}/blog/{}/", base, post.slug);
    let title = format!("{} — {} Blog", post.seo_title, site);
    let description = post.description();
    let og_image = if post.featured_image.starts_with("http") {
        post.featured_image.clone()
    } else {
        format!("{}/og-image.jpg", base)
    };

    let home = format!("{}/", base);
    let blog_home = format!("{}/blog/", base);
    let json_ld = jsonld::scripts(&[
        jsonld::article(&jsonld::ArticleMeta {
            headline: &post.title,
            description,
            date: &post.date,
            image: &og_image,
            canonical_url: &canonical,
            site_name: site,
            site_url: base,
        }),
        jsonld::breadcrumb(&[
            ("Home", home.as_str()),
            ("Blog", blog_home.as_str()),
            (post.title.as_str(), canonical.as_str()),
        ]),
    ]);
    let head = [
        social_meta("article", &title, description, &canonical, Some(&og_image)),
        json_ld,
        format!(
            "<script>window.__BLOG_POST_SSR={};</script>",
            script_json(&json!({"slug": post.slug}))
        ),
    ]
    .join("\n");

    let article = state.fragments.article(&ArticleView {
        back_url: "/blog/".to_string(),
        back_label: "Back to Blog".to_string(),
        emoji: post.emoji.clone(),
        title: post.title.clone(),
        description: description.to_string(),
        date: Locale::En.format_date_long(&post.date),
        read_time: post.read_time.clone(),
        category: post.category_label.clone(),
        hero: (!post.featured_image.is_empty()).then(|| HeroImage {
            desktop: proxy_image_full(&post.featured_image, 1200, 675),
            mobile: proxy_image_full(&post.featured_image, 800, 450),
            alt: post.featured_image_alt.clone(),
        }),
        body_html: post.body_html.clone(),
    })?;

    let mut page = Injector::new("blog-post", template);
    page.replace(&anchors::TITLE, &escape_html(&title))
        .replace(&anchors::META_DESCRIPTION, &escape_attr(description))
        .replace(&anchors::CANONICAL, &canonical)
        .insert_before(&anchors::HEAD_END, &head)
        .replace(&anchors::ARTICLE_MAIN, &format!("\n{}\n", article));
    Ok(HtmlPage::rendered(page.finish()).cache(PAGE_CACHE))
}

/// Open Graph 与 Twitter 卡片
fn social_meta(kind: &str, title: &str, description: &str, url: &str, image: Option<&str>) -> String {
    let title = escape_attr(title);
    let description = escape_attr(description);
    let mut tags = vec![
        format!("<meta property=\"og:type\" content=\"{}\">", kind),
        format!("<meta property=\"og:title\" content=\"{}\">", title),
        format!("<meta property=\"og:description\" content=\"{}\">", description),
        format!("<meta property=\"og:url\" content=\"{}\">", escape_attr(url)),
        "<meta name=\"twitter:card\" content=\"summary_large_image\">".to_string(),
        format!("<meta name=\"twitter:title\" content=\"{}\">", title),
        format!("<meta name=\"twitter:description\" content=\"{}\">", description),
    ];
    if let Some(image) = image {
        let image = escape_attr(image);
        tags.push(format!("<meta property=\"og:image\" content=\"{}\">", image));
        tags.push(format!("<meta name=\"twitter:image\" content=\"{}\">", image));
    }
    tags.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_copy_counts_articles() {
        let (title, description) = list_copy(Locale::En, "Demo", 12, 2026);
        assert_eq!(
            title,
            "Demo Blog — 12 Articles on OnlyFans Tips & Creator News (2026)"
        );
        assert!(description.starts_with("Browse 12 articles"));

        let (title, _) = list_copy(Locale::Es, "Demo", 3, 2026);
        assert!(title.starts_with("Blog de Demo — 3 Artículos"));
    }

    #[test]
    fn social_meta_escapes_values() {
        let tags = social_meta("article", "A \"quoted\" title", "d", "https://a/", Some("https://img/x.jpg"));
        assert!(tags.contains("content=\"A &quot;quoted&quot; title\""));
        assert!(tags.contains("<meta property=\"og:image\" content=\"https://img/x.jpg\">"));
        assert!(!social_meta("website", "t", "d", "u", None).contains("og:image"));
    }
}
