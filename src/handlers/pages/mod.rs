//! 服务端渲染页面
//!
//! 这里的函数只负责提取请求参数，渲染逻辑在各子模块中。

use axum::extract::{Path, Query, Request, State};
use axum::http::header::IF_NONE_MATCH;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use super::{found, moved_permanently, page_number};
use crate::core::state::{AppState, SharedState};
use crate::theme::Locale;

pub mod blog;
pub mod creator;
pub mod hub;
pub mod listing;

pub use listing::ListingKind;

/// `/api/ssr/*` 的查询参数
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub page: Option<String>,
    pub username: Option<String>,
    /// 旧版 `/creator.html?u=` 链接中的用户名
    pub u: Option<String>,
}

/// 干净 URL 中的路径参数
#[derive(Debug, Deserialize)]
pub struct ListingPath {
    pub slug: String,
    #[serde(default)]
    pub page: Option<String>,
}

/// 不会被当作用户名的一级路径
const RESERVED_PATHS: [&str; 12] = [
    "api", "es", "blog", "categories", "category", "country", "static", "assets", "images",
    "sitemaps", "health", "favicon",
];

static USERNAME_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+$").expect("hardcoded username regex is invalid - fix source code")
});

static FILE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(html?|css|js|mjs|map|json|xml|txt|ico|png|jpe?g|gif|svg|webp|avif|woff2?|ttf|webmanifest)$")
        .expect("hardcoded extension regex is invalid - fix source code")
});

/// 用户名只允许字母、数字与 `_.-`
pub fn is_valid_username(name: &str) -> bool {
    USERNAME_PATH.is_match(name)
}

/// `/:username` 是否应由详情页处理
pub fn is_profile_path(segment: &str) -> bool {
    is_valid_username(segment)
        && !FILE_EXTENSION.is_match(segment)
        && !RESERVED_PATHS.contains(&segment.to_ascii_lowercase().as_str())
}

async fn listing(state: &AppState, kind: ListingKind, locale: Locale) -> Response {
    listing::render_listing(state, kind, locale).await
}

fn category_kind(slug: Option<String>, page: Option<&str>) -> ListingKind {
    ListingKind::Category {
        slug: slug.unwrap_or_default(),
        page: page_number(page),
    }
}

fn country_kind(name: Option<String>, page: Option<&str>) -> ListingKind {
    ListingKind::Country {
        slug: name.unwrap_or_default(),
        page: page_number(page),
    }
}

// 首页

pub async fn home(State(state): State<SharedState>) -> Response {
    listing(&state, ListingKind::Home, Locale::En).await
}

pub async fn es_home(State(state): State<SharedState>) -> Response {
    listing(&state, ListingKind::Home, Locale::Es).await
}

// 分类页

pub async fn category(State(state): State<SharedState>, Query(q): Query<PageParams>) -> Response {
    let kind = category_kind(q.slug, q.page.as_deref());
    listing(&state, kind, Locale::En).await
}

pub async fn es_category(State(state): State<SharedState>, Query(q): Query<PageParams>) -> Response {
    let kind = category_kind(q.slug, q.page.as_deref());
    listing(&state, kind, Locale::Es).await
}

pub async fn category_path(State(state): State<SharedState>, Path(p): Path<ListingPath>) -> Response {
    let kind = category_kind(Some(p.slug), p.page.as_deref());
    listing(&state, kind, Locale::En).await
}

pub async fn es_category_path(State(state): State<SharedState>, Path(p): Path<ListingPath>) -> Response {
    let kind = category_kind(Some(p.slug), p.page.as_deref());
    listing(&state, kind, Locale::Es).await
}

// 国家页

pub async fn country(State(state): State<SharedState>, Query(q): Query<PageParams>) -> Response {
    let kind = country_kind(q.name, q.page.as_deref());
    listing(&state, kind, Locale::En).await
}

pub async fn es_country(State(state): State<SharedState>, Query(q): Query<PageParams>) -> Response {
    let kind = country_kind(q.name, q.page.as_deref());
    listing(&state, kind, Locale::Es).await
}

pub async fn country_path(State(state): State<SharedState>, Path(p): Path<ListingPath>) -> Response {
    let kind = country_kind(Some(p.slug), p.page.as_deref());
    listing(&state, kind, Locale::En).await
}

pub async fn es_country_path(State(state): State<SharedState>, Path(p): Path<ListingPath>) -> Response {
    let kind = country_kind(Some(p.slug), p.page.as_deref());
    listing(&state, kind, Locale::Es).await
}

// 分类汇总与博客

pub async fn categories_hub(State(state): State<SharedState>) -> Response {
    hub::categories_hub(&state).await
}

pub async fn blog_list(State(state): State<SharedState>) -> Response {
    blog::blog_list(&state, Locale::En).await
}

pub async fn es_blog_list(State(state): State<SharedState>) -> Response {
    blog::blog_list(&state, Locale::Es).await
}

pub async fn blog_post(State(state): State<SharedState>, Query(q): Query<PageParams>) -> Response {
    blog::blog_post(&state, q.slug.as_deref().unwrap_or("")).await
}

pub async fn blog_post_path(State(state): State<SharedState>, Path(slug): Path<String>) -> Response {
    blog::blog_post(&state, &slug).await
}

// 创作者详情

pub async fn creator(
    State(state): State<SharedState>,
    Query(q): Query<PageParams>,
    request: Request,
) -> Response {
    let etag = if_none_match(&request);
    creator::creator_page(&state, q.username.as_deref().unwrap_or(""), etag.as_deref()).await
}

pub async fn creator_path(
    State(state): State<SharedState>,
    Path(username): Path<String>,
    request: Request,
) -> Response {
    let etag = if_none_match(&request);
    creator::creator_page(&state, &username, etag.as_deref()).await
}

/// 一级路径：用户名走详情页，其余交给静态文件
pub async fn root_segment(
    State(state): State<SharedState>,
    Path(segment): Path<String>,
    Query(q): Query<PageParams>,
    request: Request,
) -> Response {
    if segment == "creator.html" && q.u.is_some() {
        return legacy_redirect(q.u.as_deref());
    }
    if !is_profile_path(&segment) {
        return serve_static(&state, request).await;
    }
    let etag = if_none_match(&request);
    creator::creator_page(&state, &segment, etag.as_deref()).await
}

/// `/api/creator-redirect?u=`
pub async fn creator_redirect(Query(q): Query<PageParams>) -> Response {
    legacy_redirect(q.u.as_deref())
}

/// 旧详情页地址永久跳转到 `/:username`；用户名缺失或非法时回首页
fn legacy_redirect(username: Option<&str>) -> Response {
    match username.map(|u| u.trim().trim_start_matches('@')) {
        Some(u) if is_valid_username(u) => moved_permanently(&format!("/{}", u)),
        _ => found("/"),
    }
}

/// 从站点根目录返回静态文件
pub async fn serve_static(state: &AppState, request: Request) -> Response {
    match ServeDir::new(state.templates.root()).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

fn if_none_match(request: &Request) -> Option<String> {
    request
        .headers()
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_paths_exclude_files_and_reserved_names() {
        assert!(is_profile_path("jane_doe"));
        assert!(is_profile_path("jane.doe"));
        assert!(!is_profile_path("index.html"));
        assert!(!is_profile_path("robots.txt"));
        assert!(!is_profile_path("Blog"));
        assert!(!is_profile_path("a b"));
    }
}
