//! JSON / XML 接口

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

use super::{page_number, page_offset};
use crate::core::blog::is_valid_slug;
use crate::core::sitemap::{dynamic_sitemap, error_document};
use crate::core::state::{AppState, SharedState};
use crate::core::upstream::{ilike_any, ProfileQuery, POPULAR_ORDER, SEARCH_COLUMNS};
use crate::error::SiteError;
use crate::models::types::with_client_aliases;
use crate::models::Row;

const SEARCH_SELECT: &str =
    "id,username,name,location,avatar,isverified,subscribeprice,header,avatar_c50,avatar_c144,bundle1_price";
const REEL_SELECT: &str = "id,username,avatar,stories,name,favoritedcount";
/// 未指定 `id` 时展示的创作者
pub const DEFAULT_REEL_ID: &str = "61786830";
const WISHLIST_SELECT: &str = "id,username,name,avatar,header,isverified,subscribeprice,favoritedcount,subscriberscount,about,avatar_c144,avatar_c50";

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 1000;

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";
const SITEMAP_CACHE: &str = "public, max-age=0, s-maxage=86400";
const MISSING_UPSTREAM: &str = "Missing SUPABASE_URL or SUPABASE_KEY env vars";

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub verified: Option<String>,
    pub bundles: Option<String>,
    pub price: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WishlistParams {
    pub users: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReelParams {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlugParams {
    pub slug: Option<String>,
}

// ---------------------------------------------------------------------------
// 搜索
// ---------------------------------------------------------------------------

/// 按请求参数构造搜索查询，查询串同时作为缓存键
pub fn search_query(params: &SearchParams) -> ProfileQuery {
    let page = page_number(params.page.as_deref());
    let page_size = params
        .page_size
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n != 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE) as u64;

    let mut query = ProfileQuery::new()
        .select(SEARCH_SELECT)
        .order(POPULAR_ORDER)
        .limit(page_size)
        .offset(page_offset(page, page_size));

    let q = params.q.as_deref().unwrap_or("").trim();
    if !q.is_empty() {
        query = query.or(&ilike_any(&SEARCH_COLUMNS, &[q.to_string()]));
    }
    match flag(&params.verified).as_str() {
        "true" => query = query.filter("isverified", "eq.true"),
        "false" => query = query.filter("isverified", "eq.false"),
        _ => {}
    }
    if flag(&params.bundles) == "true" {
        query = query.filter("bundle1_price", "gt.0");
    }
    if let Some(max_price) = params
        .price
        .as_deref()
        .and_then(|p| p.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite())
    {
        query = query.filter("subscribeprice", &format!("lte.{}", max_price));
    }
    query
}

pub async fn search(State(state): State<SharedState>, Query(params): Query<SearchParams>) -> Response {
    if !state.store.is_configured() {
        return json_error(json!({
            "error": MISSING_UPSTREAM,
            "debug": {
                "hasUrl": !state.config.upstream.url.is_empty(),
                "hasKey": !state.config.upstream.key.is_empty(),
            },
        }));
    }

    let query = search_query(&params);
    let key = query.to_query_string();
    if let Some(body) = state.search_cache.get(&key) {
        debug!(key = %key, "搜索缓存命中");
        return uncached_json(body);
    }

    let rows = match state.store.fetch(&query).await {
        Ok(page) => page.rows,
        Err(SiteError::RangeNotSatisfiable) => Vec::new(),
        Err(SiteError::Upstream { status, body }) => {
            warn!(status, "搜索上游返回错误");
            return json_error(json!({"error": true, "status": status, "message": body}));
        }
        Err(e) => {
            error!(error = %e, "搜索失败");
            return json_error(json!({"error": "internal_error", "message": e.to_string()}));
        }
    };

    let aliased: Vec<Row> = rows.into_iter().map(with_client_aliases).collect();
    match serde_json::to_vec(&aliased) {
        Ok(bytes) => {
            let body = Bytes::from(bytes);
            state.search_cache.insert(key, body.clone());
            uncached_json(body)
        }
        Err(e) => json_error(json!({"error": "internal_error", "message": e.to_string()})),
    }
}

// ---------------------------------------------------------------------------
// 收藏夹
// ---------------------------------------------------------------------------

/// 拆分 `a,b|c`：去空白、去重并保持顺序
pub fn parse_usernames(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split([',', '|'])
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .filter(|u| seen.insert(u.to_string()))
        .map(str::to_string)
        .collect()
}

/// 按请求顺序排列结果，用户名比较不区分大小写
pub fn order_by_request(usernames: &[String], rows: Vec<Row>) -> Vec<Row> {
    let by_name: HashMap<String, Row> = rows
        .into_iter()
        .filter_map(|row| {
            let name = row.get("username")?.as_str()?.to_lowercase();
            Some((name, row))
        })
        .collect();
    usernames
        .iter()
        .filter_map(|u| by_name.get(&u.to_lowercase()).cloned())
        .map(with_client_aliases)
        .collect()
}

pub async fn wishlist(State(state): State<SharedState>, Query(params): Query<WishlistParams>) -> Response {
    if !state.store.is_configured() {
        return json_error(json!({"error": MISSING_UPSTREAM}));
    }
    let usernames = parse_usernames(params.users.as_deref().unwrap_or(""));
    if usernames.is_empty() {
        return uncached_json(Bytes::from_static(b"[]"));
    }

    let key = usernames.join("|");
    if let Some(body) = state.wishlist_cache.get(&key) {
        debug!(count = usernames.len(), "收藏夹缓存命中");
        return uncached_json(body);
    }

    let expressions: Vec<String> = usernames
        .iter()
        .map(|u| format!("username.eq.{}", urlencoding::encode(u)))
        .collect();
    let query = ProfileQuery::new()
        .select(WISHLIST_SELECT)
        .limit(usernames.len() as u64)
        .or(&expressions);

    let rows = match state.store.fetch(&query).await {
        Ok(page) => page.rows,
        Err(SiteError::Upstream { status, body }) => {
            warn!(status, "收藏夹上游返回错误");
            return json_error(json!({"error": "upstream_error", "status": status, "detail": body}));
        }
        Err(e) => {
            error!(error = %e, "收藏夹请求失败");
            return json_error(json!({"error": "fetch_error", "detail": e.to_string()}));
        }
    };

    let ordered = order_by_request(&usernames, rows);
    match serde_json::to_vec(&ordered) {
        Ok(bytes) => {
            let body = Bytes::from(bytes);
            state.wishlist_cache.insert(key, body.clone());
            uncached_json(body)
        }
        Err(e) => json_error(json!({"error": "internal_error", "detail": e.to_string()})),
    }
}

// ---------------------------------------------------------------------------
// 热门短片
// ---------------------------------------------------------------------------

/// 按 id 取一位创作者及其 stories，查不到时 `creator` 为 null
pub async fn reel(State(state): State<SharedState>, Query(params): Query<ReelParams>) -> Response {
    if !state.store.is_configured() {
        return json_error(json!({"error": MISSING_UPSTREAM}));
    }
    let id = params
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_REEL_ID);
    if !id.chars().all(|c| c.is_ascii_digit()) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid id"}))).into_response();
    }

    let query = ProfileQuery::new()
        .select(REEL_SELECT)
        .filter("id", &format!("eq.{}", id))
        .limit(1);
    match state.store.fetch(&query).await {
        Ok(page) => {
            let creator = page.rows.into_iter().next().map(Value::Object);
            Json(json!({ "creator": creator })).into_response()
        }
        Err(SiteError::Upstream { status, .. }) => {
            warn!(status, id, "短片上游返回错误");
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (code, Json(json!({"error": "Supabase fetch failed", "status": status}))).into_response()
        }
        Err(e) => {
            error!(id, error = %e, "短片请求失败");
            json_error(json!({"error": "internal_error", "message": e.to_string()}))
        }
    }
}

// ---------------------------------------------------------------------------
// 博客
// ---------------------------------------------------------------------------

pub async fn blog(State(state): State<SharedState>) -> Response {
    match state.blog.list().await {
        Ok(posts) => (
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (CACHE_CONTROL, "no-store, max-age=0"),
            ],
            Json(posts),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "读取博客列表失败");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
                Json(json!({"error": "Failed to read blog posts", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

pub async fn blog_post(State(state): State<SharedState>, Query(params): Query<SlugParams>) -> Response {
    let slug = params.slug.unwrap_or_default();
    if !is_valid_slug(&slug) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid slug"}))).into_response();
    }
    match state.blog.get(&slug).await {
        Ok(Some(post)) => ([(CACHE_CONTROL, "public, max-age=300")], Json(post)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({"error": "Post not found"}))).into_response(),
        Err(e) => {
            error!(slug = %slug, error = %e, "读取文章失败");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to read post", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// 健康检查与站点地图
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(health_body(&state))
}

fn health_body(state: &AppState) -> Value {
    json!({
        "status": "ok",
        "supabase": {
            "url": !state.config.upstream.url.is_empty(),
            "anon_key": !state.config.upstream.key.is_empty(),
        },
        "ts": chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn sitemap(State(state): State<SharedState>) -> Response {
    let xml = dynamic_sitemap(
        state.base_url(),
        &state.catalog,
        &state.blog,
        state.store.as_ref(),
    )
    .await;
    match xml {
        Ok(xml) => (
            [
                (CONTENT_TYPE, "application/xml; charset=utf-8"),
                (CACHE_CONTROL, SITEMAP_CACHE),
            ],
            xml,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "生成站点地图失败");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "application/xml; charset=utf-8")],
                error_document(),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------

fn flag(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_lowercase()
}

fn uncached_json(body: Bytes) -> Response {
    (
        [
            (CONTENT_TYPE, "application/json"),
            (CACHE_CONTROL, NO_CACHE),
            (PRAGMA, "no-cache"),
            (EXPIRES, "0"),
        ],
        body,
    )
        .into_response()
}

fn json_error(body: Value) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> SearchParams {
        let get = |k: &str| pairs.iter().find(|(key, _)| *key == k).map(|(_, v)| v.to_string());
        SearchParams {
            q: get("q"),
            verified: get("verified"),
            bundles: get("bundles"),
            price: get("price"),
            page: get("page"),
            page_size: get("page_size"),
        }
    }

    #[test]
    fn search_query_applies_filters_and_paging() {
        let query = search_query(&params(&[
            ("q", " yoga "),
            ("verified", "TRUE"),
            ("bundles", "true"),
            ("price", "10"),
            ("page", "3"),
            ("page_size", "20"),
        ]));
        assert_eq!(query.param("limit"), Some("20"));
        assert_eq!(query.param("offset"), Some("40"));
        assert_eq!(query.param("isverified"), Some("eq.true"));
        assert_eq!(query.param("bundle1_price"), Some("gt.0"));
        assert_eq!(query.param("subscribeprice"), Some("lte.10"));
        assert_eq!(
            query.param("or"),
            Some("(username.ilike.*yoga*,name.ilike.*yoga*,location.ilike.*yoga*,about.ilike.*yoga*)")
        );
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(search_query(&params(&[("page_size", "5000")])).param("limit"), Some("1000"));
        assert_eq!(search_query(&params(&[("page_size", "-4")])).param("limit"), Some("1"));
        assert_eq!(search_query(&params(&[("page_size", "0")])).param("limit"), Some("50"));
        assert!(search_query(&params(&[])).param("or").is_none());
    }

    #[test]
    fn different_filters_make_different_keys() {
        let a = search_query(&params(&[("q", "a"), ("page", "1")])).to_query_string();
        let b = search_query(&params(&[("q", "a"), ("page", "2")])).to_query_string();
        let c = search_query(&params(&[("q", "a"), ("page", "1"), ("verified", "false")])).to_query_string();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn usernames_are_split_and_deduplicated() {
        assert_eq!(parse_usernames(" a, b|a ,,c|"), vec!["a", "b", "c"]);
        assert!(parse_usernames(" , | ").is_empty());
    }

    #[test]
    fn wishlist_keeps_request_order() {
        let rows: Vec<Row> = [
            json!({"username": "Bob", "isverified": "true"}),
            json!({"username": "alice", "subscribeprice": 3}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();
        let ordered = order_by_request(&["ALICE".into(), "missing".into(), "bob".into()], rows);
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0]["username"], "alice");
        assert_eq!(ordered[0]["subscribePrice"], 3);
        assert_eq!(ordered[1]["isVerified"], true);
    }
}
