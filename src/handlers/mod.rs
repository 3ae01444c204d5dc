//! HTTP 处理函数
//!
//! `pages` 下是服务端渲染的 HTML 页面，`api` 下是 JSON / XML 接口。

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::theme::Rendered;

pub mod api;
pub mod pages;

/// 列表页与博客页的 CDN 缓存策略
pub const PAGE_CACHE: &str = "public, s-maxage=300, stale-while-revalidate=60";

/// 响应头：本次渲染中缺失的模板锚点
pub const MISSED_ANCHORS_HEADER: &str = "x-ssr-missed-anchors";

/// HTML 响应
#[derive(Debug)]
pub struct HtmlPage {
    status: StatusCode,
    html: String,
    cache_control: Option<&'static str>,
    missed: Vec<&'static str>,
    headers: Vec<(HeaderName, String)>,
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            html: html.into(),
            cache_control: None,
            missed: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn rendered(rendered: Rendered) -> Self {
        let mut page = Self::new(rendered.html);
        page.missed = rendered.missed;
        page
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn cache(mut self, value: &'static str) -> Self {
        self.cache_control = Some(value);
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

impl IntoResponse for HtmlPage {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.html).into_response();
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        if let Some(cache) = self.cache_control {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache));
        }
        if !self.missed.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.missed.join(", ")) {
                headers.insert(HeaderName::from_static(MISSED_ANCHORS_HEADER), value);
            }
        }
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// 302 跳转
pub fn found(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
        Err(_) => (StatusCode::FOUND, [(LOCATION, HeaderValue::from_static("/"))]).into_response(),
    }
}

/// 301 跳转
pub fn moved_permanently(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response(),
        Err(_) => found("/"),
    }
}

/// 纯文本错误
pub fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// 页码上限，更大的值按上限处理
pub const MAX_PAGE_NUMBER: u64 = 10_000;

/// 读取页码参数，非法或小于 1 时为 1
pub fn page_number(raw: Option<&str>) -> u64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .map(|p| (p as u64).min(MAX_PAGE_NUMBER))
        .unwrap_or(1)
}

/// 第 `page` 页的起始偏移
pub fn page_offset(page: u64, page_size: u64) -> u64 {
    page.max(1).saturating_sub(1).saturating_mul(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_default_to_one() {
        assert_eq!(page_number(None), 1);
        assert_eq!(page_number(Some("3")), 3);
        assert_eq!(page_number(Some("-2")), 1);
        assert_eq!(page_number(Some("abc")), 1);
        assert_eq!(page_number(Some("9000000000000000000")), MAX_PAGE_NUMBER);
        assert_eq!(page_number(Some("99999999999999999999")), 1);
    }

    #[test]
    fn offsets_saturate() {
        assert_eq!(page_offset(1, 50), 0);
        assert_eq!(page_offset(3, 50), 100);
        assert_eq!(page_offset(0, 50), 0);
        assert_eq!(page_offset(u64::MAX, 1000), u64::MAX);
    }

    #[test]
    fn missed_anchors_become_a_header() {
        let page = HtmlPage::rendered(Rendered {
            html: "<p>x</p>".to_string(),
            missed: vec!["#results", "</head>"],
        })
        .cache(PAGE_CACHE);
        let response = page.into_response();
        assert_eq!(response.headers()[MISSED_ANCHORS_HEADER], "#results, </head>");
        assert_eq!(response.headers()[CACHE_CONTROL], PAGE_CACHE);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[test]
    fn redirects_are_302() {
        let response = found("/category.html");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/category.html");
    }
}
