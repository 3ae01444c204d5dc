use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::{parse_content_range, ProfileQuery, ProfileStore};
use crate::error::{SiteError, SiteResult};
use crate::models::config::UpstreamConfig;
use crate::models::{Page, Row};

/// 基于 reqwest 的 PostgREST 客户端
pub struct RestProfileStore {
    client: Client,
    base_url: String,
    key: String,
    table: String,
    timeout: Duration,
}

impl RestProfileStore {
    pub fn new(config: &UpstreamConfig) -> SiteResult<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            table: config.table.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    fn endpoint(&self, query: &ProfileQuery) -> String {
        format!(
            "{}/rest/v1/{}?{}",
            self.base_url,
            self.table,
            query.to_query_string()
        )
    }

    fn headers(&self, count: bool) -> SiteResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", self.key))?);
        headers.insert("Accept-Profile", HeaderValue::from_static("public"));
        headers.insert("Content-Profile", HeaderValue::from_static("public"));
        if count {
            headers.insert("Prefer", HeaderValue::from_static("count=exact"));
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> SiteResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| SiteError::Config {
        message: "SUPABASE_KEY 含有非法字符".to_string(),
    })
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.key.is_empty()
    }

    async fn fetch(&self, query: &ProfileQuery) -> SiteResult<Page<Row>> {
        if !self.is_configured() {
            return Err(SiteError::MissingUpstream);
        }

        let timeout = query.timeout_override().unwrap_or(self.timeout);
        let timeout_ms = timeout.as_millis() as u64;
        let url = self.endpoint(query);
        debug!(table = %self.table, query = %query.to_query_string(), "upstream fetch");

        let response = self
            .client
            .get(&url)
            .headers(self.headers(query.wants_count())?)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| timeout_or_http(e, timeout_ms))?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(SiteError::RangeNotSatisfiable);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "上游返回错误");
            return Err(SiteError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);

        let rows: Vec<Row> = response
            .json()
            .await
            .map_err(|e| timeout_or_http(e, timeout_ms))?;

        Ok(Page { rows, total })
    }
}

fn timeout_or_http(error: reqwest::Error, timeout_ms: u64) -> SiteError {
    if error.is_timeout() {
        SiteError::Timeout(timeout_ms)
    } else {
        SiteError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str, key: &str) -> RestProfileStore {
        let config = UpstreamConfig {
            url: url.to_string(),
            key: key.to_string(),
            ..UpstreamConfig::default()
        };
        RestProfileStore::new(&config).unwrap()
    }

    #[test]
    fn endpoint_uses_table_and_query() {
        let store = store("https://db.example.co/", "k");
        let query = ProfileQuery::new().select("id").limit(1);
        assert_eq!(
            store.endpoint(&query),
            "https://db.example.co/rest/v1/creator_profiles?select=id&limit=1"
        );
    }

    #[test]
    fn count_header_only_when_requested() {
        let store = store("https://db.example.co", "k");
        assert!(store.headers(true).unwrap().contains_key("Prefer"));
        let headers = store.headers(false).unwrap();
        assert!(!headers.contains_key("Prefer"));
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer k");
    }

    #[tokio::test]
    async fn unconfigured_store_refuses_to_fetch() {
        let store = store("", "");
        assert!(!store.is_configured());
        let err = store.fetch(&ProfileQuery::new()).await.unwrap_err();
        assert!(matches!(err, SiteError::MissingUpstream));
    }
}
