//! PostgREST 访问层
//!
//! `ProfileQuery` 描述一次查询，`ProfileStore` 执行它。HTTP 实现见
//! [`rest::RestProfileStore`]，内存实现见 [`memory::MemoryProfileStore`]。

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SiteResult;
use crate::models::{Page, Row};

pub mod memory;
pub mod rest;

pub use memory::MemoryProfileStore;
pub use rest::RestProfileStore;

/// 全文匹配使用的列
pub const SEARCH_COLUMNS: [&str; 4] = ["username", "name", "location", "about"];

/// 列表页卡片需要的列
pub const CARD_COLUMNS: &str =
    "id,username,name,avatar,avatar_c144,isverified,subscribeprice,favoritedcount,subscriberscount";

/// 默认排序：收藏数降序，价格升序
pub const POPULAR_ORDER: &str = "favoritedcount.desc,subscribeprice.asc";

/// 一次 PostgREST 查询
///
/// 参数按插入顺序输出，同名参数后写覆盖前写，因此查询串可以直接作为缓存键。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileQuery {
    params: Vec<(String, String)>,
    count: bool,
    timeout: Option<Duration>,
}

impl ProfileQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(self, columns: &str) -> Self {
        self.set("select", columns)
    }

    pub fn order(self, order: &str) -> Self {
        self.set("order", order)
    }

    pub fn limit(self, limit: u64) -> Self {
        self.set("limit", &limit.to_string())
    }

    pub fn offset(self, offset: u64) -> Self {
        self.set("offset", &offset.to_string())
    }

    /// `or=(expr1,expr2,...)`；空列表不生成参数
    pub fn or(self, expressions: &[String]) -> Self {
        if expressions.is_empty() {
            return self;
        }
        let value = format!("({})", expressions.join(","));
        self.set("or", &value)
    }

    /// 列过滤，例如 `filter("isverified", "eq.true")`
    pub fn filter(self, column: &str, expression: &str) -> Self {
        self.set(column, expression)
    }

    /// 请求精确总数（`Prefer: count=exact`）
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn wants_count(&self) -> bool {
        self.count
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// 表单编码的查询串
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.params {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    fn set(mut self, key: &str, value: &str) -> Self {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.params.push((key.to_string(), value.to_string())),
        }
        self
    }
}

/// 每个词在每一列上的 `col.ilike.*term*`
pub fn ilike_any(columns: &[&str], terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .flat_map(|term| {
            columns
                .iter()
                .map(move |column| format!("{}.ilike.*{}*", column, term))
        })
        .collect()
}

/// 创作者资料存储
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// 上游是否已配置
    fn is_configured(&self) -> bool {
        true
    }

    /// 执行查询。offset 超出结果集时返回 [`SiteError::RangeNotSatisfiable`]。
    ///
    /// [`SiteError::RangeNotSatisfiable`]: crate::error::SiteError::RangeNotSatisfiable
    async fn fetch(&self, query: &ProfileQuery) -> SiteResult<Page<Row>>;
}

/// 解析 `Content-Range: 0-49/1234` 中的总数
pub fn parse_content_range(value: &str) -> Option<u64> {
    value
        .split('/')
        .nth(1)
        .and_then(|total| total.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_ordered_and_encoded() {
        let query = ProfileQuery::new()
            .select("id,username")
            .order(POPULAR_ORDER)
            .limit(50)
            .offset(0)
            .or(&ilike_any(&["username", "name"], &["big cats".to_string()]))
            .filter("isverified", "eq.true");
        assert_eq!(
            query.to_query_string(),
            "select=id%2Cusername&order=favoritedcount.desc%2Csubscribeprice.asc&limit=50&offset=0\
             &or=%28username.ilike.*big+cats*%2Cname.ilike.*big+cats*%29&isverified=eq.true"
        );
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let query = ProfileQuery::new().limit(10).filter("status", "eq.active").limit(20);
        assert_eq!(query.param("limit"), Some("20"));
        assert_eq!(query.params().len(), 2);
        assert_eq!(ProfileQuery::new().or(&[]).params().len(), 0);
    }

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range("0-49/1234"), Some(1234));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-49/*"), None);
        assert_eq!(parse_content_range(""), None);
    }
}
