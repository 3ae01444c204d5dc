use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Mutex;

use super::{ProfileQuery, ProfileStore};
use crate::error::{SiteError, SiteResult};
use crate::models::{Page, Row};

/// 内存中的资料表
///
/// 支持 PostgREST 过滤语法的一个子集：`eq`、`ilike`（`*`、`_` 通配，`\\` 转义）、`lt`、`lte`、
/// `gt`、`gte`，`or=(...)`，`order`，`limit`/`offset` 与 `select` 投影。
/// 每次查询都会被记录，便于断言。
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    rows: Vec<Row>,
    failure: Option<u16>,
    log: Mutex<Vec<String>>,
}

impl MemoryProfileStore {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// 所有查询都以给定状态码失败
    pub fn failing(status: u16) -> Self {
        Self {
            failure: Some(status),
            ..Self::default()
        }
    }

    /// 已执行的查询串
    pub fn queries(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn record(&self, query: &ProfileQuery) {
        if let Ok(mut log) = self.log.lock() {
            log.push(query.to_query_string());
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch(&self, query: &ProfileQuery) -> SiteResult<Page<Row>> {
        self.record(query);
        if let Some(status) = self.failure {
            return Err(SiteError::Upstream {
                status,
                body: "simulated failure".to_string(),
            });
        }

        let mut matched: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| matches_query(row, query))
            .collect();

        if let Some(order) = query.param("order") {
            let keys = parse_order(order);
            matched.sort_by(|a, b| compare_rows(a, b, &keys));
        }

        let total = matched.len() as u64;
        let offset: u64 = query.param("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
        if offset > 0 && offset >= total {
            return Err(SiteError::RangeNotSatisfiable);
        }
        let limit: u64 = query
            .param("limit")
            .and_then(|l| l.parse().ok())
            .unwrap_or(u64::MAX);

        let columns: Option<Vec<&str>> = query
            .param("select")
            .filter(|s| *s != "*")
            .map(|s| s.split(',').map(str::trim).collect());

        let rows = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit.min(usize::MAX as u64) as usize)
            .map(|row| project(row, columns.as_deref()))
            .collect();

        Ok(Page {
            rows,
            total: query.wants_count().then_some(total),
        })
    }
}

const RESERVED: [&str; 5] = ["select", "order", "limit", "offset", "or"];

fn matches_query(row: &Row, query: &ProfileQuery) -> bool {
    let filters_ok = query
        .params()
        .iter()
        .filter(|(key, _)| !RESERVED.contains(&key.as_str()))
        .all(|(column, expression)| match expression.split_once('.') {
            Some((op, value)) => matches_op(row.get(column.as_str()), op, value),
            None => false,
        });
    if !filters_ok {
        return false;
    }

    match query.param("or") {
        Some(group) => {
            let inner = group.trim_start_matches('(').trim_end_matches(')');
            inner.split(',').any(|expression| {
                let mut parts = expression.splitn(3, '.');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(column), Some(op), Some(value)) => matches_op(row.get(column), op, value),
                    _ => false,
                }
            })
        }
        None => true,
    }
}

fn matches_op(field: Option<&Value>, op: &str, value: &str) -> bool {
    let value = urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string());
    let field = field.unwrap_or(&Value::Null);
    match op {
        "eq" => text_of(field) == value,
        "ilike" => like_regex(&value).is_some_and(|re| re.is_match(&text_of(field))),
        "lt" | "lte" | "gt" | "gte" => match (number_of(field), value.parse::<f64>().ok()) {
            (Some(a), Some(b)) => match op {
                "lt" => a < b,
                "lte" => a <= b,
                "gt" => a > b,
                _ => a >= b,
            },
            _ => false,
        },
        _ => false,
    }
}

/// `*`/`%` 匹配任意串，`_` 匹配单个字符，`\\` 转义下一个字符
fn like_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::from("(?is)^");
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    source.push_str(&regex::escape(&next.to_string()));
                }
            }
            '*' | '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_order(order: &str) -> Vec<(String, bool)> {
    order
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split('.');
            let column = pieces.next()?.trim().to_string();
            let descending = pieces.any(|p| p == "desc");
            Some((column, descending))
        })
        .collect()
}

fn compare_rows(a: &Row, b: &Row, keys: &[(String, bool)]) -> Ordering {
    for (column, descending) in keys {
        let ordering = compare_values(a.get(column), b.get(column), *descending);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// null 总是排在最后
fn compare_values(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ordering = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => match (number_of(a), number_of(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => text_of(a).cmp(&text_of(b)),
        },
    };
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn project(row: &Row, columns: Option<&[&str]>) -> Row {
    match columns {
        Some(columns) => columns
            .iter()
            .filter_map(|c| row.get(*c).map(|v| (c.to_string(), v.clone())))
            .collect(),
        None => row.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::upstream::ilike_any;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        [
            json!({"id": 1, "username": "alice", "about": "Yoga and fitness", "favoritedcount": 10, "subscribeprice": 5, "isverified": true}),
            json!({"id": 2, "username": "bob", "about": "cooking", "favoritedcount": 30, "subscribeprice": 0, "isverified": false}),
            json!({"id": 3, "username": "Carla", "about": "FITNESS coach", "favoritedcount": 20, "subscribeprice": null, "isverified": true}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
    }

    #[tokio::test]
    async fn filters_orders_and_counts() {
        let store = MemoryProfileStore::new(rows());
        let query = ProfileQuery::new()
            .select("id,username")
            .order("favoritedcount.desc")
            .or(&ilike_any(&["about"], &["fitness".to_string()]))
            .filter("isverified", "eq.true")
            .with_count();
        let page = store.fetch(&query).await.unwrap();
        let names: Vec<_> = page.rows.iter().map(|r| r["username"].clone()).collect();
        assert_eq!(names, vec![json!("Carla"), json!("alice")]);
        assert_eq!(page.total, Some(2));
        assert!(page.rows[0].get("about").is_none());
        assert_eq!(store.queries().len(), 1);
    }

    #[tokio::test]
    async fn offset_past_end_is_range_error() {
        let store = MemoryProfileStore::new(rows());
        let err = store
            .fetch(&ProfileQuery::new().limit(2).offset(3))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::RangeNotSatisfiable));
    }

    #[tokio::test]
    async fn ilike_honours_wildcards_and_escapes() {
        let store = MemoryProfileStore::new(rows());
        let names = |page: Page<Row>| -> Vec<Value> {
            page.rows.iter().map(|r| r["username"].clone()).collect()
        };

        let page = store.fetch(&ProfileQuery::new().filter("username", "ilike.carla")).await.unwrap();
        assert_eq!(names(page), vec![json!("Carla")]);
        let page = store.fetch(&ProfileQuery::new().filter("username", "ilike.b_b")).await.unwrap();
        assert_eq!(names(page), vec![json!("bob")]);
        let page = store.fetch(&ProfileQuery::new().filter("username", "ilike.b\\_b")).await.unwrap();
        assert!(page.rows.is_empty());
        let page = store.fetch(&ProfileQuery::new().filter("username", "ilike.al*")).await.unwrap();
        assert_eq!(names(page), vec![json!("alice")]);
    }

    #[tokio::test]
    async fn numeric_filters_and_null_ordering() {
        let store = MemoryProfileStore::new(rows());
        let page = store
            .fetch(&ProfileQuery::new().filter("subscribeprice", "lte.5").order("subscribeprice.asc"))
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0]["username"], json!("bob"));
        assert_eq!(page.total, None);
    }
}
