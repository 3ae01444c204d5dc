use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// PostgREST 返回的原始行
pub type Row = Map<String, Value>;

/// 一页上游结果
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    /// 当前页的数据
    pub rows: Vec<T>,
    /// Content-Range 中的总数（Prefer: count=exact）
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self { rows: Vec::new(), total: Some(0) }
    }

    /// 总数，缺失时退回当前页条数
    pub fn total_or_len(&self) -> u64 {
        match self.total {
            Some(total) if total > 0 => total,
            _ => self.rows.len() as u64,
        }
    }
}

/// 创作者资料
///
/// 反序列化时读取数据库的小写列名，序列化时输出前端使用的 camelCase。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub avatar_c50: Option<String>,
    #[serde(default)]
    pub avatar_c144: Option<String>,
    #[serde(
        default,
        rename(serialize = "subscribePrice", deserialize = "subscribeprice"),
        deserialize_with = "lenient_f64"
    )]
    pub subscribe_price: Option<f64>,
    #[serde(
        default,
        rename(serialize = "postsCount", deserialize = "postscount"),
        deserialize_with = "lenient_u64"
    )]
    pub posts_count: Option<u64>,
    #[serde(
        default,
        rename(serialize = "photosCount", deserialize = "photoscount"),
        deserialize_with = "lenient_u64"
    )]
    pub photos_count: Option<u64>,
    #[serde(
        default,
        rename(serialize = "videosCount", deserialize = "videoscount"),
        deserialize_with = "lenient_u64"
    )]
    pub videos_count: Option<u64>,
    #[serde(
        default,
        rename(serialize = "favoritedCount", deserialize = "favoritedcount"),
        deserialize_with = "lenient_u64"
    )]
    pub favorited_count: Option<u64>,
    #[serde(
        default,
        rename(serialize = "subscribersCount", deserialize = "subscriberscount"),
        deserialize_with = "lenient_u64"
    )]
    pub subscribers_count: Option<u64>,
    #[serde(
        default,
        rename(serialize = "isVerified", deserialize = "isverified"),
        deserialize_with = "lenient_bool"
    )]
    pub is_verified: bool,
    #[serde(
        default,
        rename(serialize = "bundle1Price", deserialize = "bundle1_price"),
        deserialize_with = "lenient_f64"
    )]
    pub bundle1_price: Option<f64>,
    #[serde(default, rename(serialize = "joinDate", deserialize = "joindate"))]
    pub join_date: Option<String>,
    #[serde(
        default,
        rename(serialize = "firstPublishedPostDate", deserialize = "firstpublishedpostdate")
    )]
    pub first_published_post_date: Option<String>,
    #[serde(default)]
    pub first_seen_at: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Creator {
    /// 从原始行构造
    pub fn from_row(row: &Row) -> Option<Self> {
        serde_json::from_value(Value::Object(row.clone())).ok()
    }

    /// 展示名称，缺失时使用用户名
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }

    /// 头像地址，优先原图
    pub fn avatar_url(&self) -> &str {
        self.avatar
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(self.avatar_c144.as_deref())
            .unwrap_or("")
    }
}

/// 为前端补充 camelCase 别名：isVerified / subscribePrice
pub fn with_client_aliases(mut row: Row) -> Row {
    let verified = match row.get("isverified") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    };
    let price = row.get("subscribeprice").cloned().unwrap_or(Value::Null);
    row.insert("isVerified".to_string(), Value::Bool(verified));
    row.insert("subscribePrice".to_string(), price);
    row
}

/// 博客列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub category_label: String,
    pub date: String,
    pub emoji: String,
    pub read_time: String,
    pub featured_image: String,
    pub featured_image_alt: String,
}

/// 完整博客文章
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub slug: String,
    pub title: String,
    pub seo_title: String,
    pub meta_description: String,
    pub excerpt: String,
    pub category: String,
    pub category_label: String,
    pub date: String,
    pub emoji: String,
    pub read_time: String,
    pub featured_image: String,
    pub featured_image_alt: String,
    pub body_html: String,
}

impl BlogPost {
    /// 描述文本：frontmatter 里折叠块残留的 ">" 视为空
    pub fn description(&self) -> &str {
        let desc = self.meta_description.trim();
        if desc.is_empty() || desc == ">" {
            &self.excerpt
        } else {
            &self.meta_description
        }
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn creator_reads_lowercase_columns_and_writes_camel_case() {
        let row = json!({
            "id": 7,
            "username": "alice",
            "name": "",
            "subscribeprice": "9.99",
            "postscount": 12,
            "isverified": "true",
            "favoritedcount": 3400
        });
        let creator: Creator = serde_json::from_value(row).unwrap();
        assert_eq!(creator.display_name(), "alice");
        assert_eq!(creator.subscribe_price, Some(9.99));
        assert!(creator.is_verified);

        let out = serde_json::to_value(&creator).unwrap();
        assert_eq!(out["postsCount"], json!(12));
        assert_eq!(out["favoritedCount"], json!(3400));
        assert!(out.get("postscount").is_none());
    }

    #[test]
    fn client_aliases_keep_original_columns() {
        let row = json!({"username": "bob", "isverified": true, "subscribeprice": 5})
            .as_object()
            .cloned()
            .unwrap();
        let out = with_client_aliases(row);
        assert_eq!(out["isVerified"], json!(true));
        assert_eq!(out["subscribePrice"], json!(5));
        assert_eq!(out["isverified"], json!(true));
    }

    #[test]
    fn page_total_falls_back_to_row_count() {
        let page = Page { rows: vec![1, 2, 3], total: Some(0) };
        assert_eq!(page.total_or_len(), 3);
        let page = Page { rows: vec![1], total: Some(40) };
        assert_eq!(page.total_or_len(), 40);
    }
}
