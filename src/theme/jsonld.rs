//! schema.org 结构化数据

use serde_json::{json, Value};

use crate::models::Creator;
use crate::utils::script_json;

/// 面包屑：`(名称, URL)` 依次编号
pub fn breadcrumb(items: &[(&str, &str)]) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "BreadcrumbList",
        "itemListElement": breadcrumb_items(items),
    })
}

fn breadcrumb_items(items: &[(&str, &str)]) -> Vec<Value> {
    items
        .iter()
        .enumerate()
        .map(|(i, (name, url))| {
            json!({"@type": "ListItem", "position": i + 1, "name": name, "item": url})
        })
        .collect()
}

/// 条目列表：`(名称, URL)`
pub fn item_list(name: &str, url: Option<&str>, count: usize, items: &[(String, String)]) -> Value {
    let mut list = json!({
        "@context": "https://schema.org",
        "@type": "ItemList",
        "name": name,
        "numberOfItems": count,
        "itemListElement": items
            .iter()
            .enumerate()
            .map(|(i, (name, url))| {
                json!({"@type": "ListItem", "position": i + 1, "name": name, "url": url})
            })
            .collect::<Vec<_>>(),
    });
    if let Some(url) = url {
        list["url"] = json!(url);
    }
    list
}

/// 首页站点信息与站内搜索
pub fn website(name: &str, url: &str, search_template: &str, language: &str) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "WebSite",
        "name": name,
        "url": url,
        "inLanguage": language,
        "potentialAction": {
            "@type": "SearchAction",
            "target": search_template,
            "query-input": "required name=search_term_string",
        },
    })
}

/// 分类汇总页
pub fn collection_page(
    name: &str,
    description: &str,
    url: &str,
    crumbs: &[(&str, &str)],
    list_name: &str,
    items: &[(String, String)],
) -> Value {
    let mut main_entity = item_list(list_name, None, items.len(), items);
    if let Some(obj) = main_entity.as_object_mut() {
        obj.remove("@context");
    }
    json!({
        "@context": "https://schema.org",
        "@type": "CollectionPage",
        "name": name,
        "description": description,
        "url": url,
        "breadcrumb": {
            "@type": "BreadcrumbList",
            "itemListElement": breadcrumb_items(crumbs),
        },
        "mainEntity": main_entity,
    })
}

/// 博客首页：`Blog` 与最近的文章
pub fn blog(
    name: &str,
    url: &str,
    description: &str,
    language: &str,
    publisher: (&str, &str),
    posts: &[Value],
) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "Blog",
        "name": name,
        "url": url,
        "inLanguage": language,
        "description": description,
        "publisher": {"@type": "Organization", "name": publisher.0, "url": publisher.1},
        "blogPost": posts,
    })
}

/// 博客列表中的单篇文章
pub fn blog_posting(headline: &str, url: &str, date: &str, description: &str, author: &str, image: &str) -> Value {
    let mut posting = json!({
        "@type": "BlogPosting",
        "headline": headline,
        "url": url,
        "datePublished": date,
        "description": description,
        "author": {"@type": "Organization", "name": author},
    });
    if !image.is_empty() {
        posting["image"] = json!(image);
    }
    posting
}

/// 文章页
pub struct ArticleMeta<'a> {
    pub headline: &'a str,
    pub description: &'a str,
    pub date: &'a str,
    pub image: &'a str,
    pub canonical_url: &'a str,
    pub site_name: &'a str,
    pub site_url: &'a str,
}

pub fn article(meta: &ArticleMeta) -> Value {
    let mut value = json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": meta.headline,
        "author": {"@type": "Organization", "name": meta.site_name, "url": format!("{}/", meta.site_url)},
        "publisher": {
            "@type": "Organization",
            "name": meta.site_name,
            "logo": {"@type": "ImageObject", "url": format!("{}/favicon.svg", meta.site_url)},
        },
        "mainEntityOfPage": {"@type": "WebPage", "@id": meta.canonical_url},
    });
    if !meta.description.is_empty() {
        value["description"] = json!(meta.description);
    }
    if let Some(published) = iso_timestamp(meta.date) {
        value["datePublished"] = json!(published);
        value["dateModified"] = json!(published);
    }
    if !meta.image.is_empty() {
        value["image"] = json!(meta.image);
    }
    value
}

/// `2026-01-05` 或 RFC 3339 时间转成 UTC ISO 时间
fn iso_timestamp(date: &str) -> Option<String> {
    if date.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&chrono::Utc).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
    }
    chrono::NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// 创作者详情页：`ProfilePage` 包含一个 `Person`
pub fn profile_page(creator: &Creator, image: &str, profile_url: &str, modified: &str) -> Value {
    let bio: String = creator.about.as_deref().unwrap_or("").chars().take(280).collect();
    let mut person = json!({
        "@type": "Person",
        "name": creator.display_name(),
        "alternateName": format!("@{}", creator.username),
        "image": image,
        "description": bio,
        "url": profile_url,
    });
    if let Some(location) = creator.location.as_deref().filter(|l| !l.is_empty()) {
        person["address"] = json!({"@type": "PostalAddress", "addressLocality": location});
    }
    let created = creator
        .first_seen_at
        .as_deref()
        .or(creator.join_date.as_deref());
    json!({
        "@context": "https://schema.org",
        "@graph": [{
            "@type": "ProfilePage",
            "dateCreated": created,
            "dateModified": modified,
            "mainEntity": person,
        }],
    })
}

/// 包装成 `<script type="application/ld+json">`
pub fn script(value: &Value) -> String {
    format!(
        "<script type=\"application/ld+json\">{}</script>",
        script_json(value)
    )
}

/// 多个块依次拼接
pub fn scripts(values: &[Value]) -> String {
    values.iter().map(script).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumb_positions_start_at_one() {
        let value = breadcrumb(&[("Home", "https://a/"), ("Blog", "https://a/blog/")]);
        assert_eq!(value["itemListElement"][0]["position"], 1);
        assert_eq!(value["itemListElement"][1]["item"], "https://a/blog/");
    }

    #[test]
    fn collection_page_nests_list_without_context() {
        let items = vec![("Fitness".to_string(), "https://a/categories/fitness/".to_string())];
        let value = collection_page("C", "D", "https://a/categories/", &[("Home", "https://a/")], "L", &items);
        assert!(value["mainEntity"].get("@context").is_none());
        assert_eq!(value["mainEntity"]["numberOfItems"], 1);
        assert!(script(&value).starts_with("<script type=\"application/ld+json\">{"));
    }

    #[test]
    fn article_dates_are_normalised() {
        let meta = ArticleMeta {
            headline: "H",
            description: "",
            date: "2026-02-03",
            image: "",
            canonical_url: "https://a/blog/h/",
            site_name: "Demo",
            site_url: "https://a",
        };
        let value = article(&meta);
        assert_eq!(value["datePublished"], "2026-02-03T00:00:00.000Z");
        assert!(value.get("description").is_none());
        assert!(value.get("image").is_none());
        assert_eq!(value["publisher"]["logo"]["url"], "https://a/favicon.svg");
    }

    #[test]
    fn profile_page_includes_location_when_known() {
        let creator: Creator = serde_json::from_value(json!({
            "username": "amy",
            "location": "Lisbon",
            "joindate": "2020-01-01"
        }))
        .unwrap();
        let value = profile_page(&creator, "img", "https://of/amy", "2026-01-01");
        let entry = &value["@graph"][0];
        assert_eq!(entry["dateCreated"], "2020-01-01");
        assert_eq!(entry["mainEntity"]["alternateName"], "@amy");
        assert_eq!(entry["mainEntity"]["address"]["addressLocality"], "Lisbon");
    }
}
