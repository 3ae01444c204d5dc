use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::blog::BlogRepository;
use super::upstream::{ProfileQuery, ProfileStore};
use crate::error::{SiteError, SiteResult};
use crate::models::{Catalog, Row};

/// 动态站点地图收录的创作者数量
pub const MAX_DYNAMIC_CREATORS: u64 = 1000;
/// 批量构建时每次请求的用户名数量
pub const USERNAME_PAGE_SIZE: u64 = 1000;
/// 单个创作者站点地图文件的 URL 上限
pub const CHUNK_SIZE: usize = 40_000;
/// 分页抓取的 offset 上限
pub const MAX_OFFSET: u64 = 500_000;

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// 站点地图中的一条 URL
#[derive(Debug, Clone, PartialEq)]
pub struct UrlEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

impl UrlEntry {
    pub fn new(loc: String, changefreq: &'static str, priority: &'static str) -> Self {
        Self {
            loc,
            lastmod: None,
            changefreq,
            priority,
        }
    }

    pub fn lastmod(mut self, date: impl Into<String>) -> Self {
        self.lastmod = Some(date.into());
        self
    }
}

/// 站点地图只使用 HTTPS，`http://` 前缀会被升级
pub fn https_base(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    match base.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None if base.starts_with("https://") => base.to_string(),
        None => format!("https://{}", base),
    }
}

pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// 渲染 `<urlset>`
pub fn urlset(entries: &[UrlEntry]) -> String {
    let mut xml = String::with_capacity(128 + entries.len() * 160);
    xml.push_str(XML_HEADER);
    xml.push_str(&format!("<urlset xmlns=\"{}\">\n", SITEMAP_NS));
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
        if let Some(lastmod) = &entry.lastmod {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", escape_xml(lastmod)));
        }
        xml.push_str(&format!("    <changefreq>{}</changefreq>\n", entry.changefreq));
        xml.push_str(&format!("    <priority>{}</priority>\n", entry.priority));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>");
    xml
}

/// 渲染 `<sitemapindex>`
pub fn sitemap_index(locs: &[String], lastmod: &str) -> String {
    let mut xml = String::from(XML_HEADER);
    xml.push_str(&format!("<sitemapindex xmlns=\"{}\">\n", SITEMAP_NS));
    for loc in locs {
        xml.push_str(&format!(
            "  <sitemap>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n  </sitemap>\n",
            escape_xml(loc),
            lastmod
        ));
    }
    xml.push_str("</sitemapindex>");
    xml
}

pub fn error_document() -> String {
    format!("{}<error>Failed to generate sitemap</error>", XML_HEADER.trim_end())
}

/// 创作者主页地址
pub fn creator_loc(base: &str, username: &str) -> String {
    format!("{}/{}", base, urlencoding::encode(username))
}

/// `last_seen_at` 或首次发帖日期的日期部分，都没有时取今天
pub fn creator_lastmod(row: &Row) -> String {
    ["last_seen_at", "firstpublishedpostdate"]
        .iter()
        .filter_map(|key| row.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(|value| value.split('T').next().unwrap_or(value).to_string())
        .unwrap_or_else(today)
}

/// 首页、分类汇总页、每个分类页、博客首页与文章
pub async fn static_entries(
    base: &str,
    catalog: &Catalog,
    blog: &BlogRepository,
) -> SiteResult<Vec<UrlEntry>> {
    let day = today();
    let mut entries = vec![
        UrlEntry::new(format!("{}/", base), "daily", "1.0").lastmod(&day),
        UrlEntry::new(format!("{}/categories/", base), "weekly", "0.9").lastmod(&day),
    ];
    for slug in catalog.category_slugs() {
        entries.push(
            UrlEntry::new(format!("{}/categories/{}/", base, slug), "weekly", "0.8").lastmod(&day),
        );
    }

    let posts = blog.list().await?;
    entries.push(UrlEntry::new(format!("{}/blog/", base), "weekly", "0.7").lastmod(&day));
    for post in posts {
        entries.push(
            UrlEntry::new(format!("{}/blog/{}/", base, post.slug), "monthly", "0.6")
                .lastmod(post.date.get(..10).unwrap_or(&post.date)),
        );
    }
    Ok(entries)
}

/// `/api/sitemap.xml`：静态页面加上最受欢迎的活跃创作者
pub async fn dynamic_sitemap(
    base_url: &str,
    catalog: &Catalog,
    blog: &BlogRepository,
    store: &dyn ProfileStore,
) -> SiteResult<String> {
    let base = https_base(base_url);
    let mut entries = static_entries(&base, catalog, blog).await?;

    let query = ProfileQuery::new()
        .select("username,last_seen_at,firstpublishedpostdate")
        .filter("status", "eq.active")
        .order("favoritedcount.desc")
        .limit(MAX_DYNAMIC_CREATORS);
    let page = store.fetch(&query).await?;

    for row in &page.rows {
        let Some(username) = row.get("username").and_then(Value::as_str) else {
            continue;
        };
        if username.is_empty() {
            continue;
        }
        entries.push(
            UrlEntry::new(creator_loc(&base, username), "daily", "0.8").lastmod(creator_lastmod(row)),
        );
    }
    debug!(urls = entries.len(), "sitemap rendered");
    Ok(urlset(&entries))
}

/// 分页抓取所有用户名
pub async fn fetch_all_usernames(store: &dyn ProfileStore) -> SiteResult<Vec<String>> {
    let mut usernames = Vec::new();
    let mut offset = 0;
    loop {
        let query = ProfileQuery::new()
            .select("username")
            .order("username.asc")
            .limit(USERNAME_PAGE_SIZE)
            .offset(offset);
        let page = match store.fetch(&query).await {
            Ok(page) => page,
            Err(SiteError::RangeNotSatisfiable) => break,
            Err(e) => return Err(e),
        };
        if page.rows.is_empty() {
            break;
        }
        usernames.extend(
            page.rows
                .iter()
                .filter_map(|row| row.get("username").and_then(Value::as_str))
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        );
        offset += USERNAME_PAGE_SIZE;
        if offset > MAX_OFFSET {
            info!("reached offset cap {}, stopping", MAX_OFFSET);
            break;
        }
    }
    Ok(usernames)
}

/// 构建结果
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub files: Vec<PathBuf>,
    pub creators: usize,
}

/// 把站点地图写入 `public_dir`
///
/// 生成 `sitemaps/sitemap-base.xml`、若干 `sitemaps/sitemap-creators-N.xml`，
/// 以及内容相同的 `sitemap-index.xml` 与 `sitemap.xml`。
pub async fn build_sitemaps(
    base_url: &str,
    public_dir: &Path,
    catalog: &Catalog,
    blog: &BlogRepository,
    store: &dyn ProfileStore,
) -> SiteResult<BuildReport> {
    let base = https_base(base_url);
    let day = today();
    let sitemaps_dir = public_dir.join("sitemaps");
    fs::create_dir_all(&sitemaps_dir)?;

    let mut written = Vec::new();
    let mut index_names = Vec::new();

    let base_name = "sitemaps/sitemap-base.xml".to_string();
    let base_xml = urlset(&static_entries(&base, catalog, blog).await?);
    fs::write(public_dir.join(&base_name), base_xml)?;
    written.push(public_dir.join(&base_name));
    index_names.push(base_name);

    let usernames = fetch_all_usernames(store).await?;
    info!("找到 {} 个创作者", usernames.len());

    for (i, chunk) in usernames.chunks(CHUNK_SIZE).enumerate() {
        let entries: Vec<UrlEntry> = chunk
            .iter()
            .map(|u| UrlEntry::new(creator_loc(&base, u), "weekly", "0.7").lastmod(&day))
            .collect();
        let name = format!("sitemaps/sitemap-creators-{}.xml", i + 1);
        fs::write(public_dir.join(&name), urlset(&entries))?;
        written.push(public_dir.join(&name));
        index_names.push(name);
    }

    let locs: Vec<String> = index_names.iter().map(|n| format!("{}/{}", base, n)).collect();
    let index_xml = sitemap_index(&locs, &day);
    for name in ["sitemap-index.xml", "sitemap.xml"] {
        fs::write(public_dir.join(name), &index_xml)?;
        written.push(public_dir.join(name));
    }

    Ok(BuildReport {
        files: written,
        creators: usernames.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blog::FeaturedImageResolver;
    use crate::core::upstream::MemoryProfileStore;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn base_is_forced_to_https() {
        assert_eq!(https_base("http://example.com/"), "https://example.com");
        assert_eq!(https_base("https://example.com"), "https://example.com");
        assert_eq!(https_base("example.com"), "https://example.com");
    }

    #[test]
    fn lastmod_prefers_last_seen() {
        let r = row(json!({"last_seen_at": "2026-04-01T10:00:00Z", "firstpublishedpostdate": "2020-01-01T00:00:00Z"}));
        assert_eq!(creator_lastmod(&r), "2026-04-01");
        let r = row(json!({"firstpublishedpostdate": "2020-01-01T00:00:00Z"}));
        assert_eq!(creator_lastmod(&r), "2020-01-01");
        assert_eq!(creator_lastmod(&row(json!({}))), today());
    }

    #[test]
    fn urlset_escapes_locations() {
        let xml = urlset(&[UrlEntry::new("https://a.com/?x=1&y=2".to_string(), "daily", "1.0")]);
        assert!(xml.contains("<loc>https://a.com/?x=1&amp;y=2</loc>"));
        assert!(!xml.contains("<lastmod>"));
    }

    #[tokio::test]
    async fn build_writes_chunks_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        fs::create_dir_all(&content).unwrap();
        let blog = BlogRepository::new(&content, FeaturedImageResolver::offline());
        let catalog: Catalog = serde_yaml::from_str("categories: [fitness]").unwrap();
        let store = MemoryProfileStore::new(vec![
            row(json!({"username": "zed"})),
            row(json!({"username": "amy"})),
        ]);
        let public = dir.path().join("public");

        let report = build_sitemaps("http://demo.test", &public, &catalog, &blog, &store)
            .await
            .unwrap();
        assert_eq!(report.creators, 2);

        let creators = fs::read_to_string(public.join("sitemaps/sitemap-creators-1.xml")).unwrap();
        assert!(creators.find("demo.test/amy").unwrap() < creators.find("demo.test/zed").unwrap());
        let index = fs::read_to_string(public.join("sitemap.xml")).unwrap();
        assert!(index.contains("<loc>https://demo.test/sitemaps/sitemap-base.xml</loc>"));
        assert_eq!(index, fs::read_to_string(public.join("sitemap-index.xml")).unwrap());
        let base = fs::read_to_string(public.join("sitemaps/sitemap-base.xml")).unwrap();
        assert!(base.contains("https://demo.test/categories/fitness/"));
    }
}
