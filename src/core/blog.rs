use dashmap::DashMap;
use gray_matter::engine::YAML;
use gray_matter::{Matter, Pod};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{SiteError, SiteResult};
use crate::models::{BlogPost, PostSummary};
use crate::utils::{is_markdown_file, markdown};

static FRONTMATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^---\r?\n([\s\S]*?)\r?\n---\r?\n([\s\S]*)$")
        .expect("hardcoded frontmatter regex is invalid - fix source code")
});

static SLUG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9-]+$").expect("hardcoded slug regex is invalid - fix source code")
});

/// 解析后的前置元数据与正文
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub data: BTreeMap<String, String>,
    pub body: String,
}

impl Frontmatter {
    fn get(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// 解析文件开头由 `---` 包围的元数据块
///
/// 元数据块按 YAML 解析；不是 YAML 映射时逐行按第一个冒号拆分。
/// 没有元数据块时 `data` 为空，正文为原文。
pub fn parse_frontmatter(raw: &str) -> Frontmatter {
    let Some(caps) = FRONTMATTER.captures(raw) else {
        return Frontmatter {
            data: BTreeMap::new(),
            body: raw.to_string(),
        };
    };
    let block = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();

    let data = yaml_fields(raw).unwrap_or_else(|| split_lines(block));
    Frontmatter { data, body }
}

fn yaml_fields(raw: &str) -> Option<BTreeMap<String, String>> {
    let matter = Matter::<YAML>::new();
    let parsed = matter.parse(raw);
    let Some(Pod::Hash(map)) = parsed.data else {
        return None;
    };
    let fields = map
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Pod::String(s) => s.trim().to_string(),
                Pod::Integer(i) => i.to_string(),
                Pod::Float(f) => f.to_string(),
                Pod::Boolean(b) => b.to_string(),
                Pod::Null => String::new(),
                _ => return None,
            };
            Some((key, text))
        })
        .collect();
    Some(fields)
}

fn split_lines(block: &str) -> BTreeMap<String, String> {
    block
        .lines()
        .filter_map(|line| {
            let idx = line.find(':').filter(|&i| i > 0)?;
            let key = line[..idx].trim().to_string();
            let value = line[idx + 1..].trim();
            let value = value
                .strip_prefix(['"', '\''])
                .unwrap_or(value);
            let value = value.strip_suffix(['"', '\'']).unwrap_or(value);
            Some((key, value.to_string()))
        })
        .collect()
}

/// 博客 slug 只允许小写字母、数字与连字符
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG.is_match(slug)
}

/// 把截图分享页链接换成真实图片地址
///
/// 只处理 `prnt.sc`：抓取页面，取 `og:image` 或 `twitter:image`。
/// 任何失败都保留原链接。结果在进程内缓存。
#[derive(Debug, Clone)]
pub struct FeaturedImageResolver {
    client: reqwest::Client,
    resolved: Arc<DashMap<String, String>>,
    enabled: bool,
}

static META_IMAGE: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        r#"(?i)<meta[^>]+property=["']og:image["'][^>]*content=["']([^"']+)["'][^>]*>"#,
        r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]*property=["']og:image["'][^>]*>"#,
        r#"(?i)<meta[^>]+name=["']twitter:image(?::src)?["'][^>]*content=["']([^"']+)["'][^>]*>"#,
        r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]*name=["']twitter:image(?::src)?["'][^>]*>"#,
    ]
    .map(|re| Regex::new(re).expect("hardcoded meta image regex is invalid - fix source code"))
});

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

impl FeaturedImageResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            resolved: Arc::new(DashMap::new()),
            enabled: true,
        }
    }

    /// 不访问网络，原样返回
    pub fn offline() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub async fn resolve(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.is_empty() || !self.enabled {
            return raw.to_string();
        }
        let Ok(parsed) = url::Url::parse(raw) else {
            return raw.to_string();
        };
        let host = parsed.host_str().unwrap_or("").to_lowercase();
        if host.trim_start_matches("www.") != "prnt.sc" {
            return raw.to_string();
        }
        if let Some(hit) = self.resolved.get(raw) {
            return hit.clone();
        }

        let resolved = match self.fetch_meta_image(&parsed).await {
            Some(url) => url,
            None => raw.to_string(),
        };
        self.resolved.insert(raw.to_string(), resolved.clone());
        resolved
    }

    async fn fetch_meta_image(&self, page: &url::Url) -> Option<String> {
        let response = match self.client.get(page.as_str()).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = r.status().as_u16(), "featured image page returned error");
                return None;
            }
            Err(e) => {
                debug!("featured image fetch failed: {}", e);
                return None;
            }
        };
        let html = response.text().await.ok()?;
        let content = META_IMAGE
            .iter()
            .find_map(|re| re.captures(&html).and_then(|c| c.get(1)))
            .map(|m| m.as_str().to_string())?;
        page.join(&content).ok().map(|u| u.to_string())
    }
}

impl Default for FeaturedImageResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Markdown 博客文章仓库
#[derive(Debug, Clone)]
pub struct BlogRepository {
    content_dir: PathBuf,
    images: FeaturedImageResolver,
}

/// 列表项的原始字段，图片地址尚未解析
struct RawSummary {
    summary: PostSummary,
    featured_image: String,
}

impl BlogRepository {
    pub fn new(content_dir: impl Into<PathBuf>, images: FeaturedImageResolver) -> Self {
        Self {
            content_dir: content_dir.into(),
            images,
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// 所有带 slug 的文章，按日期倒序
    pub async fn list(&self) -> SiteResult<Vec<PostSummary>> {
        let dir = self.content_dir.clone();
        let raw = tokio::task::spawn_blocking(move || read_summaries(&dir))
            .await
            .map_err(|e| SiteError::Io(std::io::Error::other(e)))??;

        let mut posts = Vec::with_capacity(raw.len());
        for item in raw {
            let mut summary = item.summary;
            summary.featured_image = self.images.resolve(&item.featured_image).await;
            posts.push(summary);
        }
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    /// 按文件名读取单篇文章，文件不存在时返回 `None`
    pub async fn get(&self, slug: &str) -> SiteResult<Option<BlogPost>> {
        if !is_valid_slug(slug) {
            return Ok(None);
        }
        let path = self.content_dir.join(format!("{}.md", slug));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let fm = parse_frontmatter(&raw);
        let featured_image = self.images.resolve(fm.get("featured_image").unwrap_or("")).await;
        Ok(Some(build_post(slug, &fm, featured_image)))
    }
}

fn read_summaries(dir: &Path) -> SiteResult<Vec<RawSummary>> {
    if !dir.exists() {
        warn!("博客目录不存在: {}", dir.display());
        return Ok(Vec::new());
    }

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_markdown_file(path))
        .collect();

    let parsed: Vec<Option<RawSummary>> = files
        .par_iter()
        .map(|path| -> SiteResult<Option<RawSummary>> {
            let raw = std::fs::read_to_string(path)?;
            Ok(build_summary(&parse_frontmatter(&raw)))
        })
        .collect::<SiteResult<_>>()?;

    let posts: Vec<RawSummary> = parsed.into_iter().flatten().collect();
    info!("从 {} 加载了 {} 篇文章", dir.display(), posts.len());
    Ok(posts)
}

/// 缺少 slug 或 slug 不合法的文章不进入列表
fn build_summary(fm: &Frontmatter) -> Option<RawSummary> {
    let slug = fm.get("slug").filter(|s| is_valid_slug(s))?.to_string();
    let title = fm.get("title").unwrap_or(&slug).to_string();
    let category = fm.get("category").unwrap_or("guides").to_string();
    let category_label = fm
        .get("categoryLabel")
        .or_else(|| fm.get("category"))
        .unwrap_or("Guides")
        .to_string();
    let featured_image_alt = fm.get("featured_image_alt").unwrap_or(&title).to_string();

    Some(RawSummary {
        summary: PostSummary {
            excerpt: fm.get("excerpt").unwrap_or("").to_string(),
            date: fm.get("date").unwrap_or("2026-01-01").to_string(),
            emoji: fm.get("emoji").unwrap_or("").to_string(),
            read_time: fm.get("read_time").unwrap_or("5 min read").to_string(),
            featured_image: String::new(),
            featured_image_alt,
            category,
            category_label,
            title,
            slug,
        },
        featured_image: fm.get("featured_image").unwrap_or("").to_string(),
    })
}

fn build_post(slug: &str, fm: &Frontmatter, featured_image: String) -> BlogPost {
    let title = fm.get("title").unwrap_or(slug).to_string();
    BlogPost {
        slug: slug.to_string(),
        seo_title: fm.get("seo_title").unwrap_or(&title).to_string(),
        meta_description: fm
            .get("meta_description")
            .or_else(|| fm.get("excerpt"))
            .unwrap_or("")
            .to_string(),
        excerpt: fm.get("excerpt").unwrap_or("").to_string(),
        category: fm.get("category").unwrap_or("guides").to_string(),
        category_label: fm
            .get("categoryLabel")
            .or_else(|| fm.get("category"))
            .unwrap_or("Guides")
            .to_string(),
        date: fm.get("date").unwrap_or("").to_string(),
        emoji: fm.get("emoji").unwrap_or("📝").to_string(),
        read_time: fm.get("read_time").unwrap_or("5 min read").to_string(),
        featured_image,
        featured_image_alt: fm.get("featured_image_alt").unwrap_or(&title).to_string(),
        body_html: markdown::render(&fm.body),
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = "---\r\ntitle: \"Hello: World\"\r\nslug: hello-world\r\ndate: 2026-02-03\r\nread_time: 7 min read\r\n---\r\n\r\n# Hi\n\nBody text.\n";

    #[test]
    fn parses_crlf_frontmatter() {
        let fm = parse_frontmatter(POST);
        assert_eq!(fm.data["title"], "Hello: World");
        assert_eq!(fm.data["slug"], "hello-world");
        assert_eq!(fm.data["date"], "2026-02-03");
        assert_eq!(fm.body, "# Hi\n\nBody text.");
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse_frontmatter(POST), parse_frontmatter(POST));
    }

    #[test]
    fn non_yaml_block_uses_line_splitter() {
        let raw = "---\ntitle: 'Tips: part 2'\nexcerpt: a: b: c\n---\nbody";
        let fm = parse_frontmatter(raw);
        assert_eq!(fm.data["title"], "Tips: part 2");
        assert_eq!(fm.data["excerpt"], "a: b: c");
        assert_eq!(fm.body, "body");
    }

    #[test]
    fn no_block_keeps_raw_body() {
        let fm = parse_frontmatter("just text\n");
        assert!(fm.data.is_empty());
        assert_eq!(fm.body, "just text\n");
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("how-to-start-2026"));
        assert!(!is_valid_slug("Bad_Slug"));
        assert!(!is_valid_slug("../etc/passwd"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn summary_defaults() {
        let fm = parse_frontmatter("---\nslug: only-slug\n---\nx");
        let raw = build_summary(&fm).unwrap();
        assert_eq!(raw.summary.title, "only-slug");
        assert_eq!(raw.summary.category, "guides");
        assert_eq!(raw.summary.category_label, "Guides");
        assert_eq!(raw.summary.date, "2026-01-01");
        assert_eq!(raw.summary.read_time, "5 min read");
        assert!(build_summary(&parse_frontmatter("---\ntitle: x\n---\ny")).is_none());
        assert!(build_summary(&parse_frontmatter("---\nslug: Bad Slug/..\n---\ny")).is_none());
    }

    #[tokio::test]
    async fn repository_lists_sorted_and_gets_by_slug() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.md"), "---\nslug: old\ndate: 2025-01-01\n---\nold").unwrap();
        std::fs::write(dir.path().join("new.md"), "---\nslug: new\ndate: 2026-05-01\ntitle: New\n---\n**new**").unwrap();
        std::fs::write(dir.path().join("draft.md"), "---\ntitle: no slug\n---\nx").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let repo = BlogRepository::new(dir.path(), FeaturedImageResolver::offline());
        let posts = repo.list().await.unwrap();
        let slugs: Vec<_> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "old"]);

        let post = repo.get("new").await.unwrap().unwrap();
        assert_eq!(post.title, "New");
        assert_eq!(post.emoji, "📝");
        assert!(post.body_html.contains("<strong>new</strong>"));
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolver_leaves_other_hosts_alone() {
        let resolver = FeaturedImageResolver::new();
        assert_eq!(
            resolver.resolve("https://cdn.example.com/a.jpg").await,
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(resolver.resolve("not a url").await, "not a url");
    }
}
