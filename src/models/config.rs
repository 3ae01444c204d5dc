use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 站点配置（对应 site.yml）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteSection,
    pub upstream: UpstreamConfig,
    pub paths: PathsConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    /// 站点名称，用于标题与 JSON-LD
    pub name: String,
    /// 站点根 URL，不带结尾斜杠
    pub base_url: String,
    /// 创作者外部主页前缀，例如 https://onlyfans.com/
    pub profile_url_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub key: String,
    pub table: String,
    pub timeout_ms: u64,
    /// 创作者详情页查询的超时
    pub creator_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// HTML 模板与静态文件所在目录
    pub site_root: PathBuf,
    /// 博客 Markdown 目录
    pub content_dir: PathBuf,
    /// 站点地图输出目录
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub cors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteSection::default(),
            upstream: UpstreamConfig::default(),
            paths: PathsConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            name: "Creator Directory".to_string(),
            base_url: "https://example.com".to_string(),
            profile_url_prefix: "https://onlyfans.com/".to_string(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            table: "creator_profiles".to_string(),
            timeout_ms: 5000,
            creator_timeout_ms: 2000,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            site_root: PathBuf::from("site"),
            content_dir: PathBuf::from("site/content/blog"),
            public_dir: PathBuf::from("site/public"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            max_entries: 10_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors: true,
        }
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// 加载配置：文件（可选）+ .env + 环境变量覆盖
    pub fn load(path: &Path) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = if path.exists() {
            info!("加载配置文件: {}", path.display());
            Self::from_file(path)?
        } else {
            debug!("Config file {} not found, using defaults", path.display());
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 应用环境变量覆盖
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get("SUPABASE_URL") {
            self.upstream.url = url;
        }
        if let Some(key) = get("SUPABASE_KEY").or_else(|| get("SUPABASE_ANON_KEY")) {
            self.upstream.key = key;
        }
        if let Some(base) = get("SITE_BASE_URL") {
            self.site.base_url = base;
        }
        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.upstream.url = self.upstream.url.trim().trim_end_matches('/').to_string();
        self.upstream.key = self.upstream.key.trim().to_string();
        self.site.base_url = self.site.base_url.trim().trim_end_matches('/').to_string();
    }

    /// 上游是否可用
    pub fn upstream_ready(&self) -> bool {
        !self.upstream.url.is_empty() && !self.upstream.key.is_empty()
    }

    /// 站点下的绝对 URL
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.site.base_url, path)
        } else {
            format!("{}/{}", self.site.base_url, path)
        }
    }

    /// 创作者的外部主页链接
    pub fn profile_url(&self, username: &str) -> String {
        format!("{}{}", self.site.profile_url_prefix, urlencoding::encode(username))
    }

    /// 分类目录文件路径
    pub fn catalog_path(&self) -> PathBuf {
        self.paths.site_root.join("config").join("catalog.yml")
    }
}
