use anyhow::{Context, Result};
use axum::body::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::blog::{BlogRepository, FeaturedImageResolver};
use super::cache::TtlCache;
use super::upstream::{ProfileStore, RestProfileStore};
use crate::models::{Catalog, Config};
use crate::theme::{FragmentRenderer, TemplateStore};

/// 所有请求共享的状态
pub struct AppState {
    pub config: Config,
    pub catalog: Catalog,
    pub store: Arc<dyn ProfileStore>,
    /// 搜索结果缓存，键为最终查询串
    pub search_cache: TtlCache<Bytes>,
    /// 收藏夹缓存，键为 `|` 连接的用户名
    pub wishlist_cache: TtlCache<Bytes>,
    pub templates: TemplateStore,
    pub fragments: FragmentRenderer,
    pub blog: BlogRepository,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config, catalog: Catalog, store: Arc<dyn ProfileStore>) -> Result<Self> {
        let ttl = Duration::from_secs(config.cache.ttl_secs);
        let max_entries = config.cache.max_entries;
        let fragments = FragmentRenderer::new().context("Failed to compile fragment templates")?;
        let blog = BlogRepository::new(
            config.paths.content_dir.clone(),
            FeaturedImageResolver::new(),
        );

        Ok(Self {
            templates: TemplateStore::new(config.paths.site_root.clone()),
            search_cache: TtlCache::new(ttl, max_entries),
            wishlist_cache: TtlCache::new(ttl, max_entries),
            fragments,
            blog,
            catalog,
            store,
            config,
        })
    }

    /// 按配置构建：读取分类目录并连接 PostgREST
    pub fn from_config(config: Config) -> Result<Self> {
        let catalog = Catalog::load(&config.catalog_path())?;
        let store = RestProfileStore::new(&config.upstream)
            .context("Failed to build upstream client")?;
        if config.upstream_ready() {
            info!(table = %config.upstream.table, "上游已配置");
        } else {
            warn!("SUPABASE_URL / SUPABASE_KEY 未设置，页面将退回静态模板");
        }
        Self::new(config, catalog, Arc::new(store))
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    pub fn creator_timeout(&self) -> Duration {
        Duration::from_millis(self.config.upstream.creator_timeout_ms)
    }

    /// 页面使用的站点根地址
    pub fn base_url(&self) -> &str {
        &self.config.site.base_url
    }
}
