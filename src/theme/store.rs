use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::SiteResult;

/// 站点 HTML 模板，按路径缓存在进程内
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
    cache: Arc<DashMap<PathBuf, Arc<str>>>,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 读取 `site_root` 下的模板
    pub async fn get(&self, relative: &str) -> SiteResult<Arc<str>> {
        let path = self.root.join(relative.trim_start_matches('/'));
        if let Some(hit) = self.cache.get(&path) {
            return Ok(hit.clone());
        }
        let content: Arc<str> = tokio::fs::read_to_string(&path).await?.into();
        debug!("模板已缓存: {}", path.display());
        self.cache.insert(path, content.clone());
        Ok(content)
    }
}
