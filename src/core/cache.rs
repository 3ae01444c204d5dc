use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// 带过期时间的缓存项
#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CachedEntry<V> {
    #[inline]
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// 进程内 TTL 缓存
///
/// 同一个键重复写入会覆盖旧值。超过 `max_entries` 时先清理过期项，
/// 仍然超出则淘汰最早写入的项。
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    entries: Arc<DashMap<String, CachedEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// 读取未过期的值
    pub fn get(&self, key: &str) -> Option<V> {
        let hit = self.entries.get(key).and_then(|entry| {
            if entry.is_fresh(self.ttl) {
                Some(entry.value.clone())
            } else {
                None
            }
        });
        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| !entry.is_fresh(self.ttl));
        }
        hit
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict();
        }
        self.entries.insert(
            key,
            CachedEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.is_fresh(ttl));

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    debug!(key = %key, "evicting oldest cache entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_hit_and_overwrite() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert("a", 1);
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("a", 2);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = TtlCache::new(Duration::from_millis(0), 10);
        cache.insert("a", 1);
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn bounded_by_max_entries() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b", 2);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(3));
    }
}
