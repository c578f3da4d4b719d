//! 派生结果缓存
//!
//! 以 (描述符种类, 描述符文本, 实体) 为键缓存编译后的 `QueryDescriptor`。
//! 构建在锁外进行，并发的首次构建可能重复执行，但只有第一个结果会被保存，
//! 之后所有调用方拿到的都是同一个 `Arc`。失败的构建不会被缓存。

use crate::descriptor::QueryDescriptor;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// 描述符来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// camelCase 方法名，例如 `findByNameAndAge`
    Method,
    /// 文本查询，例如 `name = :name and age > 18`
    Text,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKind::Method => write!(f, "method"),
            DescriptorKind::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: DescriptorKind,
    pub descriptor: String,
    pub entity: String,
}

impl CacheKey {
    pub fn new(kind: DescriptorKind, descriptor: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            kind,
            descriptor: descriptor.into(),
            entity: entity.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DerivationCache {
    entries: RwLock<HashMap<CacheKey, Arc<QueryDescriptor>>>,
}

impl DerivationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<QueryDescriptor>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// 命中则直接返回；否则调用 `build`，成功后插入（已有条目优先）。
    pub fn get_or_try_insert_with<F>(&self, key: CacheKey, build: F) -> Result<Arc<QueryDescriptor>>
    where
        F: FnOnce() -> Result<QueryDescriptor>,
    {
        if let Some(hit) = self.get(&key) {
            debug!(kind = %key.kind, descriptor = %key.descriptor, entity = %key.entity, "cache hit");
            return Ok(hit);
        }

        // 在锁外构建，避免慢构建阻塞其他读者
        let built = Arc::new(build()?);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        debug!(kind = %key.kind, descriptor = %key.descriptor, entity = %key.entity, "cache insert");
        Ok(entries.entry(key).or_insert(built).clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn key(descriptor: &str) -> CacheKey {
        CacheKey::new(DescriptorKind::Method, descriptor, "Person")
    }

    #[test]
    fn test_hit_returns_same_instance() {
        let cache = DerivationCache::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(QueryDescriptor::new("Person"))
        };

        let first = cache.get_or_try_insert_with(key("findByName"), build).unwrap();
        let second = cache.get_or_try_insert_with(key("findByName"), build).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_kind_and_entity_are_part_of_the_key() {
        let cache = DerivationCache::new();
        let build = || Ok(QueryDescriptor::new("Person"));
        cache.get_or_try_insert_with(key("findByName"), build).unwrap();
        cache
            .get_or_try_insert_with(CacheKey::new(DescriptorKind::Text, "findByName", "Person"), build)
            .unwrap();
        cache
            .get_or_try_insert_with(CacheKey::new(DescriptorKind::Method, "findByName", "Order"), build)
            .unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = DerivationCache::new();
        let failed = cache.get_or_try_insert_with(key("findByName"), || {
            Err(Error::illegal_argument("boom"))
        });
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let ok = cache.get_or_try_insert_with(key("findByName"), || Ok(QueryDescriptor::new("Person")));
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_use_yields_one_instance() {
        let cache = DerivationCache::new();
        let results: Vec<Arc<QueryDescriptor>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cache
                            .get_or_try_insert_with(key("findByName"), || Ok(QueryDescriptor::new("Person")))
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(cache.len(), 1);
        let cached = cache.get(&key("findByName")).unwrap();
        assert!(results.iter().all(|result| Arc::ptr_eq(result, &cached)));
    }

    #[test]
    fn test_clear() {
        let cache = DerivationCache::new();
        cache
            .get_or_try_insert_with(key("findByName"), || Ok(QueryDescriptor::new("Person")))
            .unwrap();
        cache.clear();
        assert!(cache.get(&key("findByName")).is_none());
    }
}
