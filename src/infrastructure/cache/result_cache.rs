// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use lru::LruCache;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::settings::CacheSettings;
use crate::domain::models::generation::GenerationOutput;
use crate::domain::models::task::PayloadRef;
use crate::domain::repositories::storage_repository::{StorageError, StorageRepository};

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// 因容量不足被淘汰的条目数
    pub evictions: u64,
    /// 因过期被移除的条目数
    pub expirations: u64,
}

/// 缓存条目
#[derive(Clone)]
struct CacheEntry {
    value: PayloadRef,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStats,
}

impl CacheInner {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        self.stats.expirations += expired.len() as u64;
        expired.len()
    }
}

/// 生成结果缓存
///
/// 以请求指纹为键，保存内联结果或外部存储引用。
/// 条目在 TTL 到期后不再返回；容量满时先清除过期条目，
/// 仍然不足则淘汰最近最少使用（读或写）的条目。
pub struct ResultCache {
    inner: Mutex<CacheInner>,
    default_ttl: Duration,
    persist_threshold_bytes: u64,
    storage: Arc<dyn StorageRepository>,
}

impl ResultCache {
    /// 创建新的结果缓存
    ///
    /// # 参数
    /// * `capacity` - 最大条目数，为 0 时按 1 处理
    /// * `default_ttl` - 未显式指定时的条目存活时间
    /// * `persist_threshold_bytes` - 超过该大小的结果写入对象存储
    /// * `storage` - 外置结果使用的对象存储
    pub fn new(
        capacity: usize,
        default_ttl: Duration,
        persist_threshold_bytes: u64,
        storage: Arc<dyn StorageRepository>,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            default_ttl,
            persist_threshold_bytes,
            storage,
        }
    }

    pub fn from_settings(settings: &CacheSettings, storage: Arc<dyn StorageRepository>) -> Self {
        Self::new(
            settings.result_cache_size,
            settings.ttl(),
            settings.persist_threshold_bytes(),
            storage,
        )
    }

    /// 读取缓存值
    ///
    /// 命中时刷新条目的最近使用时间；过期条目会被立即移除并按未命中处理
    pub fn get(&self, key: &str) -> Option<PayloadRef> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.entries.peek(key).map(|entry| entry.is_expired(now)) {
            None => {
                inner.stats.misses += 1;
                counter!("result_cache_misses_total").increment(1);
                return None;
            }
            Some(true) => {
                inner.entries.pop(key);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                counter!("result_cache_misses_total").increment(1);
                debug!("Cache entry expired: {}", key);
                return None;
            }
            Some(false) => {}
        }

        let value = inner.entries.get(key).map(|entry| entry.value.clone());
        inner.stats.hits += 1;
        counter!("result_cache_hits_total").increment(1);
        value
    }

    /// 写入缓存值
    ///
    /// 相同键直接覆盖（后写者生效）
    pub fn put(&self, key: &str, value: PayloadRef, ttl: Option<Duration>) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let is_full = inner.entries.len() >= inner.entries.cap().get();
        if is_full && !inner.entries.contains(key) {
            inner.purge_expired(now);
        }

        let entry = CacheEntry {
            value,
            inserted_at: now,
            ttl: ttl.unwrap_or(self.default_ttl),
        };

        if let Some((evicted_key, _)) = inner.entries.push(key.to_string(), entry) {
            if evicted_key != key {
                inner.stats.evictions += 1;
                counter!("result_cache_evictions_total").increment(1);
                debug!("Evicted least recently used cache entry: {}", evicted_key);
            }
        }
        inner.stats.stores += 1;
    }

    /// 根据大小决定结果的保存方式
    ///
    /// 不超过阈值的结果内联返回；超过阈值的结果写入对象存储 `object_key`，
    /// 只返回引用。写入失败时返回错误，结果不会被静默丢弃。
    pub async fn externalize(
        &self,
        object_key: &str,
        output: GenerationOutput,
    ) -> Result<PayloadRef, StorageError> {
        if output.size() <= self.persist_threshold_bytes {
            return Ok(PayloadRef::Inline {
                data: output.data,
                content_type: output.content_type,
            });
        }

        let mut metadata: HashMap<String, String> = output.metadata.clone();
        metadata.insert("content-type".to_string(), output.content_type.clone());

        let stored = self.storage.put(object_key, &output.data, &metadata).await?;
        debug!(
            "Externalized {} byte result to {}",
            stored.size, stored.key
        );

        Ok(PayloadRef::External {
            key: stored.key,
            url: stored.url,
            size: stored.size,
            content_type: output.content_type,
        })
    }

    /// 清除所有过期条目，返回清除数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.inner.lock().purge_expired(now)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }
}
