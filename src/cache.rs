//! Two-tier response cache in front of a provider
//!
//! Lookups check a TTL-bounded short-term pool, then a capacity-bounded LRU
//! long-term pool; misses call the wrapped provider and insert the reply into
//! both pools. A hit and a fresh provider call are indistinguishable to the
//! caller in value. Provider errors are never cached.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use mini_moka::sync::Cache;

use crate::config::CacheConfig;
use crate::dialogue::Message;
use crate::providers::{GenerateOptions, Provider};
use crate::Result;

/// Normalize a prompt into a cache key
#[must_use]
pub fn normalize_prompt(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// Two-pool response cache keyed by normalized prompt text
///
/// Safe for concurrent lookups and inserts; the long-term lock is released
/// before any await point.
pub struct ResponseCache {
    short_term: Cache<String, String>,
    long_term: Mutex<LruCache<String, String>>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_params(
            config.short_capacity,
            Duration::from_secs(config.short_ttl_secs),
            config.long_capacity,
        )
    }

    /// Build with explicit pool parameters
    #[must_use]
    pub fn with_params(short_capacity: u64, short_ttl: Duration, long_capacity: usize) -> Self {
        Self {
            short_term: Cache::builder()
                .max_capacity(short_capacity)
                .time_to_live(short_ttl)
                .build(),
            long_term: Mutex::new(LruCache::new(
                NonZeroUsize::new(long_capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn long_term(&self) -> std::sync::MutexGuard<'_, LruCache<String, String>> {
        self.long_term
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Look up a normalized key, short-term pool first.
    ///
    /// Any hit promotes the entry's recency in the long-term pool.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.short_term.get(&key.to_string()) {
            tracing::debug!("short-term cache hit");
            let _ = self.long_term().get(key);
            return Some(value);
        }
        self.long_term().get(key).cloned().inspect(|_| {
            tracing::debug!("long-term cache hit");
        })
    }

    /// Insert a value into both pools
    pub fn insert(&self, key: String, value: String) {
        self.short_term.insert(key.clone(), value.clone());
        self.long_term().put(key, value);
    }

    /// Number of entries currently in the long-term pool
    #[must_use]
    pub fn long_term_len(&self) -> usize {
        self.long_term().len()
    }
}

/// Transparent caching wrapper around any provider
pub struct CachedProvider {
    inner: Arc<dyn Provider>,
    cache: ResponseCache,
}

impl CachedProvider {
    #[must_use]
    pub fn new(inner: Arc<dyn Provider>, config: &CacheConfig) -> Self {
        Self {
            inner,
            cache: ResponseCache::new(config),
        }
    }

    /// Wrap a provider with a pre-built cache
    #[must_use]
    pub const fn with_cache(inner: Arc<dyn Provider>, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Provider for CachedProvider {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &[Message],
        options: &GenerateOptions,
    ) -> Result<String> {
        let key = normalize_prompt(prompt);

        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let reply = self.inner.generate(prompt, context, options).await?;
        self.cache.insert(key, reply.clone());
        Ok(reply)
    }
}
