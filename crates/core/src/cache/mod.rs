pub mod coalesce;
pub mod memory;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use coalesce::Coalescer;
pub use memory::MemoryCache;

#[async_trait]
pub trait CacheService: Send + Sync {
    async fn get_value(&self, key: &str) -> anyhow::Result<Option<Value>>;
    async fn set_value(&self, key: &str, value: Value, ttl: Duration) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

pub async fn get<T: DeserializeOwned>(cache: &dyn CacheService, key: &str) -> anyhow::Result<Option<T>> {
    match cache.get_value(key).await? {
        Some(v) => {
            let typed = serde_json::from_value(v).with_context(|| format!("decode cached {key} failed"))?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

pub async fn set<T: Serialize>(
    cache: &dyn CacheService,
    key: &str,
    value: &T,
    ttl: Duration,
) -> anyhow::Result<()> {
    let v = serde_json::to_value(value).with_context(|| format!("encode {key} for cache failed"))?;
    cache.set_value(key, v, ttl).await
}

pub fn dashboard_key(prefix: &str, subject_id: impl std::fmt::Display) -> String {
    format!("{prefix}-dashboard:{subject_id}")
}

/// Read-through front of a [`CacheService`] with a fixed TTL. Without a coalescer, concurrent
/// misses on one key each compute and the last write wins.
pub struct ResultCache {
    backend: Arc<dyn CacheService>,
    ttl: Duration,
    coalescer: Option<Coalescer>,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheService>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            coalescer: None,
        }
    }

    pub fn with_single_flight(mut self) -> Self {
        self.coalescer = Some(Coalescer::new());
        self
    }

    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, compute: F) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(hit) = self.lookup(key).await {
            tracing::debug!(key, "cache hit");
            return Ok(hit);
        }

        let _flight = match &self.coalescer {
            Some(c) => {
                let guard = c.acquire(key).await;
                if let Some(hit) = self.lookup(key).await {
                    tracing::debug!(key, "cache hit after waiting on in-flight computation");
                    return Ok(hit);
                }
                Some(guard)
            }
            None => None,
        };

        tracing::info!(key, "cache miss");
        let value = compute().await?;
        if let Err(e) = set(self.backend.as_ref(), key, &value, self.ttl).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) -> anyhow::Result<()> {
        self.backend.remove(key).await
    }

    /// Backend or decode failures count as a miss.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match get(self.backend.as_ref(), key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed");
                None
            }
        }
    }
}
