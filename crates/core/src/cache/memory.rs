use super::CacheService;
use crate::time::Clock;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Clone)]
struct Entry {
    value: Value,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Process-local cache backend. Expiry is judged against the injected clock; once full, the oldest
/// entry is evicted.
pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    max_entries: usize,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>, max_entries: usize) -> Self {
        Self {
            clock,
            max_entries: max_entries.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get_value(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone()))
    }

    async fn set_value(&self, key: &str, value: Value, ttl: Duration) -> anyhow::Result<()> {
        let ttl = chrono::Duration::from_std(ttl).context("cache ttl out of range")?;
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(ttl).context("cache ttl out of range")?;

        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: now,
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
