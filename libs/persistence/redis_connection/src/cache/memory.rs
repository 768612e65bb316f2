use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use glob::Pattern;
use moka::{Expiry, future::Cache};

use super::r#trait::{CacheError, CacheResult, CacheStore};
use crate::config::MemoryConfig;

#[derive(Clone)]
struct MemoryEntry {
    bytes: Bytes,
    ttl: Duration,
}

/// Every write, first or not, lives for the TTL it was stored with.
struct EntryTtl;

impl Expiry<String, MemoryEntry> for EntryTtl {
    fn expire_after_create(
        &self, _key: &String, value: &MemoryEntry, _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self, _key: &String, value: &MemoryEntry, _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backend. Useful for tests and single-node deployments;
/// several [`crate::key_store::KeyStore`]s can share one instance the same
/// way services share one Redis.
#[derive(Clone)]
pub struct Memory {
    memory: Cache<String, MemoryEntry>,
    config: MemoryConfig,
}

impl Memory {
    pub fn new(config: MemoryConfig) -> Self {
        let memory = Cache::builder()
            .max_capacity(config.capacity)
            .expire_after(EntryTtl)
            .build();
        Self { memory, config }
    }

    pub fn config(&self) -> &MemoryConfig { &self.config }

    /// Number of live entries, after flushing moka's pending maintenance.
    pub async fn entry_count(&self) -> u64 {
        self.memory.run_pending_tasks().await;
        self.memory.entry_count()
    }
}

impl Default for Memory {
    fn default() -> Self { Self::new(MemoryConfig::default()) }
}

#[async_trait]
impl CacheStore for Memory {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        Ok(self.memory.get(key).await.map(|entry| entry.bytes))
    }

    async fn set_with_ttl(
        &self, key: &str, value: Bytes, ttl: Duration,
    ) -> CacheResult<()> {
        let entry = MemoryEntry {
            bytes: value,
            ttl: ttl.min(self.config.ttl()),
        };
        self.memory.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<u64> {
        let existed = self.memory.remove(key).await.is_some();
        Ok(u64::from(existed))
    }

    async fn remove_many(&self, keys: &[String]) -> CacheResult<u64> {
        let mut removed = 0;
        for key in keys {
            if self.memory.remove(key).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| CacheError::InvalidPattern(e.to_string()))?;
        let mut keys: Vec<String> = self
            .memory
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| (*key).clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
