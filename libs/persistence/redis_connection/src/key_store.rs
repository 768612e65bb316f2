//! Namespaced, best-effort access to a shared cache backend.
//!
//! Every operation here degrades instead of failing: reads turn backend
//! errors into misses and writes or deletions log and return. A cache that
//! is down costs latency, never correctness.

use std::{sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::{
    cache::r#trait::{CacheResult, CacheStore},
    config::CacheConfig,
    core::value::{decode, encode},
    namespace::Namespace,
};

#[derive(Clone)]
pub struct KeyStore {
    store: Arc<dyn CacheStore>,
    namespace: Namespace,
    ttl: Duration,
}

impl KeyStore {
    pub fn new(
        store: Arc<dyn CacheStore>, namespace: Namespace, ttl: Duration,
    ) -> Self {
        Self {
            store,
            namespace,
            ttl,
        }
    }

    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self::new(store, Namespace::new(&config.namespace), config.ttl())
    }

    pub fn namespace(&self) -> &Namespace { &self.namespace }

    pub fn default_ttl(&self) -> Duration { self.ttl }

    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let physical = self.namespace.add_prefix(key);
        let bytes = match self.store.get(&physical).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(cache.key = %physical, error = %e, "Cache read failed");
                return None;
            }
        };

        match decode(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                // stale shape from an older build; drop it and read through
                warn!(cache.key = %physical, error = %e, "Discarding undecodable cache entry");
                if let Err(e) = self.store.remove(&physical).await {
                    warn!(cache.key = %physical, error = %e, "Cache delete failed");
                }
                None
            }
        }
    }

    pub async fn set<T>(&self, key: &str, value: &T)
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        self.set_with_ttl(key, value, self.ttl).await
    }

    pub async fn set_with_ttl<T>(&self, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let physical = self.namespace.add_prefix(key);
        let bytes = match encode(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(cache.key = %physical, error = %e, "Cache value not serializable");
                return;
            }
        };
        if let Err(e) =
            self.store.set_with_ttl(&physical, bytes, ttl).await
        {
            warn!(cache.key = %physical, error = %e, "Cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        let physical = self.namespace.add_prefix(key);
        if let Err(e) = self.store.remove(&physical).await {
            warn!(cache.key = %physical, error = %e, "Cache delete failed");
        }
    }

    pub async fn delete_many(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let physical: Vec<String> =
            keys.iter().map(|k| self.namespace.add_prefix(k)).collect();
        if let Err(e) = self.store.remove_many(&physical).await {
            warn!(cache.keys = ?physical, error = %e, "Cache delete failed");
        }
    }

    /// Deletes every key of this namespace matching a glob over logical
    /// keys. Returns how many keys were removed, zero on failure.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        let physical = self.namespace.physical_pattern(pattern);
        match self.remove_matching(&physical).await {
            Ok(removed) => {
                debug!(removed, "Invalidated keys by pattern");
                removed
            }
            Err(e) => {
                warn!(cache.pattern = %physical, error = %e, "Cache pattern delete failed");
                0
            }
        }
    }

    /// Removes every key owned by this namespace and nothing else.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn clear(&self) -> u64 {
        let pattern = self.namespace.all_keys_pattern();
        match self.remove_matching(&pattern).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Cache clear failed");
                0
            }
        }
    }

    /// Logical keys of this namespace matching a glob. Unlike the other
    /// operations this one reports backend failures.
    pub async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let physical = self.namespace.physical_pattern(pattern);
        let keys = self.store.keys(&physical).await?;
        Ok(keys
            .iter()
            .filter_map(|k| self.namespace.strip_prefix(k))
            .map(str::to_owned)
            .collect())
    }

    async fn remove_matching(&self, physical_pattern: &str) -> CacheResult<u64> {
        let keys: Vec<String> = self
            .store
            .keys(physical_pattern)
            .await?
            .into_iter()
            .filter(|k| self.namespace.strip_prefix(k).is_some())
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }
        self.store.remove_many(&keys).await
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
