use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use redis_connection::{
    CacheError, CacheStore, KeyStore, Memory, Namespace, cache::CacheResult,
};

pub const TEST_TTL: Duration = Duration::from_secs(60);

/// A backend whose every call fails, like a Redis that went away.
#[derive(Debug, Default)]
pub struct UnreachableCache;

fn refused<T>() -> CacheResult<T> {
    Err(CacheError::Unavailable("connection refused".into()))
}

#[async_trait]
impl CacheStore for UnreachableCache {
    async fn get(&self, _: &str) -> CacheResult<Option<Bytes>> { refused() }

    async fn set_with_ttl(
        &self, _: &str, _: Bytes, _: Duration,
    ) -> CacheResult<()> {
        refused()
    }

    async fn remove(&self, _: &str) -> CacheResult<u64> { refused() }

    async fn remove_many(&self, _: &[String]) -> CacheResult<u64> { refused() }

    async fn keys(&self, _: &str) -> CacheResult<Vec<String>> { refused() }
}

/// A key store on a fresh moka backend.
pub fn memory_key_store(namespace: &str) -> KeyStore {
    shared_key_store(Arc::new(Memory::default()), namespace)
}

/// A key store on an existing backend, for tests where two services share
/// one physical cache.
pub fn shared_key_store(backend: Arc<dyn CacheStore>, namespace: &str) -> KeyStore {
    KeyStore::new(backend, Namespace::new(namespace), TEST_TTL)
}

pub fn unreachable_key_store(namespace: &str) -> KeyStore {
    shared_key_store(Arc::new(UnreachableCache), namespace)
}
