use std::time::Duration;

use bytes::Bytes;

/// Cache-specific error type that doesn't depend on Redis
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Invalid key pattern: {0}")]
    InvalidPattern(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Raw byte-level access to a physical cache backend.
///
/// Keys handed to a `CacheStore` are physical keys: namespacing happens one
/// layer up in [`crate::key_store::KeyStore`]. Implementations report every
/// failure; deciding to swallow it is the caller's business.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;

    async fn set_with_ttl(
        &self, key: &str, value: Bytes, ttl: Duration,
    ) -> CacheResult<()>;

    /// Returns the number of keys actually removed.
    async fn remove(&self, key: &str) -> CacheResult<u64>;

    /// Removes all given keys in one round trip where the backend allows it.
    async fn remove_many(&self, keys: &[String]) -> CacheResult<u64>;

    /// Enumerates physical keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;
}
