use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::AsyncCommands;

use super::r#trait::{CacheError, CacheResult, CacheStore};

const SCAN_BATCH: usize = 500;

/// Redis cache implementation using deadpool Redis pool
#[derive(Clone)]
pub struct RedisCache {
    pool: deadpool_redis::Pool,
}

impl RedisCache {
    pub fn new(pool: deadpool_redis::Pool) -> Self { Self { pool } }

    async fn connection(&self) -> CacheResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

fn redis_err(e: redis::RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        CacheError::Unavailable(e.to_string())
    }
    else {
        CacheError::Other(e.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(redis_err)?;
        Ok(value.map(Bytes::from))
    }

    async fn set_with_ttl(
        &self, key: &str, value: Bytes, ttl: Duration,
    ) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        // SETEX rejects a zero expiry
        let secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value.as_ref(), secs)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.connection().await?;
        let count: u64 = conn.del(key).await.map_err(redis_err)?;
        Ok(count)
    }

    async fn remove_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let count: u64 = conn.del(keys).await.map_err(redis_err)?;
        Ok(count)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.connection().await?;
        // SCAN instead of KEYS so a large keyspace never blocks the server
        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(redis_err)?;
            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        found.sort();
        found.dedup();
        Ok(found)
    }
}
