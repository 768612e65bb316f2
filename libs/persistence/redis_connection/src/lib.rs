use std::sync::Arc;

use deadpool_redis::{Config, CreatePoolError, Pool, Runtime};
pub use deadpool_redis::PoolError;
pub use redis::{AsyncCommands, RedisError};
use tracing::{info, instrument};
use url::Url;

pub mod cache;
pub mod config;
pub mod core;
pub mod key_store;
pub mod macros;
pub mod namespace;

pub use cache::{CacheError, CacheStore, Memory, RedisCache};
pub use key_store::KeyStore;
pub use namespace::Namespace;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid redis url: {0}")]
    Url(#[from] url::ParseError),
    #[error("Invalid redis url component: {0}")]
    Component(&'static str),
    #[error(transparent)]
    Pool(#[from] CreatePoolError),
}

/// Builds `redis://[:password@]host:port/db` from a connection config.
pub fn redis_url<C>(config: &C) -> Result<Url, ConnectError>
where
    C: config::DbConnectConfig,
{
    let mut url = Url::parse("redis://")?;

    url.set_host(Some(config.host()))?;
    url.set_port(config.port().into())
        .map_err(|_| ConnectError::Component("port"))?;
    if let Some(password) = config.password() {
        url.set_password(Some(password))
            .map_err(|_| ConnectError::Component("password"))?;
    }
    url.path_segments_mut()
        .map_err(|_| ConnectError::Component("db"))?
        .extend(&[config.db().to_string()]);

    Ok(url)
}

#[instrument(skip_all, name = "connect-redis")]
pub async fn connect_redis_db<C>(config: &C) -> Result<Pool, ConnectError>
where
    C: config::DbConnectConfig,
{
    let url = redis_url(config)?;

    info!(
        redis.host = config.host(),
        redis.port = config.port(),
        redis.db = config.db(),
        redis.connect = true
    );

    let cfg = Config {
        url: Some(url.to_string()),
        pool: Some(deadpool_redis::PoolConfig::default()),
        connection: None,
    };

    let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
    Ok(pool)
}

/// A [`KeyStore`] over a shared Redis pool.
pub fn redis_key_store(pool: Pool, config: &config::CacheConfig) -> KeyStore {
    KeyStore::from_config(Arc::new(RedisCache::new(pool)), config)
}
