//! Worker settings read from the environment (after `.env` is loaded).

use std::str::FromStr;

use event_bus::BrokerConfig;
use redis_connection::config::{CacheConfig, RedisDbConfig};
use sql_connection::PostgresDbConfig;

#[derive(Debug, thiserror::Error)]
#[error("Invalid value {value:?} for {var}")]
pub struct ConfigError {
    var: &'static str,
    value: String,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub postgres: PostgresDbConfig,
    pub redis: RedisDbConfig,
    pub cache: CacheConfig,
    pub broker: BrokerConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Unset variables keep their defaults.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = Env(lookup);
        let mut config = Self::default();

        env.set("DATABASE_URL", &mut config.postgres.uri)?;
        env.set_opt("DATABASE_MAX_CONN", &mut config.postgres.max_conn)?;
        env.set_opt("DATABASE_MIN_CONN", &mut config.postgres.min_conn)?;
        env.set("DATABASE_LOGGER", &mut config.postgres.logger)?;

        env.set("REDIS_HOST", &mut config.redis.host)?;
        env.set("REDIS_PORT", &mut config.redis.port)?;
        env.set("REDIS_DB", &mut config.redis.db)?;
        env.set_opt("REDIS_PASSWORD", &mut config.redis.password)?;

        env.set("CACHE_NAMESPACE", &mut config.cache.namespace)?;
        env.set("REDIS_TTL", &mut config.cache.ttl_secs)?;
        env.set("CLEAR_CACHE_ON_START", &mut config.cache.clear_on_start)?;

        env.set("BROKER_GROUP", &mut config.broker.stream_group)?;
        env.set("BROKER_CONSUMER", &mut config.broker.consumer_name)?;
        env.set("BROKER_BLOCK_MS", &mut config.broker.block_ms)?;
        env.set(
            "SHUTDOWN_GRACE_SECS",
            &mut config.broker.shutdown_grace_secs,
        )?;

        Ok(config)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn parse<T: FromStr>(
        &self, var: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        match (self.0)(var) {
            None => Ok(None),
            Some(value) => {
                value
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError { var, value })
            }
        }
    }

    fn set<T: FromStr>(
        &self, var: &'static str, slot: &mut T,
    ) -> Result<(), ConfigError> {
        if let Some(value) = self.parse(var)? {
            *slot = value;
        }
        Ok(())
    }

    fn set_opt<T: FromStr>(
        &self, var: &'static str, slot: &mut Option<T>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = self.parse(var)? {
            *slot = Some(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config(&[]).unwrap();

        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.cache.namespace, "taskmaster");
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(!config.cache.clear_on_start);
        assert_eq!(config.broker.stream_group, "taskmaster");
    }

    #[test]
    fn test_environment_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgresql://u:p@db/todos"),
            ("DATABASE_MAX_CONN", "16"),
            ("REDIS_HOST", "cache"),
            ("REDIS_PORT", "6380"),
            ("REDIS_TTL", "60"),
            ("CLEAR_CACHE_ON_START", "true"),
            ("CACHE_NAMESPACE", "todo"),
            ("BROKER_CONSUMER", "worker-1"),
            ("SHUTDOWN_GRACE_SECS", "3"),
        ])
        .unwrap();

        assert_eq!(config.postgres.uri, "postgresql://u:p@db/todos");
        assert_eq!(config.postgres.max_conn, Some(16));
        assert_eq!(config.redis.host, "cache");
        assert_eq!(config.redis.port, 6380);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.clear_on_start);
        assert_eq!(config.cache.namespace, "todo");
        assert_eq!(config.broker.consumer_name, "worker-1");
        assert_eq!(config.broker.shutdown_grace_secs, 3);
    }

    #[test]
    fn test_unparsable_value_is_rejected() {
        let err = config(&[("REDIS_PORT", "sixty")]).unwrap_err();

        assert_eq!(err.to_string(), r#"Invalid value "sixty" for REDIS_PORT"#);
    }
}
