use std::env;

use anyhow::Result;
use clap::{Parser, Subcommand};
use redis_connection::{
    config::{CacheConfig, RedisDbConfig},
    connect_redis_db, redis_key_store,
};
use todo_cache_keys::CacheInvalidationPolicy;
use tracing::{Level, info};

#[derive(Parser)]
#[command(name = "clear-cache")]
#[command(about = "Inspect or clear one service's cache namespace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, help = "Redis host (or use REDIS_HOST env var)")]
    host: Option<String>,

    #[arg(long, help = "Redis port (or use REDIS_PORT env var)")]
    port: Option<u16>,

    #[arg(long, help = "Redis database index")]
    db: Option<u8>,

    #[arg(
        short,
        long,
        help = "Cache namespace (or use CACHE_NAMESPACE env var)"
    )]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deletes every key of the namespace, or only those matching PATTERN.
    Clear {
        #[arg(short, long, help = "Glob over logical keys, e.g. users:7:*")]
        pattern: Option<String>,
    },

    /// Drops every owner's cached list and task views, e.g. after
    /// priorities were edited directly in the database.
    Aggregates,

    /// Lists the logical keys matching PATTERN.
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    let defaults = RedisDbConfig::default();
    let redis = RedisDbConfig {
        host: cli.host.unwrap_or_else(|| env_or("REDIS_HOST", defaults.host)),
        port: cli.port.unwrap_or_else(|| env_or("REDIS_PORT", defaults.port)),
        db: cli.db.unwrap_or_else(|| env_or("REDIS_DB", defaults.db)),
        password: env::var("REDIS_PASSWORD").ok(),
    };
    let cache = CacheConfig {
        namespace: cli.namespace.unwrap_or_else(|| {
            env_or("CACHE_NAMESPACE", CacheConfig::default().namespace)
        }),
        ..CacheConfig::default()
    };

    let pool = connect_redis_db(&redis).await?;
    let store = redis_key_store(pool, &cache);

    match cli.command {
        Commands::Clear { pattern } => {
            let pattern = pattern.as_deref().unwrap_or("*");
            // surfaces an unreachable backend, which the deletes swallow
            let matched = store.keys(pattern).await?.len();
            let deleted = if pattern == "*" {
                store.clear().await
            }
            else {
                store.delete_by_pattern(pattern).await
            };
            info!(
                namespace = %cache.namespace,
                pattern = %pattern,
                matched,
                deleted,
                "Cache cleared"
            );
        }
        Commands::Aggregates => {
            let deleted =
                CacheInvalidationPolicy.clear_owner_aggregates(&store).await;
            info!(namespace = %cache.namespace, deleted, "Owner views cleared");
        }
        Commands::Keys { pattern } => {
            let mut keys = store.keys(&pattern).await?;
            keys.sort();
            for key in &keys {
                println!("{key}");
            }
            info!(namespace = %cache.namespace, count = keys.len());
        }
    }

    Ok(())
}
