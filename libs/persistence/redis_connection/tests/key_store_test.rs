use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use redis_connection::{
    CacheError, CacheStore, KeyStore, Memory, Namespace,
    cache::CacheResult, cache_key, core::CacheTypeBind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub body: String,
}

cache_key!(NoteCacheKey::<Note> => "users:{}:notes:{}"[owner: String, id: i64]);
cache_key!(AllNotesCacheKey::<Vec<Note>> => "notes");

/// A backend whose every call fails, like a Redis that went away.
struct Unreachable;

#[async_trait]
impl CacheStore for Unreachable {
    async fn get(&self, _: &str) -> CacheResult<Option<Bytes>> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set_with_ttl(&self, _: &str, _: Bytes, _: Duration) -> CacheResult<()> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn remove(&self, _: &str) -> CacheResult<u64> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn remove_many(&self, _: &[String]) -> CacheResult<u64> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn keys(&self, _: &str) -> CacheResult<Vec<String>> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

fn store_in(backend: Arc<dyn CacheStore>, namespace: &str) -> KeyStore {
    KeyStore::new(backend, Namespace::new(namespace), Duration::from_secs(60))
}

fn note(id: i64) -> Note {
    Note {
        id,
        body: format!("note {id}"),
    }
}

#[tokio::test]
async fn test_set_and_get_through_namespace() {
    let backend = Arc::new(Memory::default());
    let store = store_in(backend.clone(), "taskmaster");

    store.set("users:7:notes:1", &note(1)).await;

    assert_eq!(store.get::<Note>("users:7:notes:1").await, Some(note(1)));
    // the physical key carries the prefix
    assert!(
        backend
            .get("taskmaster:users:7:notes:1")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_delete_by_pattern_uses_logical_keys() {
    let store = store_in(Arc::new(Memory::default()), "taskmaster");
    store.set("users:7:notes:1", &note(1)).await;
    store.set("users:7:notes:2", &note(2)).await;
    store.set("users:8:notes:3", &note(3)).await;

    let removed = store.delete_by_pattern("users:7:*").await;

    assert_eq!(removed, 2);
    assert_eq!(store.keys("*").await.unwrap(), vec!["users:8:notes:3"]);
}

#[tokio::test]
async fn test_clear_leaves_other_namespaces_alone() {
    let backend: Arc<dyn CacheStore> = Arc::new(Memory::default());
    let todos = store_in(backend.clone(), "taskmaster");
    let auth = store_in(backend.clone(), "auth");
    todos.set("users:7:notes:1", &note(1)).await;
    auth.set("users:7:notes:1", &note(100)).await;

    assert_eq!(todos.clear().await, 1);

    assert_eq!(todos.get::<Note>("users:7:notes:1").await, None);
    assert_eq!(auth.get::<Note>("users:7:notes:1").await, Some(note(100)));
}

#[tokio::test]
async fn test_pattern_delete_never_crosses_namespaces() {
    let backend: Arc<dyn CacheStore> = Arc::new(Memory::default());
    let todos = store_in(backend.clone(), "taskmaster");
    let auth = store_in(backend.clone(), "auth");
    todos.set("users:7:notes:1", &note(1)).await;
    auth.set("users:7:notes:1", &note(100)).await;

    todos.delete_by_pattern("*").await;

    assert_eq!(auth.keys("*").await.unwrap(), vec!["users:7:notes:1"]);
}

#[tokio::test]
async fn test_unreachable_backend_degrades_to_misses() {
    let store = store_in(Arc::new(Unreachable), "taskmaster");

    store.set("users:7:notes:1", &note(1)).await;
    store.delete("users:7:notes:1").await;
    store.delete_many(&["a".into(), "b".into()]).await;

    assert_eq!(store.get::<Note>("users:7:notes:1").await, None);
    assert_eq!(store.delete_by_pattern("users:7:*").await, 0);
    assert_eq!(store.clear().await, 0);
    assert!(store.keys("*").await.is_err());
}

#[tokio::test]
async fn test_undecodable_entry_is_a_miss_and_dropped() {
    let backend = Arc::new(Memory::default());
    let store = store_in(backend.clone(), "taskmaster");
    backend
        .set_with_ttl(
            "taskmaster:users:7:notes:1",
            Bytes::from_static(b"{\"legacy\":true}"),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert_eq!(store.get::<Note>("users:7:notes:1").await, None);
    assert!(
        backend
            .get("taskmaster:users:7:notes:1")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_typed_key_binding() {
    let store = store_in(Arc::new(Memory::default()), "taskmaster");
    let owner = "7".to_string();

    let cached = NoteCacheKey.bind_with_args(&store, (&owner, &1));
    assert_eq!(cached.key(), "users:7:notes:1");
    assert_eq!(cached.try_get().await, None);

    cached.set(&note(1)).await;
    assert_eq!(cached.try_get().await, Some(note(1)));

    cached.remove().await;
    assert_eq!(cached.try_get().await, None);

    let all = AllNotesCacheKey.bind(&store);
    all.set(&vec![note(1), note(2)]).await;
    assert_eq!(all.try_get().await.map(|v| v.len()), Some(2));
}

/// Serves an entry of an older shape and refuses to delete anything.
struct StaleReadOnly;

#[async_trait]
impl CacheStore for StaleReadOnly {
    async fn get(&self, _: &str) -> CacheResult<Option<Bytes>> {
        Ok(Some(Bytes::from_static(br#"{"id":"one"}"#)))
    }

    async fn set_with_ttl(&self, _: &str, _: Bytes, _: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn remove(&self, _: &str) -> CacheResult<u64> {
        Err(CacheError::Unavailable("read-only replica".into()))
    }

    async fn remove_many(&self, _: &[String]) -> CacheResult<u64> {
        Err(CacheError::Unavailable("read-only replica".into()))
    }

    async fn keys(&self, _: &str) -> CacheResult<Vec<String>> { Ok(Vec::new()) }
}

#[tokio::test]
async fn test_undecodable_entry_that_cannot_be_dropped_is_still_a_miss() {
    let store = store_in(Arc::new(StaleReadOnly), "taskmaster");

    assert_eq!(store.get::<Note>("users:7:notes:1").await, None);
}
