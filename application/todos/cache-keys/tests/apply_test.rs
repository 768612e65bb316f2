use std::{sync::Arc, time::Duration};

use chrono::Utc;
use redis_connection::{
    KeyStore, Memory, Namespace,
    core::{CacheKey, CacheTypeBind},
};
use todo_cache_keys::{
    CacheInvalidationPolicy, ListCacheKey, Mutation, PriorityCacheKey, Subject,
    UserListsCacheKey, keys,
};
use todo_models::{ListSummary, OwnerId, Priority, TodoList};

fn store(namespace: &str) -> KeyStore {
    KeyStore::new(
        Arc::new(Memory::default()),
        Namespace::new(namespace),
        Duration::from_secs(60),
    )
}

fn list(owner: &OwnerId, id: i64) -> TodoList {
    let now = Utc::now();
    TodoList {
        id,
        owner_id: owner.clone(),
        title: format!("list {id}"),
        description: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_owner_sweep_leaves_other_owners_alone() {
    let store = store("todo");
    let one = OwnerId::parse("1").unwrap();
    let twelve = OwnerId::parse("12").unwrap();
    for owner in [&one, &twelve] {
        ListCacheKey
            .bind_with_args(&store, (owner, &1))
            .set(&list(owner, 1))
            .await;
        UserListsCacheKey
            .bind_with(&store, owner)
            .set(&Vec::<ListSummary>::new())
            .await;
    }

    CacheInvalidationPolicy
        .invalidate(
            &store,
            Subject::List {
                owner: &one,
                list_id: Some(1),
            },
            Mutation::Delete,
        )
        .await;

    assert!(store.keys("users:1:*").await.unwrap().is_empty());
    assert_eq!(store.keys("users:12:*").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_priority_change_clears_views_of_every_owner() {
    let store = store("todo");
    let priority = Priority {
        id: 2,
        name: "High".into(),
        level: 3,
    };
    PriorityCacheKey.bind_with(&store, &2).set(&priority).await;
    for raw in ["a", "b"] {
        let owner = OwnerId::parse(raw).unwrap();
        store.set(&keys::user_tasks(&owner), &Vec::<i64>::new()).await;
        store
            .set(&keys::list_with_tasks(&owner, 1), &Vec::<i64>::new())
            .await;
    }

    CacheInvalidationPolicy
        .invalidate(
            &store,
            Subject::Priority { priority_id: Some(2) },
            Mutation::Update,
        )
        .await;

    assert!(store.keys("*").await.unwrap().is_empty());
    assert_eq!(
        PriorityCacheKey.get_key_with_args((&2,)),
        "priorities:2"
    );
}

#[tokio::test]
async fn test_aggregate_sweep_keeps_reference_data() {
    let store = store("todo");
    let owner = OwnerId::parse("7").unwrap();
    store.set(&keys::user_lists(&owner), &Vec::<i64>::new()).await;
    store.set(&keys::task(&owner, 3), &3).await;
    store.set(&keys::priorities(), &Vec::<i64>::new()).await;

    let removed = CacheInvalidationPolicy.clear_owner_aggregates(&store).await;

    assert_eq!(removed, 2);
    assert_eq!(store.keys("*").await.unwrap(), vec!["priorities".to_string()]);
}
