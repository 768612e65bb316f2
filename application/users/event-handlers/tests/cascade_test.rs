use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use database_traits::dao::OwnedDao;
use event_bus::{
    Ack, DeliveryTag, EventConsumer, InboundMessage, MemoryBroker,
    MessageBroker, MessageHandler, PermanentFailure, Subscription,
};
use redis_connection::Memory;
use serde_json::json;
use test_utils::{
    MemoryTodoStore, init_tracing, memory_key_store, owner, seed_owner,
    shared_key_store,
};
use todo_commands::{CreateListCommand, UpdateListCommand};
use todo_dao::ListStore;
use todo_errors::{TodoError, TodoResult};
use todo_models::{ListSummary, OwnerId, TodoList};
use todo_repositories::{OwnerPurge, TodoServices, TodoStores};
use user_event_handlers::{
    CascadeHandler, USER_DELETE_TOPIC, UserDeletionPublisher,
};

fn services(store: &MemoryTodoStore) -> TodoServices {
    init_tracing();
    TodoServices::new(TodoStores::memory(store), memory_key_store("todo"))
}

/// Lists backed by the memory store whose bulk delete always fails, so a
/// purge stops after the tasks are gone.
struct FailingListPurge(MemoryTodoStore);

#[async_trait]
impl OwnedDao for FailingListPurge {
    type CreateRequest = CreateListCommand;
    type Error = TodoError;
    type ID = i64;
    type Model = TodoList;
    type Owner = OwnerId;
    type UpdateRequest = UpdateListCommand;

    async fn find_by_id(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<Option<TodoList>> {
        self.0.find_by_id(id, owner).await
    }

    async fn all_for_owner(
        &self, owner: &OwnerId,
    ) -> TodoResult<Vec<TodoList>> {
        self.0.all_for_owner(owner).await
    }

    async fn create(
        &self, owner: &OwnerId, req: CreateListCommand,
    ) -> TodoResult<TodoList> {
        self.0.create(owner, req).await
    }

    async fn update(
        &self, id: i64, owner: &OwnerId, req: UpdateListCommand,
    ) -> TodoResult<Option<TodoList>> {
        self.0.update(id, owner, req).await
    }

    async fn delete(&self, id: i64, owner: &OwnerId) -> TodoResult<u64> {
        self.0.delete(id, owner).await
    }

    async fn delete_all_for_owner(
        &self, _owner: &OwnerId,
    ) -> TodoResult<u64> {
        Err(TodoError::StoreUnavailable("connection reset".into()))
    }
}

#[async_trait]
impl ListStore for FailingListPurge {
    async fn summaries(
        &self, owner: &OwnerId,
    ) -> TodoResult<Vec<ListSummary>> {
        self.0.summaries(owner).await
    }
}

/// Reads every owner view so the cache holds something to invalidate.
async fn warm(svc: &TodoServices, u: &OwnerId) {
    svc.lists.get_all_for_owner(u).await.unwrap();
    svc.lists.get_all_for_owner_with_tasks(u).await.unwrap();
    svc.tasks.get_all_for_owner(u).await.unwrap();
    svc.tasks.get_with_status(u, false).await.unwrap();
}

async fn consuming(
    broker: &MemoryBroker, svc: &TodoServices,
) -> EventConsumer {
    let mut consumer =
        EventConsumer::new(Arc::new(broker.clone()), Duration::from_secs(1));
    consumer.connect().await.unwrap();
    consumer
        .subscribe(
            USER_DELETE_TOPIC,
            Arc::new(CascadeHandler::new(svc.clone())),
        )
        .await
        .unwrap();
    consumer
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn message(payload: serde_json::Value) -> InboundMessage {
    InboundMessage {
        topic: USER_DELETE_TOPIC.to_string(),
        tag: DeliveryTag::new("1"),
        payload,
        redelivered: false,
    }
}

#[tokio::test]
async fn test_user_delete_wipes_owner_data_and_cache() {
    let store = MemoryTodoStore::new();
    let svc = services(&store);
    let (u, other) = (owner("U"), owner("U2"));
    let seeded = seed_owner(&store, &u, 3, 10).await.unwrap();
    assert_eq!(seeded.tasks.len(), 10);
    seed_owner(&store, &other, 1, 2).await.unwrap();
    warm(&svc, &u).await;
    warm(&svc, &other).await;
    assert!(!svc.cache().keys("users:U:*").await.unwrap().is_empty());

    let broker = MemoryBroker::new();
    let mut consumer = consuming(&broker, &svc).await;
    UserDeletionPublisher::new(Arc::new(broker.clone()))
        .publish(&u)
        .await
        .unwrap();

    wait_until(|| consumer.metrics().acked == 1).await;

    assert!(svc.cache().keys("users:U:*").await.unwrap().is_empty());
    assert!(svc.lists.get_all_for_owner(&u).await.unwrap().is_empty());
    assert!(svc.tasks.get_all_for_owner(&u).await.unwrap().is_empty());

    let untouched = svc.lists.get_all_for_owner(&other).await.unwrap();
    assert_eq!(untouched.len(), 1);
    assert_eq!(untouched[0].total_tasks, 2);
    assert!(!svc.cache().keys("users:U2:*").await.unwrap().is_empty());

    consumer.disconnect().await;
}

#[tokio::test]
async fn test_cache_is_empty_for_owner_right_after_cascade() {
    let store = MemoryTodoStore::new();
    let svc = services(&store);
    let u = owner("U");
    seed_owner(&store, &u, 3, 10).await.unwrap();
    warm(&svc, &u).await;

    let event = json!({ "type": "user.delete", "payload": { "userId": "U" } });
    let outcome = CascadeHandler::new(svc.clone()).handle(message(event)).await;

    assert_eq!(outcome.unwrap(), Ack);
    assert!(svc.cache().keys("users:U:*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_message_is_skipped_and_consumption_continues() {
    let store = MemoryTodoStore::new();
    let svc = services(&store);
    let u = owner("U");
    seed_owner(&store, &u, 1, 1).await.unwrap();
    let broker = MemoryBroker::new();
    let mut consumer = consuming(&broker, &svc).await;

    broker
        .publish(USER_DELETE_TOPIC, Bytes::from_static(b"{not json"))
        .await
        .unwrap();
    broker
        .publish(USER_DELETE_TOPIC, Bytes::from_static(br#"{"userId":""}"#))
        .await
        .unwrap();
    // the bare body older producers send
    broker
        .publish(USER_DELETE_TOPIC, Bytes::from_static(br#"{"userId":"U"}"#))
        .await
        .unwrap();

    wait_until(|| consumer.metrics().acked == 1).await;
    let metrics = consumer.metrics();
    assert_eq!(metrics.received, 3);
    assert_eq!(metrics.discarded_malformed, 2);
    assert_eq!(broker.unacked(USER_DELETE_TOPIC), 0);
    assert_eq!(broker.recover(USER_DELETE_TOPIC).unwrap(), 0);
    assert!(svc.lists.get_all_for_owner(&u).await.unwrap().is_empty());

    consumer.disconnect().await;
}

#[tokio::test]
async fn test_cascade_is_idempotent() {
    let store = MemoryTodoStore::new();
    let svc = services(&store);
    let u = owner("U");
    seed_owner(&store, &u, 3, 10).await.unwrap();
    warm(&svc, &u).await;

    let handler = CascadeHandler::new(svc.clone());
    let first = handler.handle_owner_deleted(&u).await.unwrap();
    handler.handle(message(json!({ "userId": "U" }))).await.unwrap();
    let third = handler.handle_owner_deleted(&u).await.unwrap();

    assert_eq!(first, OwnerPurge { tasks: 10, lists: 3 });
    assert_eq!(third, OwnerPurge::default());
    assert!(svc.cache().keys("users:U:*").await.unwrap().is_empty());
    assert!(svc.tasks.get_all_for_owner(&u).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redelivered_event_after_crash_is_harmless() {
    let store = MemoryTodoStore::new();
    let svc = services(&store);
    let u = owner("U");
    seed_owner(&store, &u, 2, 4).await.unwrap();
    let broker = MemoryBroker::new();
    UserDeletionPublisher::new(Arc::new(broker.clone()))
        .publish(&u)
        .await
        .unwrap();

    // a consumer took the message and died before acking
    let mut sub = broker.subscribe(USER_DELETE_TOPIC).await.unwrap();
    sub.next().await.unwrap().unwrap();
    svc.purge_owner(&u).await.unwrap();
    drop(sub);
    assert_eq!(broker.recover(USER_DELETE_TOPIC).unwrap(), 1);

    let mut consumer = consuming(&broker, &svc).await;
    wait_until(|| consumer.metrics().acked == 1).await;

    assert!(svc.lists.get_all_for_owner(&u).await.unwrap().is_empty());
    consumer.disconnect().await;
}

#[tokio::test]
async fn test_store_failure_discards_the_event() {
    let store = MemoryTodoStore::new();
    let svc = services(&store);
    store.set_available(false);

    let outcome = CascadeHandler::new(svc)
        .handle(message(json!({ "userId": "U" })))
        .await;

    assert!(matches!(outcome, Err(PermanentFailure::Handler(_))));
}

#[tokio::test]
async fn test_failed_list_purge_still_sweeps_owner_cache() {
    init_tracing();
    let store = MemoryTodoStore::new();
    let stores = TodoStores {
        lists: Arc::new(FailingListPurge(store.clone())),
        tasks: Arc::new(store.tasks()),
        priorities: Arc::new(store.priorities()),
    };
    let svc = TodoServices::new(stores, memory_key_store("todo"));
    let u = owner("U");
    seed_owner(&store, &u, 2, 5).await.unwrap();
    warm(&svc, &u).await;
    assert!(!svc.cache().keys("users:U:*").await.unwrap().is_empty());

    let outcome = CascadeHandler::new(svc.clone())
        .handle_owner_deleted(&u)
        .await;

    assert!(matches!(outcome, Err(TodoError::StoreUnavailable(_))));
    assert!(svc.cache().keys("users:U:*").await.unwrap().is_empty());
    assert!(svc.tasks.get_all_for_owner(&u).await.unwrap().is_empty());
    let lists = svc.lists.get_all_for_owner(&u).await.unwrap();
    assert_eq!(lists.len(), 2);
    assert!(lists.iter().all(|l| l.total_tasks == 0));
}

#[tokio::test]
async fn test_cascade_never_touches_another_namespace() {
    init_tracing();
    let backend = Arc::new(Memory::default());
    let todo_cache = shared_key_store(backend.clone(), "todo");
    let auth_cache = shared_key_store(backend, "auth");
    let store = MemoryTodoStore::new();
    let svc =
        TodoServices::new(TodoStores::memory(&store), todo_cache.clone());
    let u = owner("U");
    seed_owner(&store, &u, 1, 1).await.unwrap();
    warm(&svc, &u).await;
    auth_cache.set("users:U:profile", &json!({ "name": "u" })).await;

    svc.purge_owner(&u).await.unwrap();
    todo_cache.clear().await;

    assert!(todo_cache.keys("*").await.unwrap().is_empty());
    assert_eq!(auth_cache.keys("users:U:*").await.unwrap(), vec![
        "users:U:profile".to_string()
    ]);
}
