//! In-process fixtures shared by the workspace tests.
//!
//! Nothing here needs a running Redis, Postgres or broker: the cache is
//! the moka backend, the durable store is [`MemoryTodoStore`] and a cache
//! outage is [`UnreachableCache`].

pub mod cache;
pub mod fixtures;

pub use cache::{
    TEST_TTL, UnreachableCache, memory_key_store, shared_key_store,
    unreachable_key_store,
};
pub use fixtures::*;
pub use todo_dao::MemoryTodoStore;
