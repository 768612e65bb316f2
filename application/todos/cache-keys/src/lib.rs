//! Cache key layout and invalidation rules for the todo service.
//!
//! Every owner-scoped key starts with `users:<owner>:`, so one pattern
//! removes everything cached for an owner. Priorities are shared and live
//! under the flat `priorities` prefix.

mod invalidation;
pub mod keys;

pub use invalidation::{
    CacheInvalidationPolicy, InvalidationSet, Mutation, Subject,
};
pub use keys::{
    AllTasksCacheKey, ListCacheKey, ListTasksCacheKey, ListWithTasksCacheKey,
    PrioritiesCacheKey, PriorityCacheKey, TaskCacheKey,
    TasksWithStatusCacheKey, UserListsCacheKey, UserListsWithTasksCacheKey,
};
