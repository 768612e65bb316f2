//! Which cached views a mutation makes stale.
//!
//! The rules are pure: [`CacheInvalidationPolicy::plan`] only computes an
//! [`InvalidationSet`]. Applying it goes through the [`KeyStore`], which
//! never fails, so a repository calls [`InvalidationSet::apply`] after a
//! successful write and moves on.

use redis_connection::KeyStore;
use todo_models::OwnerId;
use tracing::{debug, instrument};

use crate::keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create,
    Update,
    Delete,
    /// Everything the owner has of this kind, e.g. all tasks of a list.
    BulkDeleteByOwner,
    StatusChange,
}

/// What was mutated.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    List {
        owner: &'a OwnerId,
        list_id: Option<i64>,
    },
    /// `list_ids` are every list the task belonged to before and after the
    /// write; a task moved between lists touches both. Without a `task_id`
    /// the write hit an unknown set of tasks.
    Task {
        owner: &'a OwnerId,
        task_id: Option<i64>,
        list_ids: &'a [i64],
    },
    Priority {
        priority_id: Option<i64>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationSet {
    pub keys: Vec<String>,
    pub patterns: Vec<String>,
}

impl InvalidationSet {
    fn key(&mut self, key: String) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    fn pattern(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.patterns.is_empty()
    }

    /// Deletes the exact keys in one round trip, then sweeps each pattern.
    #[instrument(
        skip_all,
        fields(keys = self.keys.len(), patterns = self.patterns.len())
    )]
    pub async fn apply(&self, store: &KeyStore) {
        store.delete_many(&self.keys).await;
        let mut swept = 0;
        for pattern in &self.patterns {
            swept += store.delete_by_pattern(pattern).await;
        }
        debug!(swept, "Applied cache invalidation");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheInvalidationPolicy;

impl CacheInvalidationPolicy {
    pub fn plan(&self, subject: Subject<'_>, mutation: Mutation) -> InvalidationSet {
        let mut set = InvalidationSet::default();
        match subject {
            Subject::List { owner, list_id } => {
                Self::list(&mut set, owner, list_id, mutation)
            }
            Subject::Task {
                owner,
                task_id,
                list_ids,
            } => Self::task(&mut set, owner, task_id, list_ids, mutation),
            Subject::Priority { priority_id } => {
                Self::priority(&mut set, priority_id)
            }
        }
        set
    }

    /// Plans and applies in one step.
    pub async fn invalidate(
        &self, store: &KeyStore, subject: Subject<'_>, mutation: Mutation,
    ) {
        self.plan(subject, mutation).apply(store).await
    }

    /// Drops every cached view of one owner.
    pub async fn purge_owner(&self, store: &KeyStore, owner: &OwnerId) -> u64 {
        store.delete_by_pattern(&keys::owner_pattern(owner)).await
    }

    /// Drops the list and task views of every owner.
    pub async fn clear_owner_aggregates(&self, store: &KeyStore) -> u64 {
        let mut removed = 0;
        for pattern in keys::aggregate_sweep_patterns() {
            removed += store.delete_by_pattern(pattern).await;
        }
        removed
    }

    fn list(
        set: &mut InvalidationSet, owner: &OwnerId, list_id: Option<i64>,
        mutation: Mutation,
    ) {
        match mutation {
            Mutation::Create => {
                set.key(keys::user_lists(owner));
                set.key(keys::user_lists_with_tasks(owner));
            }
            Mutation::Update | Mutation::StatusChange => {
                if let Some(id) = list_id {
                    set.key(keys::list(owner, id));
                    set.key(keys::list_with_tasks(owner, id));
                }
                else {
                    set.pattern(keys::owner_pattern(owner));
                }
                set.key(keys::user_lists(owner));
                set.key(keys::user_lists_with_tasks(owner));
            }
            // tasks cascade with their list, so every owner view is stale
            Mutation::Delete | Mutation::BulkDeleteByOwner => {
                set.pattern(keys::owner_pattern(owner))
            }
        }
    }

    fn task(
        set: &mut InvalidationSet, owner: &OwnerId, task_id: Option<i64>,
        list_ids: &[i64], mutation: Mutation,
    ) {
        if mutation == Mutation::BulkDeleteByOwner {
            set.pattern(keys::owner_pattern(owner));
            return;
        }

        match task_id {
            Some(id) => set.key(keys::task(owner, id)),
            None => set.pattern(keys::owner_task_pattern(owner)),
        }
        for &list_id in list_ids {
            set.key(keys::list_tasks(owner, list_id));
            set.key(keys::list_with_tasks(owner, list_id));
        }
        // list summaries carry task counts
        set.key(keys::user_lists(owner));
        set.key(keys::user_lists_with_tasks(owner));
        set.key(keys::user_tasks(owner));
        set.pattern(keys::owner_status_pattern(owner));
    }

    fn priority(set: &mut InvalidationSet, priority_id: Option<i64>) {
        set.key(keys::priorities());
        if let Some(id) = priority_id {
            set.key(keys::priority(id));
        }
        for pattern in keys::aggregate_sweep_patterns() {
            set.pattern(pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId { OwnerId::parse("u1").unwrap() }

    fn plan(subject: Subject<'_>, mutation: Mutation) -> InvalidationSet {
        CacheInvalidationPolicy.plan(subject, mutation)
    }

    #[test]
    fn test_list_create_touches_only_collections() {
        let o = owner();
        let set = plan(
            Subject::List {
                owner: &o,
                list_id: Some(1),
            },
            Mutation::Create,
        );
        assert_eq!(set.keys, vec!["users:u1:lists", "users:u1:lists:withTasks"]);
        assert!(set.patterns.is_empty());
    }

    #[test]
    fn test_list_update_touches_entity_and_collections() {
        let o = owner();
        let set = plan(
            Subject::List {
                owner: &o,
                list_id: Some(4),
            },
            Mutation::Update,
        );
        assert_eq!(set.keys, vec![
            "users:u1:lists:4",
            "users:u1:lists:4:withTasks",
            "users:u1:lists",
            "users:u1:lists:withTasks",
        ]);
    }

    #[test]
    fn test_list_delete_sweeps_owner() {
        let o = owner();
        for mutation in [Mutation::Delete, Mutation::BulkDeleteByOwner] {
            let set = plan(
                Subject::List {
                    owner: &o,
                    list_id: Some(4),
                },
                mutation,
            );
            assert_eq!(set.patterns, vec!["users:u1:*"]);
        }
    }

    #[test]
    fn test_task_move_touches_both_lists() {
        let o = owner();
        let set = plan(
            Subject::Task {
                owner: &o,
                task_id: Some(9),
                list_ids: &[1, 2],
            },
            Mutation::Update,
        );
        for key in [
            "users:u1:tasks:9",
            "users:u1:lists:1:tasks",
            "users:u1:lists:1:withTasks",
            "users:u1:lists:2:tasks",
            "users:u1:lists:2:withTasks",
            "users:u1:lists",
            "users:u1:lists:withTasks",
            "users:u1:tasks",
        ] {
            assert!(set.keys.contains(&key.to_string()), "{key}");
        }
        assert_eq!(set.patterns, vec!["users:u1:tasks:status:*"]);
    }

    #[test]
    fn test_task_delete_without_id_sweeps_task_entities() {
        let o = owner();
        let set = plan(
            Subject::Task {
                owner: &o,
                task_id: None,
                list_ids: &[3],
            },
            Mutation::Delete,
        );
        assert!(set.patterns.contains(&"users:u1:tasks:*".to_string()));
        assert!(set.keys.contains(&"users:u1:lists:3:tasks".to_string()));
    }

    #[test]
    fn test_duplicate_lists_are_planned_once() {
        let o = owner();
        let set = plan(
            Subject::Task {
                owner: &o,
                task_id: Some(1),
                list_ids: &[5, 5],
            },
            Mutation::StatusChange,
        );
        let count = set
            .keys
            .iter()
            .filter(|k| *k == "users:u1:lists:5:tasks")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_priority_change_sweeps_every_owner() {
        let set = plan(Subject::Priority { priority_id: Some(2) }, Mutation::Update);
        assert_eq!(set.keys, vec!["priorities", "priorities:2"]);
        assert_eq!(set.patterns, vec!["users:*:lists*", "users:*:tasks*"]);
    }
}
