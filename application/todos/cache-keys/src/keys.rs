use redis_connection::{cache_key, core::CacheKey};
use todo_models::{
    ListSummary, ListWithTasks, OwnerId, Priority, Task, TodoList,
};

cache_key!(ListCacheKey::<TodoList> => "users:{}:lists:{}"[owner: OwnerId, id: i64]);
cache_key!(ListWithTasksCacheKey::<ListWithTasks> => "users:{}:lists:{}:withTasks"[owner: OwnerId, id: i64]);
cache_key!(UserListsCacheKey::<Vec<ListSummary>> => "users:{}:lists"[owner: OwnerId]);
cache_key!(UserListsWithTasksCacheKey::<Vec<ListWithTasks>> => "users:{}:lists:withTasks"[owner: OwnerId]);

cache_key!(TaskCacheKey::<Task> => "users:{}:tasks:{}"[owner: OwnerId, id: i64]);
cache_key!(ListTasksCacheKey::<Vec<Task>> => "users:{}:lists:{}:tasks"[owner: OwnerId, list_id: i64]);
cache_key!(AllTasksCacheKey::<Vec<Task>> => "users:{}:tasks"[owner: OwnerId]);
cache_key!(TasksWithStatusCacheKey::<Vec<Task>> => "users:{}:tasks:status:{}"[owner: OwnerId, completed: bool]);

cache_key!(PrioritiesCacheKey::<Vec<Priority>> => "priorities");
cache_key!(PriorityCacheKey::<Priority> => "priorities:{}"[id: i64]);

pub fn list(owner: &OwnerId, id: i64) -> String {
    ListCacheKey.get_key_with_args((owner, &id)).into_owned()
}

pub fn list_with_tasks(owner: &OwnerId, id: i64) -> String {
    ListWithTasksCacheKey
        .get_key_with_args((owner, &id))
        .into_owned()
}

pub fn user_lists(owner: &OwnerId) -> String {
    UserListsCacheKey.get_key_with_args((owner,)).into_owned()
}

pub fn user_lists_with_tasks(owner: &OwnerId) -> String {
    UserListsWithTasksCacheKey
        .get_key_with_args((owner,))
        .into_owned()
}

pub fn task(owner: &OwnerId, id: i64) -> String {
    TaskCacheKey.get_key_with_args((owner, &id)).into_owned()
}

pub fn list_tasks(owner: &OwnerId, list_id: i64) -> String {
    ListTasksCacheKey
        .get_key_with_args((owner, &list_id))
        .into_owned()
}

pub fn user_tasks(owner: &OwnerId) -> String {
    AllTasksCacheKey.get_key_with_args((owner,)).into_owned()
}

pub fn tasks_with_status(owner: &OwnerId, completed: bool) -> String {
    TasksWithStatusCacheKey
        .get_key_with_args((owner, &completed))
        .into_owned()
}

pub fn priorities() -> String { PrioritiesCacheKey.get_key().into_owned() }

pub fn priority(id: i64) -> String {
    PriorityCacheKey.get_key_with_args((&id,)).into_owned()
}

/// Everything cached for one owner.
pub fn owner_pattern(owner: &OwnerId) -> String { format!("users:{owner}:*") }

pub fn owner_task_pattern(owner: &OwnerId) -> String {
    format!("users:{owner}:tasks:*")
}

pub fn owner_status_pattern(owner: &OwnerId) -> String {
    format!("users:{owner}:tasks:status:*")
}

/// Every owner's list and task views; these may embed priorities.
pub fn aggregate_sweep_patterns() -> [&'static str; 2] {
    ["users:*:lists*", "users:*:tasks*"]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId { OwnerId::parse("u1").unwrap() }

    #[test]
    fn test_owner_scoped_keys_share_prefix() {
        let o = owner();
        for key in [
            list(&o, 3),
            list_with_tasks(&o, 3),
            user_lists(&o),
            user_lists_with_tasks(&o),
            task(&o, 9),
            list_tasks(&o, 3),
            user_tasks(&o),
            tasks_with_status(&o, false),
        ] {
            assert!(key.starts_with("users:u1:"), "{key}");
        }
    }

    #[test]
    fn test_key_layout() {
        let o = owner();
        assert_eq!(list(&o, 3), "users:u1:lists:3");
        assert_eq!(list_with_tasks(&o, 3), "users:u1:lists:3:withTasks");
        assert_eq!(user_lists_with_tasks(&o), "users:u1:lists:withTasks");
        assert_eq!(list_tasks(&o, 3), "users:u1:lists:3:tasks");
        assert_eq!(tasks_with_status(&o, true), "users:u1:tasks:status:true");
        assert_eq!(priorities(), "priorities");
        assert_eq!(priority(2), "priorities:2");
        assert_eq!(owner_pattern(&o), "users:u1:*");
    }
}
