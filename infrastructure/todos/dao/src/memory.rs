//! In-process store with the same ownership and cascade rules as the
//! Postgres tables. It can be switched offline and counts reads, which is
//! what cache tests need to observe.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use database_traits::dao::{OwnedDao, ReferenceDao};
use todo_commands::{
    CreateListCommand, CreatePriorityCommand, CreateTaskCommand,
    UpdateListCommand, UpdatePriorityCommand, UpdateTaskCommand,
};
use todo_errors::{TodoError, TodoResult};
use todo_models::{
    DEFAULT_PRIORITIES, Entity, ListSummary, OwnerId, Priority, Task,
    TodoList, task_order,
};

use crate::{ListStore, PriorityStore, TaskStore};

#[derive(Default)]
struct Tables {
    lists: BTreeMap<i64, TodoList>,
    tasks: BTreeMap<i64, Task>,
    priorities: BTreeMap<i64, Priority>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn owns_list(&self, list_id: i64, owner: &OwnerId) -> bool {
        self.lists
            .get(&list_id)
            .is_some_and(|list| &list.owner_id == owner)
    }

    fn owns_task(&self, task: &Task, owner: &OwnerId) -> bool {
        self.owns_list(task.list_id, owner)
    }

    fn owned_tasks<'a>(
        &'a self, owner: &'a OwnerId,
    ) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.values().filter(move |t| self.owns_task(t, owner))
    }

    fn check_priority(&self, priority_id: Option<i64>) -> TodoResult<()> {
        match priority_id {
            Some(id) if !self.priorities.contains_key(&id) => {
                Err(TodoError::validation("priority_id", "unknown priority"))
            }
            _ => Ok(()),
        }
    }

    fn check_level(&self, level: i32, except: Option<i64>) -> TodoResult<()> {
        let taken = self
            .priorities
            .values()
            .any(|p| p.level == level && Some(p.id) != except);
        if taken {
            Err(TodoError::ConstraintViolation("priorities_level_key".into()))
        }
        else {
            Ok(())
        }
    }

    fn remove_tasks(&mut self, keep: impl Fn(&Task) -> bool) -> u64 {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| keep(task));
        (before - self.tasks.len()) as u64
    }
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(task_order);
    tasks
}

fn newest_first(a: &TodoList, b: &TodoList) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

struct Inner {
    tables: Mutex<Tables>,
    available: AtomicBool,
    reads: AtomicU64,
}

#[derive(Clone)]
pub struct MemoryTodoStore {
    inner: Arc<Inner>,
}

impl Default for MemoryTodoStore {
    fn default() -> Self { Self::new() }
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                available: AtomicBool::new(true),
                reads: AtomicU64::new(0),
            }),
        }
    }

    /// While offline every call fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Read queries served so far.
    pub fn reads(&self) -> u64 { self.inner.reads.load(Ordering::SeqCst) }

    fn tables(&self) -> TodoResult<MutexGuard<'_, Tables>> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(TodoError::StoreUnavailable("store is offline".into()));
        }
        self.inner
            .tables
            .lock()
            .map_err(|_| TodoError::StoreUnavailable("store poisoned".into()))
    }

    fn read(&self) -> TodoResult<MutexGuard<'_, Tables>> {
        let tables = self.tables()?;
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        Ok(tables)
    }
}

#[async_trait]
impl OwnedDao for MemoryTodoStore {
    type CreateRequest = CreateListCommand;
    type Error = TodoError;
    type ID = i64;
    type Model = TodoList;
    type Owner = OwnerId;
    type UpdateRequest = UpdateListCommand;

    async fn find_by_id(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<Option<TodoList>> {
        let tables = self.read()?;
        Ok(tables
            .lists
            .get(&id)
            .filter(|list| &list.owner_id == owner)
            .cloned())
    }

    async fn all_for_owner(&self, owner: &OwnerId) -> TodoResult<Vec<TodoList>> {
        let tables = self.read()?;
        let mut lists: Vec<TodoList> = tables
            .lists
            .values()
            .filter(|list| &list.owner_id == owner)
            .cloned()
            .collect();
        lists.sort_by(newest_first);
        Ok(lists)
    }

    async fn create(
        &self, owner: &OwnerId, req: CreateListCommand,
    ) -> TodoResult<TodoList> {
        let mut tables = self.tables()?;
        let now = Utc::now();
        let list = TodoList {
            id: tables.next_id(),
            owner_id: owner.clone(),
            title: req.title.trim().to_string(),
            description: req.description,
            created_at: now,
            updated_at: now,
        };
        tables.lists.insert(list.id, list.clone());
        Ok(list)
    }

    async fn update(
        &self, id: i64, owner: &OwnerId, req: UpdateListCommand,
    ) -> TodoResult<Option<TodoList>> {
        let mut tables = self.tables()?;
        let Some(list) = tables
            .lists
            .get_mut(&id)
            .filter(|list| &list.owner_id == owner)
        else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            list.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            list.description = Some(description);
        }
        list.updated_at = Utc::now();
        Ok(Some(list.clone()))
    }

    async fn delete(&self, id: i64, owner: &OwnerId) -> TodoResult<u64> {
        let mut tables = self.tables()?;
        if !tables.owns_list(id, owner) {
            return Ok(0);
        }
        tables.lists.remove(&id);
        tables.remove_tasks(|task| task.list_id != id);
        Ok(1)
    }

    async fn delete_all_for_owner(&self, owner: &OwnerId) -> TodoResult<u64> {
        let mut tables = self.tables()?;
        let before = tables.lists.len();
        tables.lists.retain(|_, list| &list.owner_id != owner);
        let removed = (before - tables.lists.len()) as u64;

        let Tables { lists, tasks, .. } = &mut *tables;
        tasks.retain(|_, task| lists.contains_key(&task.list_id));
        Ok(removed)
    }
}

#[async_trait]
impl ListStore for MemoryTodoStore {
    async fn summaries(&self, owner: &OwnerId) -> TodoResult<Vec<ListSummary>> {
        let tables = self.read()?;
        let mut lists: Vec<&TodoList> = tables
            .lists
            .values()
            .filter(|list| &list.owner_id == owner)
            .collect();
        lists.sort_by(|a, b| newest_first(a, b));

        Ok(lists
            .into_iter()
            .map(|list| {
                let tasks = tables.tasks.values().filter(|t| t.list_id == list.id);
                let (total, pending) = tasks.fold((0, 0), |(total, pending), t| {
                    (total + 1, pending + i64::from(!t.is_completed))
                });
                ListSummary {
                    list: list.clone(),
                    total_tasks: total,
                    pending_tasks: pending,
                }
            })
            .collect())
    }
}

/// The task half of the store. A separate type keeps the two `OwnedDao`
/// impls apart.
#[derive(Clone)]
pub struct MemoryTaskStore(MemoryTodoStore);

/// The priority half of the store.
#[derive(Clone)]
pub struct MemoryPriorityStore(MemoryTodoStore);

impl MemoryTodoStore {
    pub fn tasks(&self) -> MemoryTaskStore { MemoryTaskStore(self.clone()) }

    pub fn priorities(&self) -> MemoryPriorityStore {
        MemoryPriorityStore(self.clone())
    }
}

#[async_trait]
impl OwnedDao for MemoryTaskStore {
    type CreateRequest = CreateTaskCommand;
    type Error = TodoError;
    type ID = i64;
    type Model = Task;
    type Owner = OwnerId;
    type UpdateRequest = UpdateTaskCommand;

    async fn find_by_id(
        &self, id: i64, owner: &OwnerId,
    ) -> TodoResult<Option<Task>> {
        let tables = self.0.read()?;
        Ok(tables
            .tasks
            .get(&id)
            .filter(|task| tables.owns_task(task, owner))
            .cloned())
    }

    async fn all_for_owner(&self, owner: &OwnerId) -> TodoResult<Vec<Task>> {
        let tables = self.0.read()?;
        Ok(sorted(tables.owned_tasks(owner).cloned().collect()))
    }

    async fn create(
        &self, owner: &OwnerId, req: CreateTaskCommand,
    ) -> TodoResult<Task> {
        let mut tables = self.0.tables()?;
        if !tables.owns_list(req.list_id, owner) {
            return Err(TodoError::not_found(Entity::List));
        }
        tables.check_priority(req.priority_id)?;

        let now = Utc::now();
        let task = Task {
            id: tables.next_id(),
            list_id: req.list_id,
            title: req.title.trim().to_string(),
            description: req.description,
            priority_id: req.priority_id,
            due_date: req.due_date,
            is_completed: false,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(
        &self, id: i64, owner: &OwnerId, req: UpdateTaskCommand,
    ) -> TodoResult<Option<Task>> {
        let mut tables = self.0.tables()?;
        let owned = tables
            .tasks
            .get(&id)
            .is_some_and(|task| tables.owns_task(task, owner));
        if !owned {
            return Ok(None);
        }
        if let Some(list_id) = req.list_id {
            if !tables.owns_list(list_id, owner) {
                return Err(TodoError::not_found(Entity::List));
            }
        }
        tables.check_priority(req.priority_id)?;

        let Some(task) = tables.tasks.get_mut(&id)
        else {
            return Ok(None);
        };
        if let Some(list_id) = req.list_id {
            task.list_id = list_id;
        }
        if let Some(title) = req.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            task.description = Some(description);
        }
        if let Some(priority_id) = req.priority_id {
            task.priority_id = Some(priority_id);
        }
        if let Some(due_date) = req.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(is_completed) = req.is_completed {
            task.is_completed = is_completed;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete(&self, id: i64, owner: &OwnerId) -> TodoResult<u64> {
        let mut tables = self.0.tables()?;
        let owned = tables
            .tasks
            .get(&id)
            .is_some_and(|task| tables.owns_task(task, owner));
        if owned {
            tables.tasks.remove(&id);
        }
        Ok(u64::from(owned))
    }

    async fn delete_all_for_owner(&self, owner: &OwnerId) -> TodoResult<u64> {
        let mut tables = self.0.tables()?;
        let Tables { lists, tasks, .. } = &mut *tables;
        let before = tasks.len();
        tasks.retain(|_, task| {
            !lists
                .get(&task.list_id)
                .is_some_and(|list| &list.owner_id == owner)
        });
        Ok((before - tasks.len()) as u64)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn for_list(
        &self, list_id: i64, owner: &OwnerId,
    ) -> TodoResult<Vec<Task>> {
        let tables = self.0.read()?;
        if !tables.owns_list(list_id, owner) {
            return Ok(Vec::new());
        }
        Ok(sorted(
            tables
                .tasks
                .values()
                .filter(|t| t.list_id == list_id)
                .cloned()
                .collect(),
        ))
    }

    async fn with_status(
        &self, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Vec<Task>> {
        let tables = self.0.read()?;
        Ok(sorted(
            tables
                .owned_tasks(owner)
                .filter(|t| t.is_completed == completed)
                .cloned()
                .collect(),
        ))
    }

    async fn set_status(
        &self, id: i64, owner: &OwnerId, completed: bool,
    ) -> TodoResult<Option<Task>> {
        self.update(id, owner, UpdateTaskCommand {
            is_completed: Some(completed),
            ..Default::default()
        })
        .await
    }

    async fn delete_for_list(
        &self, list_id: i64, owner: &OwnerId,
    ) -> TodoResult<u64> {
        let mut tables = self.0.tables()?;
        if !tables.owns_list(list_id, owner) {
            return Ok(0);
        }
        Ok(tables.remove_tasks(|task| task.list_id != list_id))
    }
}

#[async_trait]
impl ReferenceDao for MemoryPriorityStore {
    type CreateRequest = CreatePriorityCommand;
    type Error = TodoError;
    type ID = i64;
    type Model = Priority;
    type UpdateRequest = UpdatePriorityCommand;

    async fn find_by_id(&self, id: i64) -> TodoResult<Option<Priority>> {
        let tables = self.0.read()?;
        Ok(tables.priorities.get(&id).cloned())
    }

    async fn all(&self) -> TodoResult<Vec<Priority>> {
        let tables = self.0.read()?;
        let mut priorities: Vec<Priority> =
            tables.priorities.values().cloned().collect();
        priorities.sort_by_key(|p| p.level);
        Ok(priorities)
    }

    async fn create(&self, req: CreatePriorityCommand) -> TodoResult<Priority> {
        let mut tables = self.0.tables()?;
        tables.check_level(req.level, None)?;
        let priority = Priority {
            id: tables.next_id(),
            name: req.name.trim().to_string(),
            level: req.level,
        };
        tables.priorities.insert(priority.id, priority.clone());
        Ok(priority)
    }

    async fn update(
        &self, id: i64, req: UpdatePriorityCommand,
    ) -> TodoResult<Option<Priority>> {
        let mut tables = self.0.tables()?;
        if !tables.priorities.contains_key(&id) {
            return Ok(None);
        }
        if let Some(level) = req.level {
            tables.check_level(level, Some(id))?;
        }
        let Some(priority) = tables.priorities.get_mut(&id)
        else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            priority.name = name.trim().to_string();
        }
        if let Some(level) = req.level {
            priority.level = level;
        }
        Ok(Some(priority.clone()))
    }

    async fn delete(&self, id: i64) -> TodoResult<u64> {
        let mut tables = self.0.tables()?;
        if tables.priorities.remove(&id).is_none() {
            return Ok(0);
        }
        for task in tables.tasks.values_mut() {
            if task.priority_id == Some(id) {
                task.priority_id = None;
            }
        }
        Ok(1)
    }
}

#[async_trait]
impl PriorityStore for MemoryPriorityStore {
    async fn seed_defaults(&self) -> TodoResult<u64> {
        let mut tables = self.0.tables()?;
        let mut added = 0;
        for (name, level) in DEFAULT_PRIORITIES {
            if tables.check_level(level, None).is_err() {
                continue;
            }
            let id = tables.next_id();
            tables.priorities.insert(id, Priority {
                id,
                name: name.to_string(),
                level,
            });
            added += 1;
        }
        Ok(added)
    }
}
