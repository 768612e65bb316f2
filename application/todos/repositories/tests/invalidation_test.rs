//! Every mutation followed by every read path: no read may observe the
//! state from before the mutation.

use test_utils::{
    MemoryTodoStore, init_tracing, list_command, memory_key_store, owner,
    task_command,
};
use todo_commands::{
    CreatePriorityCommand, CreateTaskCommand, UpdatePriorityCommand,
    UpdateTaskCommand,
};
use todo_models::{ListWithTasks, OwnerId, Task};
use todo_repositories::{TodoServices, TodoStores};

fn services(store: &MemoryTodoStore, namespace: &str) -> TodoServices {
    TodoServices::new(TodoStores::memory(store), memory_key_store(namespace))
}

struct Views {
    summaries: Vec<(i64, i64, i64)>,
    with_tasks: Vec<(i64, Vec<i64>)>,
    list_tasks: Vec<Vec<i64>>,
    all_tasks: Vec<i64>,
    open: Vec<i64>,
    done: Vec<i64>,
    task: Option<Task>,
}

/// Reads every view that can hold the given lists or task.
async fn read_all(
    svc: &TodoServices, u: &OwnerId, lists: &[i64], task: i64,
) -> Views {
    let ids = |tasks: Vec<Task>| tasks.iter().map(|t| t.id).collect::<Vec<_>>();
    let mut list_tasks = Vec::new();
    for &list in lists {
        list_tasks.push(ids(svc.tasks.get_by_list(list, u).await.unwrap()));
        // also warms the single-list aggregate
        let _ = svc.lists.get_by_id_with_tasks(list, u).await;
    }
    Views {
        summaries: svc
            .lists
            .get_all_for_owner(u)
            .await
            .unwrap()
            .iter()
            .map(|s| (s.list.id, s.total_tasks, s.pending_tasks))
            .collect(),
        with_tasks: svc
            .lists
            .get_all_for_owner_with_tasks(u)
            .await
            .unwrap()
            .iter()
            .map(|l| (l.list.id, l.tasks.iter().map(|t| t.task.id).collect()))
            .collect(),
        list_tasks,
        all_tasks: ids(svc.tasks.get_all_for_owner(u).await.unwrap()),
        open: ids(svc.tasks.get_with_status(u, false).await.unwrap()),
        done: ids(svc.tasks.get_with_status(u, true).await.unwrap()),
        task: svc.tasks.get_by_id(task, u).await.ok(),
    }
}

/// The same views computed with a cold cache.
async fn read_fresh(
    store: &MemoryTodoStore, u: &OwnerId, lists: &[i64], task: i64,
) -> Views {
    read_all(&services(store, "cold"), u, lists, task).await
}

fn assert_same(cached: &Views, fresh: &Views) {
    assert_eq!(cached.summaries, fresh.summaries, "list summaries");
    assert_eq!(cached.with_tasks, fresh.with_tasks, "lists with tasks");
    assert_eq!(cached.list_tasks, fresh.list_tasks, "tasks by list");
    assert_eq!(cached.all_tasks, fresh.all_tasks, "all tasks");
    assert_eq!(cached.open, fresh.open, "open tasks");
    assert_eq!(cached.done, fresh.done, "done tasks");
    assert_eq!(cached.task, fresh.task, "single task");
}

async fn check(
    svc: &TodoServices, store: &MemoryTodoStore, u: &OwnerId, lists: &[i64],
    task: i64,
) {
    let cached = read_all(svc, u, lists, task).await;
    let fresh = read_fresh(store, u, lists, task).await;
    assert_same(&cached, &fresh);
}

#[tokio::test]
async fn test_task_mutations_refresh_every_view() {
    init_tracing();
    let store = MemoryTodoStore::new();
    let svc = services(&store, "todo");
    let u = owner("U");
    let a = svc.lists.create(&u, list_command("Groceries")).await.unwrap();
    let b = svc.lists.create(&u, list_command("Chores")).await.unwrap();
    let lists = [a.id, b.id];
    let task = svc.tasks.create(&u, task_command(a.id, "Milk")).await.unwrap();
    read_all(&svc, &u, &lists, task.id).await;

    // create
    let other = svc.tasks.create(&u, task_command(a.id, "Eggs")).await.unwrap();
    check(&svc, &store, &u, &lists, task.id).await;

    // status change
    svc.tasks.update_status(task.id, &u, true).await.unwrap();
    check(&svc, &store, &u, &lists, task.id).await;

    // status change through a plain patch
    svc.tasks
        .update(task.id, &u, UpdateTaskCommand {
            is_completed: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    check(&svc, &store, &u, &lists, task.id).await;

    // move to another list
    svc.tasks
        .update(task.id, &u, UpdateTaskCommand {
            list_id: Some(b.id),
            title: Some("Oat milk".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    check(&svc, &store, &u, &lists, task.id).await;

    // delete
    svc.tasks.delete(other.id, &u).await.unwrap();
    check(&svc, &store, &u, &lists, task.id).await;

    // clean up one list, then all of them
    svc.lists.clean_up_list(b.id, &u).await.unwrap();
    check(&svc, &store, &u, &lists, task.id).await;
    svc.tasks.create(&u, task_command(a.id, "Bread")).await.unwrap();
    check(&svc, &store, &u, &lists, task.id).await;
    svc.lists.clean_up_all_lists(&u).await.unwrap();
    check(&svc, &store, &u, &lists, task.id).await;
}

#[tokio::test]
async fn test_list_mutations_refresh_every_view() {
    init_tracing();
    let store = MemoryTodoStore::new();
    let svc = services(&store, "todo");
    let u = owner("U");
    let a = svc.lists.create(&u, list_command("Groceries")).await.unwrap();
    let task = svc.tasks.create(&u, task_command(a.id, "Milk")).await.unwrap();
    read_all(&svc, &u, &[a.id], task.id).await;

    let b = svc.lists.create(&u, list_command("Chores")).await.unwrap();
    check(&svc, &store, &u, &[a.id, b.id], task.id).await;

    svc.lists.delete(a.id, &u).await.unwrap();
    check(&svc, &store, &u, &[a.id, b.id], task.id).await;
    assert!(svc.lists.get_by_id(a.id, &u).await.is_err());

    svc.lists.delete_all_for_owner(&u).await.unwrap();
    check(&svc, &store, &u, &[a.id, b.id], task.id).await;
}

#[tokio::test]
async fn test_priority_changes_reach_embedded_views() {
    init_tracing();
    let store = MemoryTodoStore::new();
    let svc = services(&store, "todo");
    let u = owner("U");
    assert_eq!(svc.priorities.initialize().await.unwrap(), 4);
    let high = svc.priorities.get_all().await.unwrap()[2].clone();
    let list = svc.lists.create(&u, list_command("Groceries")).await.unwrap();
    let task = svc
        .tasks
        .create(&u, CreateTaskCommand {
            priority_id: Some(high.id),
            ..task_command(list.id, "Milk")
        })
        .await
        .unwrap();

    let embedded = |view: ListWithTasks| {
        view.tasks[0].priority.as_ref().map(|p| p.name.clone())
    };
    let view = svc.lists.get_by_id_with_tasks(list.id, &u).await.unwrap();
    assert_eq!(embedded(view), Some("High".to_string()));
    svc.priorities.get_by_id(high.id).await.unwrap();

    svc.priorities
        .update(high.id, UpdatePriorityCommand {
            name: Some("Important".into()),
            level: None,
        })
        .await
        .unwrap();

    let view = svc.lists.get_by_id_with_tasks(list.id, &u).await.unwrap();
    assert_eq!(embedded(view), Some("Important".to_string()));
    assert_eq!(svc.priorities.get_by_id(high.id).await.unwrap().name, "Important");

    svc.tasks.get_by_id(task.id, &u).await.unwrap();
    svc.priorities.delete(high.id).await.unwrap();

    let view = svc.lists.get_by_id_with_tasks(list.id, &u).await.unwrap();
    assert_eq!(embedded(view), None);
    assert_eq!(svc.tasks.get_by_id(task.id, &u).await.unwrap().priority_id, None);
    assert_eq!(svc.priorities.get_all().await.unwrap().len(), 3);

    svc.priorities
        .create(CreatePriorityCommand {
            name: "Someday".into(),
            level: 9,
        })
        .await
        .unwrap();
    assert_eq!(svc.priorities.get_all().await.unwrap().len(), 4);
}
