//! In-memory backend of record.
//!
//! Tasks are kept flat with `parent_id` links; responses are built into trees
//! on the way out.

use crate::tables::{
    CreateTaskRequest, ListTasksParams, Priority, Status, Task, TaskFilter, TaskListResponse,
    UpdateTaskRequest,
};
use crate::tree::{self, build_tree, effective_category};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CATEGORY_LEN: usize = 100;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Task not found")]
    NotFound(i32),

    #[error("Parent task not found")]
    ParentNotFound(i32),

    #[error("{0}")]
    Validation(String),

    #[error("Cannot change the status of a parent task while it has subtasks with other statuses. Change the subtask statuses first.")]
    StatusConflict(i32),

    #[error("A task cannot become a subtask of itself or of its own descendants")]
    CircularHierarchy { child_id: i32, parent_id: i32 },
}

#[derive(Debug)]
pub struct TaskStore {
    tasks: Vec<Task>,
    next_id: i32,
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(StoreError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<(), StoreError> {
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(StoreError::Validation(format!(
            "category must be at most {MAX_CATEGORY_LEN} characters"
        )));
    }
    Ok(())
}

/// Walks parent links upwards from `start_id`; true if `target_id` is met.
pub fn is_circular_reference<F>(target_id: i32, start_id: i32, mut get_parent_fn: F) -> bool
where
    F: FnMut(i32) -> Option<i32>,
{
    let mut current = Some(start_id);
    while let Some(id) = current {
        if id == target_id {
            return true;
        }
        current = get_parent_fn(id);
    }
    false
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
        }
    }

    fn position(&self, id: i32) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn stored(&self, id: i32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn parent_of(&self, id: i32) -> Option<i32> {
        self.stored(id).and_then(|t| t.parent_id)
    }

    // Newest first, which is the listing order at every tree level.
    fn ordered(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        tasks
    }

    fn inherited_category(&self, id: i32) -> Option<String> {
        let mut current = self.parent_of(id);
        while let Some(pid) = current {
            let parent = self.stored(pid)?;
            if let Some(category) = parent.category.as_deref().filter(|c| !c.is_empty()) {
                return Some(category.to_string());
            }
            current = parent.parent_id;
        }
        None
    }

    fn descendant_ids(&self, id: i32) -> Vec<i32> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for child in self.tasks.iter().filter(|t| t.parent_id == Some(current)) {
                result.push(child.id);
                stack.push(child.id);
            }
        }
        result
    }

    // Moving a parent to anything but TODO requires every descendant to be in
    // that status already.
    fn check_status_change(&self, id: i32, current: Status, new: Status) -> Result<(), StoreError> {
        if new == current || new == Status::Todo {
            return Ok(());
        }
        let conflicting = self
            .descendant_ids(id)
            .into_iter()
            .filter_map(|d| self.stored(d))
            .any(|t| t.status != new);
        if conflicting {
            return Err(StoreError::StatusConflict(id));
        }
        Ok(())
    }

    fn response(&self, id: i32) -> Result<Task, StoreError> {
        let task = self.stored(id).ok_or(StoreError::NotFound(id))?;
        let inherited = self.inherited_category(id);
        let category = effective_category(task.category.as_deref(), inherited.as_deref());
        let subtasks = build_tree(&self.ordered(), Some(id), category.as_deref());
        Ok(Task {
            category,
            subtasks,
            ..task.clone()
        })
    }

    // * Queries ..............................................................

    /// Category, then priority, then completion; an unknown priority or
    /// filter value is ignored.
    pub fn list(&self, params: &ListTasksParams) -> TaskListResponse {
        let mut forest = build_tree(&self.ordered(), None, None);

        if let Some(category) = params.category.as_deref().filter(|c| !c.is_empty()) {
            forest = tree::filter_by_category(&forest, category);
        }
        if let Some(priority) = params.priority.as_deref() {
            match priority.parse::<Priority>() {
                Ok(priority) => forest = tree::filter_by_priority(&forest, priority),
                Err(err) => debug!(%err, "ignoring priority filter"),
            }
        }
        if let Some(filter) = params.filter_completed.as_deref() {
            let filter = filter.parse::<TaskFilter>().unwrap_or_default();
            forest = tree::filter_by_completion(&forest, filter);
        }

        let total = tree::count_all(&forest);
        TaskListResponse {
            tasks: forest,
            total,
        }
    }

    pub fn categories(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter_map(|t| t.category.clone())
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn get(&self, id: i32) -> Result<Task, StoreError> {
        self.response(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    // * Mutations ............................................................

    pub fn create(&mut self, request: CreateTaskRequest) -> Result<Task, StoreError> {
        validate_title(&request.title)?;
        let mut category = request.category.filter(|c| !c.trim().is_empty());
        if let Some(category) = category.as_deref() {
            validate_category(category)?;
        }

        if let Some(parent_id) = request.parent_id {
            let parent = self
                .stored(parent_id)
                .ok_or(StoreError::ParentNotFound(parent_id))?;
            if category.is_none() {
                category = parent.category.clone();
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let timestamp = now();
        self.tasks.push(Task {
            id,
            title: request.title,
            category,
            priority: request.priority.unwrap_or_default(),
            status: request.status.unwrap_or_default(),
            is_completed: false,
            parent_id: request.parent_id,
            created_at: timestamp,
            updated_at: timestamp,
            subtasks: Vec::new(),
        });
        info!(id, "created task");
        self.response(id)
    }

    pub fn update(&mut self, id: i32, request: UpdateTaskRequest) -> Result<Task, StoreError> {
        let index = self.position(id)?;
        let current = self.tasks[index].status;

        if let Some(status) = request.status {
            self.check_status_change(id, current, status)?;
        }
        if let Some(title) = request.title.as_deref() {
            validate_title(title)?;
        }
        if let Some(Some(category)) = request.category.as_ref() {
            validate_category(category)?;
        }
        if let Some(Some(parent_id)) = request.parent_id {
            if self.stored(parent_id).is_none() {
                return Err(StoreError::ParentNotFound(parent_id));
            }
            if is_circular_reference(id, parent_id, |pid| self.parent_of(pid)) {
                return Err(StoreError::CircularHierarchy {
                    child_id: id,
                    parent_id,
                });
            }
        }

        let task = &mut self.tasks[index];
        if let Some(title) = request.title {
            task.title = title;
        }
        if let Some(category) = request.category {
            task.category = category.filter(|c| !c.trim().is_empty());
        }
        if let Some(priority) = request.priority {
            task.priority = priority;
        }
        if let Some(status) = request.status {
            task.status = status;
        }
        if let Some(parent_id) = request.parent_id {
            task.parent_id = parent_id;
        }
        if let Some(is_completed) = request.is_completed {
            task.is_completed = is_completed;
            if is_completed {
                task.status = Status::Completed;
            } else if task.status == Status::Completed {
                task.status = Status::Todo;
            }
        }
        task.updated_at = now();
        info!(id, "updated task");
        self.response(id)
    }

    pub fn toggle_completion(&mut self, id: i32) -> Result<Task, StoreError> {
        let index = self.position(id)?;
        let task = &self.tasks[index];
        let new_status = if task.is_completed {
            Status::Todo
        } else {
            Status::Completed
        };
        self.check_status_change(id, task.status, new_status)?;

        let task = &mut self.tasks[index];
        task.is_completed = !task.is_completed;
        task.status = new_status;
        task.updated_at = now();
        info!(id, is_completed = task.is_completed, "toggled task");
        self.response(id)
    }

    /// Removes the task and its whole subtree. Returns how many were removed.
    pub fn delete(&mut self, id: i32) -> Result<usize, StoreError> {
        self.position(id)?;
        let mut doomed = self.descendant_ids(id);
        doomed.push(id);
        self.tasks.retain(|t| !doomed.contains(&t.id));
        info!(id, removed = doomed.len(), "deleted task");
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(store: &mut TaskStore, title: &str, parent_id: Option<i32>) -> Task {
        store
            .create(CreateTaskRequest {
                title: title.to_string(),
                parent_id,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_create_defaults() {
        let mut store = TaskStore::new();
        let task = create(&mut store, "Plan trip", None);
        assert_eq!(task.id, 1);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::Todo);
        assert!(!task.is_completed);
    }

    #[test]
    fn test_create_validation() {
        let mut store = TaskStore::new();
        let blank = store.create(CreateTaskRequest {
            title: "   ".to_string(),
            ..Default::default()
        });
        assert!(matches!(blank, Err(StoreError::Validation(_))));

        let long = store.create(CreateTaskRequest {
            title: "x".repeat(MAX_TITLE_LEN + 1),
            ..Default::default()
        });
        assert!(matches!(long, Err(StoreError::Validation(_))));

        let orphan = store.create(CreateTaskRequest {
            title: "Orphan".to_string(),
            parent_id: Some(7),
            ..Default::default()
        });
        assert_eq!(orphan, Err(StoreError::ParentNotFound(7)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_subtask_inherits_parent_category() {
        let mut store = TaskStore::new();
        let parent = store
            .create(CreateTaskRequest {
                title: "Parent".to_string(),
                category: Some("work".to_string()),
                ..Default::default()
            })
            .unwrap();
        let child = create(&mut store, "Child", Some(parent.id));
        assert_eq!(child.category.as_deref(), Some("work"));
        assert_eq!(store.categories(), vec!["work".to_string()]);
    }

    #[test]
    fn test_delete_cascades_to_subtree() {
        let mut store = TaskStore::new();
        let root = create(&mut store, "Root", None);
        let child = create(&mut store, "Child", Some(root.id));
        create(&mut store, "Grandchild", Some(child.id));
        let other = create(&mut store, "Other", None);

        assert_eq!(store.delete(root.id), Ok(3));
        assert_eq!(store.len(), 1);
        assert!(store.get(other.id).is_ok());
        assert_eq!(store.delete(root.id), Err(StoreError::NotFound(root.id)));
    }

    #[test]
    fn test_status_change_requires_matching_subtasks() {
        let mut store = TaskStore::new();
        let root = create(&mut store, "Root", None);
        let child = create(&mut store, "Child", Some(root.id));

        let refused = store.toggle_completion(root.id);
        assert_eq!(refused, Err(StoreError::StatusConflict(root.id)));

        let refused = store.update(
            root.id,
            UpdateTaskRequest {
                status: Some(Status::InProgress),
                ..Default::default()
            },
        );
        assert_eq!(refused, Err(StoreError::StatusConflict(root.id)));

        store.toggle_completion(child.id).unwrap();
        let done = store.toggle_completion(root.id).unwrap();
        assert!(done.is_completed);
        assert_eq!(done.status, Status::Completed);

        // Back to TODO is always allowed.
        let reopened = store.toggle_completion(root.id).unwrap();
        assert_eq!(reopened.status, Status::Todo);
    }

    #[test]
    fn test_update_completion_flag_drives_status() {
        let mut store = TaskStore::new();
        let task = create(&mut store, "Task", None);

        let done = store
            .update(
                task.id,
                UpdateTaskRequest {
                    is_completed: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(done.status, Status::Completed);

        let undone = store
            .update(
                task.id,
                UpdateTaskRequest {
                    is_completed: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(undone.status, Status::Todo);
    }

    #[test]
    fn test_update_rejects_cycles_and_clears_empty_category() {
        let mut store = TaskStore::new();
        let root = create(&mut store, "Root", None);
        let child = create(&mut store, "Child", Some(root.id));

        let cycle = store.update(
            root.id,
            UpdateTaskRequest {
                parent_id: Some(Some(child.id)),
                ..Default::default()
            },
        );
        assert_eq!(
            cycle,
            Err(StoreError::CircularHierarchy {
                child_id: root.id,
                parent_id: child.id
            })
        );

        store
            .update(
                root.id,
                UpdateTaskRequest {
                    category: Some(Some("home".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        let cleared = store
            .update(
                root.id,
                UpdateTaskRequest {
                    category: Some(Some(String::new())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.category, None);
        assert!(store.categories().is_empty());
    }

    #[test]
    fn test_update_null_clears_category_and_parent() {
        let mut store = TaskStore::new();
        let root = store
            .create(CreateTaskRequest {
                title: "Root".to_string(),
                category: Some("work".to_string()),
                ..Default::default()
            })
            .unwrap();
        let child = store
            .create(CreateTaskRequest {
                title: "Child".to_string(),
                category: Some("home".to_string()),
                parent_id: Some(root.id),
                ..Default::default()
            })
            .unwrap();

        // Leaving the fields out changes nothing.
        let same = store.update(child.id, UpdateTaskRequest::default()).unwrap();
        assert_eq!(same.parent_id, Some(root.id));
        assert_eq!(same.category.as_deref(), Some("home"));

        // A cleared own category falls back to the parent's.
        let cleared = store
            .update(
                child.id,
                UpdateTaskRequest {
                    category: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.category.as_deref(), Some("work"));

        let detached = store
            .update(
                child.id,
                UpdateTaskRequest {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(detached.parent_id, None);
        assert_eq!(detached.category, None);
        assert_eq!(store.list(&ListTasksParams::default()).tasks.len(), 2);
    }

    #[test]
    fn test_list_filters_and_total() {
        let mut store = TaskStore::new();
        let root = create(&mut store, "Root", None);
        let child = create(&mut store, "Child", Some(root.id));
        create(&mut store, "Other", None);
        store.toggle_completion(child.id).unwrap();

        let all = store.list(&ListTasksParams::default());
        assert_eq!(all.tasks.len(), 2);
        assert_eq!(all.total, 3);
        // Newest first.
        assert_eq!(all.tasks[0].title, "Other");

        let completed = store.list(&ListTasksParams::new(TaskFilter::Completed, None, None));
        assert_eq!(completed.total, 2);
        assert_eq!(completed.tasks[0].id, root.id);

        let bogus = store.list(&ListTasksParams {
            priority: Some("urgent".to_string()),
            ..Default::default()
        });
        assert_eq!(bogus.total, 3);
    }
}
