//! Dashboard view model.
//!
//! A [`TaskBoard`] holds a transient copy of the task forest for one
//! selection (completion filter, category, priority). Every successful
//! mutation refetches the forest and publishes a category refresh signal.
//! Nothing is applied locally ahead of the backend, so a failed mutation
//! leaves the forest as it was.

use crate::client::{self, TaskError};
use crate::events::{RefreshBus, RefreshSignal};
use crate::tables::{
    CreateTaskRequest, ListTasksParams, Priority, Status, Task, TaskFilter, UpdateTaskRequest,
};
use crate::tree;
use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this task?";
pub const DELETE_CASCADE_PROMPT: &str =
    "Are you sure you want to delete this task? All of its subtasks will be deleted too.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Save,
    Toggle,
    Delete,
}

impl Action {
    fn fallback(&self) -> &'static str {
        match self {
            Action::Create => "Failed to create task",
            Action::Save => "Failed to save task",
            Action::Toggle => "Failed to update task",
            Action::Delete => "Failed to delete task",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Save => "save",
            Action::Toggle => "toggle",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

fn request_alert(action: &Action, source: &TaskError) -> String {
    source
        .detail()
        .map(str::to_string)
        .unwrap_or_else(|| action.fallback().to_string())
}

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Task title must not be empty")]
    EmptyTitle,

    #[error("{}", request_alert(.action, .source))]
    Request {
        action: Action,
        #[source]
        source: TaskError,
    },
}

impl BoardError {
    /// Message to show the user.
    pub fn alert(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub filter: TaskFilter,
    pub category: Option<String>,
    pub priority: Option<Priority>,
}

impl Selection {
    fn params(&self) -> ListTasksParams {
        ListTasksParams::new(self.filter, self.category.as_deref(), self.priority)
    }
}

/// Uncommitted edits to one task. Saved through [`TaskBoard::save`] or
/// dropped with [`TaskEdit::cancel`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEdit {
    id: i32,
    pub title: String,
    pub category: String,
    pub priority: Priority,
    pub status: Status,
}

impl TaskEdit {
    pub fn begin(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            category: task.category.clone().unwrap_or_default(),
            priority: task.priority,
            status: task.status,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn cancel(self) {}

    // A blank category is sent as `null`, clearing the task's own category.
    fn into_request(self) -> UpdateTaskRequest {
        let category = Some(self.category.trim().to_string()).filter(|c| !c.is_empty());
        UpdateTaskRequest {
            title: Some(self.title),
            category: Some(category),
            priority: Some(self.priority),
            status: Some(self.status),
            ..Default::default()
        }
    }
}

pub fn delete_prompt(task: &Task) -> &'static str {
    if task.has_subtasks() {
        DELETE_CASCADE_PROMPT
    } else {
        DELETE_PROMPT
    }
}

pub struct TaskBoard {
    base_url: String,
    bus: RefreshBus,
    selection: Selection,
    tasks: Vec<Task>,
    loading: bool,
}

impl TaskBoard {
    pub fn new(base_url: impl Into<String>, bus: RefreshBus) -> Self {
        Self {
            base_url: base_url.into(),
            bus,
            selection: Selection::default(),
            tasks: Vec::new(),
            loading: true,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn all_tasks(&self) -> Vec<&Task> {
        tree::flatten(&self.tasks)
    }

    pub fn incomplete_count(&self) -> usize {
        tree::count_incomplete(&self.tasks)
    }

    pub fn total(&self) -> usize {
        tree::count_all(&self.tasks)
    }

    // * Fetching .............................................................

    /// Replaces the forest with a fresh fetch. On failure the forest is
    /// emptied and the error logged.
    pub async fn load(&mut self) {
        self.loading = true;
        match client::fetch_tasks(&self.base_url, &self.selection.params()).await {
            Ok(response) => self.tasks = response.tasks,
            Err(e) => {
                warn!(error = %e, "failed to load tasks");
                self.tasks.clear();
            }
        }
        self.loading = false;
    }

    pub async fn set_filter(&mut self, filter: TaskFilter) {
        self.selection.filter = filter;
        self.load().await;
    }

    pub async fn set_category(&mut self, category: Option<String>) {
        self.selection.category = category;
        self.load().await;
    }

    pub async fn set_priority(&mut self, priority: Option<Priority>) {
        self.selection.priority = priority;
        self.load().await;
    }

    // * Mutations ............................................................

    async fn after_mutation(&mut self) {
        self.load().await;
        self.bus.publish(RefreshSignal::Categories);
    }

    fn failed(action: Action, source: TaskError) -> BoardError {
        error!(%action, error = %source, "task request failed");
        BoardError::Request { action, source }
    }

    /// The title must contain something other than whitespace; this is
    /// checked before any request. A blank category is sent as none.
    pub async fn create(&mut self, mut draft: CreateTaskRequest) -> Result<Task, BoardError> {
        if draft.title.trim().is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        draft.category = draft
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let task = client::create_task(&self.base_url, &draft)
            .await
            .map_err(|e| Self::failed(Action::Create, e))?;
        info!(id = task.id, "task created");
        self.after_mutation().await;
        Ok(task)
    }

    pub async fn toggle(&mut self, id: i32) -> Result<Task, BoardError> {
        let task = client::toggle_task_completion(&self.base_url, id)
            .await
            .map_err(|e| Self::failed(Action::Toggle, e))?;
        self.after_mutation().await;
        Ok(task)
    }

    pub async fn save(&mut self, edit: TaskEdit) -> Result<Task, BoardError> {
        let id = edit.id();
        let task = client::update_task(&self.base_url, id, &edit.into_request())
            .await
            .map_err(|e| Self::failed(Action::Save, e))?;
        self.after_mutation().await;
        Ok(task)
    }

    /// Asks `confirm` with the prompt for this task and deletes only if it
    /// agrees. Returns whether the task was deleted.
    pub async fn delete<F>(&mut self, id: i32, confirm: F) -> Result<bool, BoardError>
    where
        F: FnOnce(&str) -> bool,
    {
        let prompt = tree::find(&self.tasks, id)
            .map(delete_prompt)
            .unwrap_or(DELETE_PROMPT);
        if !confirm(prompt) {
            return Ok(false);
        }

        client::delete_task(&self.base_url, id)
            .await
            .map_err(|e| Self::failed(Action::Delete, e))?;
        info!(id, "task deleted");
        self.after_mutation().await;
        Ok(true)
    }
}
