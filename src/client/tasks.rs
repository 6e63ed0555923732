pub use crate::tables::{
    CreateTaskRequest, HealthResponse, ListTasksParams, Task, TaskListResponse, UpdateTaskRequest,
};
use crate::{CATEGORIES_API, HEALTH_API, TASKS_API};
use reqwest::{self, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Task not found: {id}")]
    NotFound { id: i32, detail: Option<String> },

    #[error("Unexpected server error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    ServerError {
        status: StatusCode,
        detail: Option<String>,
    },
}

impl TaskError {
    /// The human-readable `detail` sent by the backend, if there was one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TaskError::NetworkError(_) => None,
            TaskError::NotFound { detail, .. } | TaskError::ServerError { detail, .. } => {
                detail.as_deref()
            }
        }
    }
}

// * Response handling ........................................................

// `detail` is usually a string; anything else (e.g. a list of validation
// errors) is passed on as its JSON text.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

async fn check(response: Response, id: Option<i32>) -> Result<Response, TaskError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body);
    debug!(%status, ?detail, "request rejected");

    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(TaskError::NotFound { id, detail }),
        _ => Err(TaskError::ServerError { status, detail }),
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, id: Option<i32>) -> Result<T, TaskError> {
    let value = check(response, id).await?.json::<T>().await?;
    Ok(value)
}

// * Client ...................................................................
// ** Read ....................................................................

pub async fn health_check(base_url: &str) -> Result<HealthResponse, TaskError> {
    let url = format!("{}/{HEALTH_API}", base_url);
    let response = reqwest::get(url).await?;
    read_json(response, None).await
}

pub async fn fetch_tasks(
    base_url: &str,
    params: &ListTasksParams,
) -> Result<TaskListResponse, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}", base_url);
    let response = client.get(url).query(params).send().await?;
    read_json(response, None).await
}

pub async fn fetch_categories(base_url: &str) -> Result<Vec<String>, TaskError> {
    let url = format!("{}/{CATEGORIES_API}", base_url);
    let response = reqwest::get(url).await?;
    read_json(response, None).await
}

pub async fn fetch_task(base_url: &str, id: i32) -> Result<Task, TaskError> {
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = reqwest::get(url).await?;
    read_json(response, Some(id)).await
}

// ** Write ...................................................................

pub async fn create_task(base_url: &str, task: &CreateTaskRequest) -> Result<Task, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/", base_url);
    let response = client.post(url).json(task).send().await?;
    // A 404 here means the parent is missing, not the task itself.
    read_json(response, None).await
}

pub async fn update_task(
    base_url: &str,
    id: i32,
    task: &UpdateTaskRequest,
) -> Result<Task, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = client.put(url).json(task).send().await?;
    read_json(response, Some(id)).await
}

pub async fn toggle_task_completion(base_url: &str, id: i32) -> Result<Task, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}/complete", base_url, id);
    let response = client.patch(url).send().await?;
    read_json(response, Some(id)).await
}

pub async fn delete_task(base_url: &str, id: i32) -> Result<(), TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = client.delete(url).send().await?;
    check(response, Some(id)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::spawn_test_server;
    use crate::tables::{Priority, Status, TaskFilter};

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail":"Task not found"}"#).as_deref(),
            Some("Task not found")
        );
        assert_eq!(
            extract_detail(r#"{"detail":["title too long"]}"#).as_deref(),
            Some(r#"["title too long"]"#)
        );
        assert_eq!(extract_detail(r#"{"error":"nope"}"#), None);
        assert_eq!(extract_detail("plain text"), None);
    }

    #[tokio::test]
    async fn test_create_and_fetch_task() -> Result<(), Box<dyn std::error::Error>> {
        let base_url = spawn_test_server().await;

        let created = create_task(
            &base_url,
            &CreateTaskRequest {
                title: "Parent".to_string(),
                category: Some("work".to_string()),
                priority: Some(Priority::High),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(created.status, Status::Todo);
        assert!(!created.is_completed);

        let child = create_task(
            &base_url,
            &CreateTaskRequest {
                title: "Child".to_string(),
                parent_id: Some(created.id),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(child.category.as_deref(), Some("work"));
        assert_eq!(child.priority, Priority::Medium);

        let fetched = fetch_task(&base_url, created.id).await?;
        assert_eq!(fetched.subtasks.len(), 1);
        assert_eq!(fetched.subtasks[0].id, child.id);

        let list = fetch_tasks(&base_url, &ListTasksParams::new(TaskFilter::All, None, None)).await?;
        assert_eq!(list.tasks.len(), 1);
        assert_eq!(list.total, 2);

        assert_eq!(fetch_categories(&base_url).await?, vec!["work".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_and_delete_task() -> Result<(), Box<dyn std::error::Error>> {
        let base_url = spawn_test_server().await;
        let task = create_task(
            &base_url,
            &CreateTaskRequest {
                title: "Toggle me".to_string(),
                ..Default::default()
            },
        )
        .await?;

        let toggled = toggle_task_completion(&base_url, task.id).await?;
        assert!(toggled.is_completed);
        assert_eq!(toggled.status, Status::Completed);

        delete_task(&base_url, task.id).await?;
        let result = fetch_task(&base_url, task.id).await;
        assert!(matches!(result, Err(TaskError::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_errors_carry_backend_detail() {
        let base_url = spawn_test_server().await;

        let missing = update_task(&base_url, 99, &UpdateTaskRequest::default()).await;
        let err = missing.unwrap_err();
        assert!(matches!(err, TaskError::NotFound { id: 99, .. }));
        assert_eq!(err.detail(), Some("Task not found"));

        let orphan = create_task(
            &base_url,
            &CreateTaskRequest {
                title: "Orphan".to_string(),
                parent_id: Some(42),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(orphan.detail(), Some("Parent task not found"));
    }

    #[tokio::test]
    async fn test_malformed_body_detail_reaches_caller() {
        let base_url = spawn_test_server().await;
        let response = reqwest::Client::new()
            .post(format!("{}/{TASKS_API}/", base_url))
            .json(&serde_json::json!({ "title": "x", "priority": "urgent" }))
            .send()
            .await
            .unwrap();

        let err = check(response, None).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::ServerError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                ..
            }
        ));
        assert!(err.detail().is_some_and(|d| d.contains("urgent")));
    }

    #[tokio::test]
    async fn test_health_check() {
        let base_url = spawn_test_server().await;
        let health = health_check(&base_url).await.unwrap();
        assert_eq!(health.status, "healthy");
    }
}
