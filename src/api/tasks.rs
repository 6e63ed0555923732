use super::AppState;
use crate::store::StoreError;
use crate::tables::{CreateTaskRequest, ListTasksParams, Task, TaskListResponse, UpdateTaskRequest};
use crate::{CATEGORIES_API, TASKS_API};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Body(#[from] JsonRejection),

    #[error("{0}")]
    Path(#[from] PathRejection),

    #[error("{0}")]
    Query(#[from] QueryRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, detail) = match &self {
            ApiError::Store(StoreError::NotFound(_) | StoreError::ParentNotFound(_)) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::Store(StoreError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            ApiError::Store(
                StoreError::StatusConflict(_) | StoreError::CircularHierarchy { .. },
            ) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Body(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Path(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Query(rejection) => (rejection.status(), rejection.body_text()),
        };
        warn!(%status_code, error = %detail, "request failed");

        (status_code, Json(json!({ "detail": detail }))).into_response()
    }
}

// Extractors whose rejections answer with a JSON `detail` like every other
// error of this API.

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{TASKS_API}").as_str(),
            get(list_tasks).post(create_task),
        )
        .route(
            format!("/{TASKS_API}/").as_str(),
            get(list_tasks).post(create_task),
        )
        .route(format!("/{CATEGORIES_API}").as_str(), get(list_categories))
        .route(
            format!("/{TASKS_API}/:id").as_str(),
            get(get_task).put(update_task).delete(delete_task),
        )
        .route(
            format!("/{TASKS_API}/:id/complete").as_str(),
            patch(toggle_task_completion),
        )
}

async fn list_tasks(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListTasksParams>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.list(&params)))
}

async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    let store = state.store.read().await;
    Json(store.categories())
}

async fn get_task(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<i32>,
) -> Result<Json<Task>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.get(task_id)?))
}

async fn create_task(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let mut store = state.store.write().await;
    let task = store.create(payload)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let mut store = state.store.write().await;
    Ok(Json(store.update(task_id, payload)?))
}

async fn toggle_task_completion(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<i32>,
) -> Result<Json<Task>, ApiError> {
    let mut store = state.store.write().await;
    Ok(Json(store.toggle_completion(task_id)?))
}

async fn delete_task(
    State(state): State<AppState>,
    ApiPath(task_id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    let mut store = state.store.write().await;
    store.delete(task_id)?;
    Ok(StatusCode::NO_CONTENT)
}
