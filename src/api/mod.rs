mod state;
pub mod tasks;

use crate::store::TaskStore;
use crate::tables::HealthResponse;
use crate::{API_PREFIX, HEALTH_API};
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
pub use state::{AppState, SharedStore};
pub use tasks::ApiError;
use tracing::info;

async fn root() -> Json<Value> {
    Json(json!({ "message": "Tasks API", "version": env!("CARGO_PKG_VERSION") }))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "tasks-api".to_string(),
    })
}

pub fn create_router(store: TaskStore) -> Router {
    let state = AppState::new(store);

    let api = Router::new()
        .merge(tasks::create_router())
        .route(format!("/{HEALTH_API}").as_str(), get(health_check));

    Router::new()
        .route("/", get(root))
        .nest(API_PREFIX, api)
        .with_state(state)
}

/// Binds `addr` and serves the backend of record until the process stops.
pub async fn serve(addr: SocketAddr, store: TaskStore) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "serving tasks API");
    axum::serve(listener, create_router(store)).await
}

/// Starts a fresh backend on an ephemeral port and returns its API base URL.
#[cfg(test)]
pub(crate) async fn spawn_test_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, create_router(TaskStore::new()))
            .await
            .expect("Test server failed");
    });
    format!("http://{addr}{API_PREFIX}")
}
