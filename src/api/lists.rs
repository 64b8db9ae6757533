//! List endpoints, nested under `/api/lists`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use super::auth::AuthUser;
use super::routes::{required_title, store_error, AppState};
use crate::model::{List, ListPatch, NewList, NewTask, Task};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_lists).post(create_list))
        .route("/:id", patch(update_list).delete(delete_list))
        .route("/:id/tasks", post(create_task))
}

/// GET /api/lists - The caller's lists with their tasks, in order.
async fn list_lists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<List>>, (StatusCode, String)> {
    let lists = state
        .store
        .lists_for_user(user.id)
        .await
        .map_err(store_error)?;
    Ok(Json(lists))
}

/// POST /api/lists
async fn create_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewList>,
) -> Result<(StatusCode, Json<List>), (StatusCode, String)> {
    let title = required_title(&req.title)?;
    let list = state
        .store
        .create_list(user.id, &title, req.order)
        .await
        .map_err(store_error)?;
    tracing::info!(list_id = %list.id, order = list.order, "Created list");
    Ok((StatusCode::CREATED, Json(list)))
}

/// PATCH /api/lists/:id - Rename and/or reposition.
async fn update_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(mut req): Json<ListPatch>,
) -> Result<Json<List>, (StatusCode, String)> {
    if let Some(title) = &req.title {
        req.title = Some(required_title(title)?);
    }
    let list = state
        .store
        .update_list(user.id, id, &req)
        .await
        .map_err(store_error)?;
    Ok(Json(list))
}

/// DELETE /api/lists/:id - Removes the list and its tasks.
async fn delete_list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .delete_list(user.id, id)
        .await
        .map_err(store_error)?;
    tracing::info!(list_id = %id, "Deleted list");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/lists/:id/tasks
async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(list_id): Path<Uuid>,
    Json(mut req): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    req.title = required_title(&req.title)?;
    let task = state
        .store
        .create_task(user.id, list_id, &req)
        .await
        .map_err(store_error)?;
    tracing::debug!(task_id = %task.id, list_id = %list_id, "Created task");
    Ok((StatusCode::CREATED, Json(task)))
}
