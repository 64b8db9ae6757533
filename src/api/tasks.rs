//! Task endpoints, nested under `/api/tasks`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::patch,
    Json, Router,
};
use uuid::Uuid;

use super::auth::AuthUser;
use super::routes::{required_title, store_error, AppState};
use crate::model::{Task, TaskPatch};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id", patch(update_task).delete(delete_task))
}

/// PATCH /api/tasks/:id - Field edits and/or a placement.
async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(mut req): Json<TaskPatch>,
) -> Result<Json<Task>, (StatusCode, String)> {
    if let Some(title) = &req.title {
        req.title = Some(required_title(title)?);
    }
    let task = state
        .store
        .update_task(user.id, id, &req)
        .await
        .map_err(store_error)?;
    if req.moves() {
        tracing::debug!(
            task_id = %id,
            list_id = %task.list_id,
            order = task.order,
            "Placed task"
        );
    }
    Ok(Json(task))
}

/// DELETE /api/tasks/:id
async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .delete_task(user.id, id)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}
