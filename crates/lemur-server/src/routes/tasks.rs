use axum::extract::{Path, State};
use axum::Json;
use lemur_core::task::Task;

use crate::error::AppError;
use crate::state::AppState;

/// GET /task/:id: current status of one run.
pub async fn get_task(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Task>, AppError> {
    Ok(Json(app.tasks.get(id)?))
}

/// GET /tasks: every run since startup, oldest first.
pub async fn list_tasks(State(app): State<AppState>) -> Json<Vec<Task>> {
    Json(app.tasks.list())
}
