use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: lemur_core::types::State,
}

/// GET /state: whether runs are currently allowed to act.
pub async fn get_state(State(app): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody {
        status: app.run_state.get(),
    })
}

/// POST /state: start or stop chaos. Takes effect from the next run.
pub async fn set_state(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusBody>, AppError> {
    let request: StatusBody = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("invalid state request: {e}")))?;
    let previous = app.run_state.set(request.status);
    info!(from = %previous, to = %request.status, "run state changed");
    Ok(Json(StatusBody {
        status: request.status,
    }))
}
