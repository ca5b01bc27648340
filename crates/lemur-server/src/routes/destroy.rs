use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

/// Events accepted by `POST /chaos`.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Event {
    Destroy,
}

#[derive(Debug, Deserialize)]
struct ChaosBody {
    event: Event,
}

/// POST /destroy: run a scheduled-style destruction and wait for it.
pub async fn destroy(State(app): State<AppState>) -> Result<StatusCode, AppError> {
    let task = app.destroyer.destroy().await?;
    info!(task = task.id, status = %task.status, "destroy request finished");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /chaos: start a manual run and return its task locator immediately.
///
/// The body is parsed by hand so that every malformed payload is a 400,
/// whatever the content type.
pub async fn chaos(State(app): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: ChaosBody = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("invalid chaos request: {e}")))?;

    match request.event {
        Event::Destroy => {
            let task = app.destroyer.chaos();
            info!(task = task.id, "manual destroy accepted");
            let location = format!("/task/{}", task.id);
            Ok((StatusCode::ACCEPTED, [(header::LOCATION, location)], Json(task)).into_response())
        }
    }
}
