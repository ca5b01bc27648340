use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lemur_core::LemurError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 through the `anyhow::Error` chain.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(b) = self.0.downcast_ref::<BadRequestError>() {
            let body = serde_json::json!({ "error": b.0.clone() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }

        let status = if let Some(e) = self.0.downcast_ref::<LemurError>() {
            match e {
                LemurError::TaskNotFound(_) => StatusCode::NOT_FOUND,
                LemurError::TaskFinished { .. } => StatusCode::CONFLICT,
                LemurError::Destruction { .. }
                | LemurError::Director(_)
                | LemurError::Infrastructure(_)
                | LemurError::Reporter(_)
                | LemurError::Http(_) => StatusCode::BAD_GATEWAY,
                LemurError::ConfigNotFound(_)
                | LemurError::InvalidConfig(_)
                | LemurError::InvalidSchedule { .. }
                | LemurError::NoCandidate
                | LemurError::Io(_)
                | LemurError::Yaml(_)
                | LemurError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
