use thiserror::Error;

#[derive(Debug, Error)]
pub enum LemurError {
    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("no candidate produced a value")]
    NoCandidate,

    #[error("task not found: {0}")]
    TaskNotFound(u64),

    #[error("task {id} already finished with status {status}")]
    TaskFinished { id: u64, status: String },

    #[error("unable to destroy {member}: {reason}")]
    Destruction { member: String, reason: String },

    #[error("director error: {0}")]
    Director(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    #[error("reporter error: {0}")]
    Reporter(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LemurError>;
