use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("socket not found at {path}")]
    SocketNotFound { path: PathBuf },

    #[error("ipc error: {reason}")]
    Ipc { reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{host} did not pre-authorize the connection and no token is configured")]
    MissingCredential { host: String },

    #[error("authentication rejected: {response}")]
    AuthRejected { response: String },

    #[error("connection closed during authentication")]
    AuthClosed,

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
