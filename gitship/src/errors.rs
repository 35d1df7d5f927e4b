//! Error types for gitship

use thiserror::Error;

/// Main error type for gitship
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Build error: {0}")]
    Build(String),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Unable to reach the deploy server ({kind}): {message}")]
    Notify {
        kind: ConnectionFailure,
        message: String,
    },

    #[error("Deploy failed on the server (HTTP {status}): {message}")]
    RemoteDeploy { status: u16, message: String },

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Server misconfigured: {0}")]
    Misconfigured(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Deploy cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// HTTP status used when the error escapes the deploy endpoint
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            DeployError::Authorization(_) => http::StatusCode::UNAUTHORIZED,
            DeployError::BadRequest(_) | DeployError::JsonError(_) => http::StatusCode::BAD_REQUEST,
            _ => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(format!("{:#}", err))
    }
}

/// Git failures, classified from the command's error output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("git {operation} failed:\n{stderr}")]
    Command { operation: String, stderr: String },

    #[error(
        "push timed out, the commit is probably too large.\n\
         Check for archives, images or other large files and add them to .gitignore."
    )]
    PushTimeout,

    #[error(
        "push rejected: the local branch is behind the remote (non-fast-forward).\n\
         If you are rolling back on purpose, re-run with --force.\n\
         WARNING: --force overwrites the remote branch!"
    )]
    NonFastForward,

    #[error("no repository URL configured: set GIT_REPOSITORY_URL or add an origin remote")]
    MissingRepository,
}

/// Classification of a connection-level failure when calling the deploy server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    TlsReset,
    Timeout,
    Certificate,
    Other,
}

impl std::fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionFailure::TlsReset => "connection reset",
            ConnectionFailure::Timeout => "timeout",
            ConnectionFailure::Certificate => "certificate",
            ConnectionFailure::Other => "connection error",
        };
        f.write_str(name)
    }
}
