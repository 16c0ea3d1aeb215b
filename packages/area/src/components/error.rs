use thiserror::Error;

use crate::{filter::FilterError, schema::ConfigError};

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("filter: {0}")]
    Filter(#[from] FilterError),

    #[error("missing credential")]
    MissingCredential,

    // 5xx, timeouts, dropped sockets - worth retrying on the next tick
    #[error("upstream transient: {0}")]
    UpstreamTransient(String),

    // 4xx that indicates a config problem - retrying won't help
    #[error("upstream fatal: {0}")]
    UpstreamFatal(String),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComponentError {
    /// Classify an HTTP status the way the worker and evaluator care about:
    /// server-side trouble is transient, client-side is a config problem
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() {
            ComponentError::UpstreamTransient(format!("{status}: {body}"))
        } else {
            ComponentError::UpstreamFatal(format!("{status}: {body}"))
        }
    }
}
