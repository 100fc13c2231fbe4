use std::time::Duration;

use thiserror::Error;

/// Failures the pipeline surfaces to its caller.
///
/// Collaborator adapters report through `anyhow`; the pipeline folds those into
/// `Backend` at the boundary. An empty retrieval is not an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Backend failure ({backend}): {message}")]
    Backend { backend: &'static str, message: String },

    #[error("Search deadline of {0:?} elapsed before both backends responded")]
    Timeout(Duration),
}

impl Error {
    pub fn backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Backend { backend, message: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
