use thiserror::Error;

use crate::infra::error::InfraError;

/// Top-level application error, used by startup and the one-shot
/// commands. Request-path errors are mapped to HTTP responses by
/// `infra::http::ApiError` instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
