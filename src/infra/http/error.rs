use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::feed::FeedError;
use crate::application::repos::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const UNAVAILABLE: &str = "transient_unavailable";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: &'static str) -> Self {
        Self {
            status,
            code,
            message,
        }
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UNAVAILABLE,
            "Service temporarily unavailable",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::Timeout | RepoError::Persistence(_) => ApiError::unavailable(),
        RepoError::Duplicate { .. } | RepoError::InvalidInput { .. } => ApiError::internal(),
    }
}

pub fn feed_to_api(err: FeedError) -> ApiError {
    match err {
        FeedError::PostNotFound => ApiError::not_found("post not found"),
        FeedError::Repo(err) => repo_to_api(err),
        FeedError::Serialize(_) => ApiError::internal(),
    }
}
