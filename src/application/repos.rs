//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{HeadingRecord, PostAnalyticsRecord, PostRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read access to published content. Content authoring lives outside this
/// service; the pipeline only ever reads posts.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_published(&self) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    /// Headings for a post, ordered by position.
    async fn list_headings(&self, post_id: Uuid) -> Result<Vec<HeadingRecord>, RepoError>;
}

/// Durable analytics storage. Each mutation applies its delta and the
/// matching click-through-rate recompute as one atomic write, serialized
/// per row by the backend.
#[async_trait]
pub trait AnalyticsRepo: Send + Sync {
    async fn get_or_create(&self, post_id: Uuid) -> Result<PostAnalyticsRecord, RepoError>;

    async fn add_impressions(
        &self,
        post_id: Uuid,
        delta: i64,
    ) -> Result<PostAnalyticsRecord, RepoError>;

    async fn add_clicks(&self, post_id: Uuid, delta: i64)
    -> Result<PostAnalyticsRecord, RepoError>;

    async fn add_view(&self, post_id: Uuid) -> Result<PostAnalyticsRecord, RepoError>;

    /// Insert into the dedup ledger. Returns `false` when the
    /// (post, client) pair was already present; a concurrent loser of the
    /// unique constraint also lands here rather than erroring.
    async fn insert_view_event(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError>;

    async fn has_view_event(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError>;
}
