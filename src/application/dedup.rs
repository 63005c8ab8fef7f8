//! Dedup guard for view counting.
//!
//! Decides whether a (post, client) view has already been counted, using
//! the durable ledger as source of truth. Uniqueness is enforced by the
//! ledger's primary key, so two concurrent `record_view` calls for the
//! same pair cannot both report a fresh view.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::repos::{AnalyticsRepo, RepoError};

#[derive(Clone)]
pub struct DedupGuard {
    repo: Arc<dyn AnalyticsRepo>,
}

impl DedupGuard {
    pub fn new(repo: Arc<dyn AnalyticsRepo>) -> Self {
        Self { repo }
    }

    pub async fn has_viewed(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError> {
        self.repo.has_view_event(post_id, client_identity).await
    }

    /// Record the (post, client) pair in the ledger. Returns `true` when
    /// the pair is new. A duplicate insert, whether from an earlier
    /// request or a concurrent one, is "already viewed" and never an
    /// error.
    pub async fn record_view(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError> {
        match self.repo.insert_view_event(post_id, client_identity).await {
            Ok(inserted) => Ok(inserted),
            Err(RepoError::Duplicate { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
