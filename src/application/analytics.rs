//! Analytics engine: the only writer of `post_analytics` rows.
//!
//! Each increment applies its delta and the matching click-through-rate
//! recompute in one atomic repository write, so a failed call can lose
//! the event but never leave a stale derived value behind.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::application::dedup::DedupGuard;
use crate::application::repos::{AnalyticsRepo, RepoError};
use crate::domain::entities::PostAnalyticsRecord;

pub struct AnalyticsService {
    repo: Arc<dyn AnalyticsRepo>,
    dedup: DedupGuard,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn AnalyticsRepo>) -> Self {
        let dedup = DedupGuard::new(repo.clone());
        Self { repo, dedup }
    }

    pub fn dedup(&self) -> &DedupGuard {
        &self.dedup
    }

    /// Count one impression event. Callers own event-count accuracy:
    /// every call is exactly one impression.
    pub async fn increment_impression(
        &self,
        post_id: Uuid,
    ) -> Result<PostAnalyticsRecord, RepoError> {
        self.repo.add_impressions(post_id, 1).await
    }

    pub async fn increment_click(&self, post_id: Uuid) -> Result<PostAnalyticsRecord, RepoError> {
        self.repo.add_clicks(post_id, 1).await
    }

    /// Count a view once per (post, client) pair. A pair already present
    /// in the ledger is a no-op; the returned flag reports whether a view
    /// was actually added.
    pub async fn increment_view(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError> {
        if !self.dedup.record_view(post_id, client_identity).await? {
            debug!(%post_id, "view already counted for client");
            return Ok(false);
        }

        self.repo.add_view(post_id).await?;
        Ok(true)
    }

    /// Apply an aggregated impression delta in one write. Used by the
    /// reconciler to avoid N individual row updates per drained key.
    pub async fn bulk_add_impressions(
        &self,
        post_id: Uuid,
        delta: u64,
    ) -> Result<PostAnalyticsRecord, RepoError> {
        if delta == 0 {
            return self.repo.get_or_create(post_id).await;
        }

        let delta = i64::try_from(delta).map_err(|_| RepoError::InvalidInput {
            message: format!("impression delta {delta} exceeds i64 range"),
        })?;

        self.repo.add_impressions(post_id, delta).await
    }
}
