//! Analytics persistence.
//!
//! Every counter mutation is a single upsert that applies the delta and
//! recomputes `click_through_rate` from the post-mutation pair in the
//! same statement; Postgres row-level locking serializes concurrent
//! writers on one row, so the derived value can never go stale at rest.

use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{AnalyticsRepo, RepoError};
use crate::domain::entities::PostAnalyticsRecord;

use super::PgRepositories;
use super::util::map_sqlx_error;

#[derive(FromRow)]
struct AnalyticsRow {
    post_id: Uuid,
    views: i64,
    impressions: i64,
    clicks: i64,
    click_through_rate: f64,
    avg_time_on_page: f64,
    updated_at: OffsetDateTime,
}

impl From<AnalyticsRow> for PostAnalyticsRecord {
    fn from(row: AnalyticsRow) -> Self {
        PostAnalyticsRecord {
            post_id: row.post_id,
            views: row.views,
            impressions: row.impressions,
            clicks: row.clicks,
            click_through_rate: row.click_through_rate,
            avg_time_on_page: row.avg_time_on_page,
            updated_at: row.updated_at,
        }
    }
}

const ANALYTICS_COLUMNS: &str =
    "post_id, views, impressions, clicks, click_through_rate, avg_time_on_page, updated_at";

#[async_trait]
impl AnalyticsRepo for PgRepositories {
    async fn get_or_create(&self, post_id: Uuid) -> Result<PostAnalyticsRecord, RepoError> {
        let sql = format!(
            "INSERT INTO post_analytics (post_id) VALUES ($1) \
             ON CONFLICT (post_id) DO UPDATE SET post_id = EXCLUDED.post_id \
             RETURNING {ANALYTICS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn add_impressions(
        &self,
        post_id: Uuid,
        delta: i64,
    ) -> Result<PostAnalyticsRecord, RepoError> {
        let sql = format!(
            "INSERT INTO post_analytics (post_id, impressions) VALUES ($1, $2) \
             ON CONFLICT (post_id) DO UPDATE SET \
                 impressions = post_analytics.impressions + $2, \
                 click_through_rate = CASE \
                     WHEN post_analytics.impressions + $2 > 0 \
                     THEN post_analytics.clicks::double precision \
                          / (post_analytics.impressions + $2) * 100 \
                     ELSE 0 \
                 END, \
                 updated_at = now() \
             RETURNING {ANALYTICS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(post_id)
            .bind(delta)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn add_clicks(
        &self,
        post_id: Uuid,
        delta: i64,
    ) -> Result<PostAnalyticsRecord, RepoError> {
        let sql = format!(
            "INSERT INTO post_analytics (post_id, clicks) VALUES ($1, $2) \
             ON CONFLICT (post_id) DO UPDATE SET \
                 clicks = post_analytics.clicks + $2, \
                 click_through_rate = CASE \
                     WHEN post_analytics.impressions > 0 \
                     THEN (post_analytics.clicks + $2)::double precision \
                          / post_analytics.impressions * 100 \
                     ELSE 0 \
                 END, \
                 updated_at = now() \
             RETURNING {ANALYTICS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(post_id)
            .bind(delta)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn add_view(&self, post_id: Uuid) -> Result<PostAnalyticsRecord, RepoError> {
        let sql = format!(
            "INSERT INTO post_analytics (post_id, views) VALUES ($1, 1) \
             ON CONFLICT (post_id) DO UPDATE SET \
                 views = post_analytics.views + 1, \
                 updated_at = now() \
             RETURNING {ANALYTICS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AnalyticsRow>(&sql)
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn insert_view_event(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "INSERT INTO post_view_events (post_id, client_identity) VALUES ($1, $2) \
             ON CONFLICT (post_id, client_identity) DO NOTHING",
        )
        .bind(post_id)
        .bind(client_identity)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn has_view_event(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS ( \
                 SELECT 1 FROM post_view_events \
                 WHERE post_id = $1 AND client_identity = $2 \
             )",
        )
        .bind(post_id)
        .bind(client_identity)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists)
    }
}
