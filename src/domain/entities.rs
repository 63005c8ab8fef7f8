//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::PostStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub category: String,
    pub keywords: String,
    pub status: PostStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub title: String,
    pub slug: String,
    pub level: i16,
    pub position: i32,
}

/// One row per post, created lazily on the first analytics event.
///
/// `click_through_rate` is derived from `clicks` and `impressions` by
/// [`crate::domain::analytics::click_through_rate`]; both persistence
/// backends recompute it inside the same write that mutates either
/// counter, so the stored value is never stale at rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostAnalyticsRecord {
    pub post_id: Uuid,
    pub views: i64,
    pub impressions: i64,
    pub clicks: i64,
    pub click_through_rate: f64,
    pub avg_time_on_page: f64,
    pub updated_at: OffsetDateTime,
}
