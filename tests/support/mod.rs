//! Shared in-memory fakes for the integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use latido::application::repos::{AnalyticsRepo, PostsRepo, RepoError};
use latido::domain::analytics::click_through_rate;
use latido::domain::entities::{HeadingRecord, PostAnalyticsRecord, PostRecord};
use latido::domain::types::PostStatus;

/// In-memory stand-in for the Postgres repositories. Analytics mutations
/// happen under one lock, mirroring the per-row atomicity of the real
/// upserts: the delta and the CTR recompute land together or not at all.
#[derive(Default)]
pub struct MemoryRepo {
    posts: Mutex<Vec<PostRecord>>,
    headings: Mutex<Vec<HeadingRecord>>,
    analytics: Mutex<HashMap<Uuid, PostAnalyticsRecord>>,
    view_events: Mutex<HashSet<(Uuid, String)>>,
    failing_posts: Mutex<HashSet<Uuid>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_post(&self, slug: &str, title: &str, status: PostStatus) -> PostRecord {
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: title.to_string(),
            description: format!("{title} description"),
            content: format!("{title} body"),
            category: "general".to_string(),
            keywords: String::new(),
            status,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    pub fn seed_heading(&self, post_id: Uuid, title: &str, level: i16, position: i32) {
        self.headings.lock().unwrap().push(HeadingRecord {
            id: Uuid::new_v4(),
            post_id,
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            level,
            position,
        });
    }

    /// Make every analytics write for `post_id` fail with a persistence
    /// error until cleared.
    pub fn fail_analytics_for(&self, post_id: Uuid) {
        self.failing_posts.lock().unwrap().insert(post_id);
    }

    pub fn clear_failures(&self) {
        self.failing_posts.lock().unwrap().clear();
    }

    pub fn analytics_for(&self, post_id: Uuid) -> Option<PostAnalyticsRecord> {
        self.analytics.lock().unwrap().get(&post_id).cloned()
    }

    pub fn view_event_count(&self) -> usize {
        self.view_events.lock().unwrap().len()
    }

    fn check_failure(&self, post_id: Uuid) -> Result<(), RepoError> {
        if self.failing_posts.lock().unwrap().contains(&post_id) {
            return Err(RepoError::Persistence("injected failure".to_string()));
        }
        Ok(())
    }

    fn mutate<F>(&self, post_id: Uuid, apply: F) -> Result<PostAnalyticsRecord, RepoError>
    where
        F: FnOnce(&mut PostAnalyticsRecord),
    {
        self.check_failure(post_id)?;

        let mut analytics = self.analytics.lock().unwrap();
        let record = analytics.entry(post_id).or_insert_with(|| empty_row(post_id));
        apply(record);
        record.click_through_rate = click_through_rate(record.clicks, record.impressions);
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }
}

fn empty_row(post_id: Uuid) -> PostAnalyticsRecord {
    PostAnalyticsRecord {
        post_id,
        views: 0,
        impressions: 0,
        clicks: 0,
        click_through_rate: 0.0,
        avg_time_on_page: 0.0,
        updated_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl PostsRepo for MemoryRepo {
    async fn find_published(&self) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.status == PostStatus::Published)
            .cloned()
            .collect())
    }

    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.slug == slug && post.status == PostStatus::Published)
            .cloned())
    }

    async fn list_headings(&self, post_id: Uuid) -> Result<Vec<HeadingRecord>, RepoError> {
        let mut headings: Vec<HeadingRecord> = self
            .headings
            .lock()
            .unwrap()
            .iter()
            .filter(|heading| heading.post_id == post_id)
            .cloned()
            .collect();
        headings.sort_by_key(|heading| heading.position);
        Ok(headings)
    }
}

#[async_trait]
impl AnalyticsRepo for MemoryRepo {
    async fn get_or_create(&self, post_id: Uuid) -> Result<PostAnalyticsRecord, RepoError> {
        self.mutate(post_id, |_| {})
    }

    async fn add_impressions(
        &self,
        post_id: Uuid,
        delta: i64,
    ) -> Result<PostAnalyticsRecord, RepoError> {
        self.mutate(post_id, |record| record.impressions += delta)
    }

    async fn add_clicks(
        &self,
        post_id: Uuid,
        delta: i64,
    ) -> Result<PostAnalyticsRecord, RepoError> {
        self.mutate(post_id, |record| record.clicks += delta)
    }

    async fn add_view(&self, post_id: Uuid) -> Result<PostAnalyticsRecord, RepoError> {
        self.mutate(post_id, |record| record.views += 1)
    }

    async fn insert_view_event(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError> {
        self.check_failure(post_id)?;
        Ok(self
            .view_events
            .lock()
            .unwrap()
            .insert((post_id, client_identity.to_string())))
    }

    async fn has_view_event(
        &self,
        post_id: Uuid,
        client_identity: &str,
    ) -> Result<bool, RepoError> {
        Ok(self
            .view_events
            .lock()
            .unwrap()
            .contains(&(post_id, client_identity.to_string())))
    }
}
