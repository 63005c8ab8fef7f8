//! Public read paths: post list and post detail.
//!
//! Both paths serve a serialized snapshot from the response cache and
//! route every request, hit or miss, through the counting side effects:
//! list renders count one impression per rendered post via the fast
//! counter store, detail fetches publish a deduplicated view event.
//! Counting failures never fail the read.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::counters::{CounterNamespace, CounterStore};
use crate::application::repos::{PostsRepo, RepoError};
use crate::application::view_queue::ViewQueue;
use crate::cache::{CacheKey, CachedPayload, ResponseStore};
use crate::domain::entities::{HeadingRecord, PostRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("post not found")]
    PostNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialized list payload plus whether this call populated the cache.
#[derive(Debug, Clone)]
pub struct FeedPayload {
    pub body: Bytes,
    pub fresh: bool,
}

#[derive(Debug, Serialize)]
struct PostSummary<'a> {
    id: Uuid,
    title: &'a str,
    description: &'a str,
    category: &'a str,
    slug: &'a str,
}

#[derive(Debug, Serialize)]
struct HeadingView<'a> {
    title: &'a str,
    slug: &'a str,
    level: i16,
    order: i32,
}

#[derive(Debug, Serialize)]
struct PostDetail<'a> {
    id: Uuid,
    title: &'a str,
    description: &'a str,
    content: &'a str,
    category: &'a str,
    keywords: &'a str,
    slug: &'a str,
    headings: Vec<HeadingView<'a>>,
}

pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    counters: Arc<dyn CounterStore>,
    cache: Arc<ResponseStore>,
    views: Arc<ViewQueue>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        counters: Arc<dyn CounterStore>,
        cache: Arc<ResponseStore>,
        views: Arc<ViewQueue>,
    ) -> Self {
        Self {
            posts,
            counters,
            cache,
            views,
        }
    }

    /// All published posts as a serialized snapshot. A hit inside the TTL
    /// window returns the exact bytes the populating miss stored; either
    /// way one impression is counted per post in the payload.
    pub async fn get_list(&self) -> Result<FeedPayload, FeedError> {
        if let Some(cached) = self.cache.get(&CacheKey::PostList) {
            self.count_impressions(&cached.post_ids).await;
            return Ok(FeedPayload {
                body: cached.body,
                fresh: false,
            });
        }

        let posts = self.posts.find_published().await?;
        let summaries: Vec<PostSummary<'_>> = posts
            .iter()
            .map(|post| PostSummary {
                id: post.id,
                title: &post.title,
                description: &post.description,
                category: &post.category,
                slug: &post.slug,
            })
            .collect();
        let body = Bytes::from(serde_json::to_vec(&summaries)?);
        let post_ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();

        self.cache.put(
            CacheKey::PostList,
            CachedPayload {
                body: body.clone(),
                post_ids: post_ids.clone(),
            },
        );
        self.count_impressions(&post_ids).await;

        Ok(FeedPayload { body, fresh: true })
    }

    /// One published post by slug. The view-count side effect is always
    /// dispatched to the view queue and never awaited by the read path.
    pub async fn get_detail(&self, slug: &str, client_identity: &str) -> Result<Bytes, FeedError> {
        let key = CacheKey::post_detail(slug);
        if let Some(cached) = self.cache.get(&key) {
            if let Some(post_id) = cached.post_ids.first().copied() {
                self.views.publish(post_id, client_identity);
            }
            return Ok(cached.body);
        }

        let post = self
            .posts
            .find_published_by_slug(slug)
            .await?
            .ok_or(FeedError::PostNotFound)?;
        let headings = self.posts.list_headings(post.id).await?;
        let body = Bytes::from(serde_json::to_vec(&detail_view(&post, &headings))?);

        self.cache.put(
            key,
            CachedPayload {
                body: body.clone(),
                post_ids: vec![post.id],
            },
        );
        self.views.publish(post.id, client_identity);

        Ok(body)
    }

    /// Buffer one impression per rendered post. A counter-store outage
    /// costs impressions, not requests.
    async fn count_impressions(&self, post_ids: &[Uuid]) {
        for post_id in post_ids {
            if let Err(err) = self
                .counters
                .increment(CounterNamespace::PostImpressions, *post_id)
                .await
            {
                metrics::counter!("latido_impression_buffer_failed_total").increment(1);
                warn!(%post_id, error = %err, "failed to buffer impression");
            }
        }
    }
}

fn detail_view<'a>(post: &'a PostRecord, headings: &'a [HeadingRecord]) -> PostDetail<'a> {
    PostDetail {
        id: post.id,
        title: &post.title,
        description: &post.description,
        content: &post.content,
        category: &post.category,
        keywords: &post.keywords,
        slug: &post.slug,
        headings: headings
            .iter()
            .map(|heading| HeadingView {
                title: &heading.title,
                slug: &heading.slug,
                level: heading.level,
                order: heading.position,
            })
            .collect(),
    }
}
