//! Router-level tests for the public API, exercising the cache and
//! counting side effects behind each endpoint.

mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use bytes::Bytes;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use latido::application::analytics::AnalyticsService;
use latido::application::counters::{CounterKey, CounterNamespace, CounterStore};
use latido::application::feed::FeedService;
use latido::application::view_queue::{ViewConsumer, ViewQueue};
use latido::cache::{CacheConfig, ResponseStore};
use latido::domain::types::PostStatus;
use latido::infra::counters::MemoryCounterStore;
use latido::infra::http::{CACHE_STATUS_HEADER, HttpState, build_router};

use support::MemoryRepo;

struct Harness {
    repo: Arc<MemoryRepo>,
    counters: Arc<MemoryCounterStore>,
    queue: Arc<ViewQueue>,
    consumer: ViewConsumer,
    router: Router,
}

impl Harness {
    fn new(cache: CacheConfig) -> Self {
        let repo = Arc::new(MemoryRepo::new());
        let counters = Arc::new(MemoryCounterStore::new());
        let queue = Arc::new(ViewQueue::new(64));
        let analytics = Arc::new(AnalyticsService::new(repo.clone() as Arc<_>));
        let consumer = ViewConsumer::new(queue.clone(), analytics.clone(), 32);

        let feed = Arc::new(FeedService::new(
            repo.clone() as Arc<_>,
            counters.clone() as Arc<_>,
            Arc::new(ResponseStore::new(cache)),
            queue.clone(),
        ));

        let router = build_router(HttpState {
            feed,
            analytics,
            posts: repo.clone() as Arc<_>,
            db: None,
        });

        Self {
            repo,
            counters,
            queue,
            consumer,
            router,
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, Option<String>, Bytes) {
        self.request(Method::GET, uri, &[]).await
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Option<String>, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");

        let status = response.status();
        let cache_status = response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should collect");

        (status, cache_status, body)
    }

    async fn buffered_impressions(&self, post_id: Uuid) -> u64 {
        let key = CounterKey::new(CounterNamespace::PostImpressions, post_id);
        let value = self.counters.take(&key).await.unwrap();
        if value > 0 {
            // Put it back so the assertion is non-destructive.
            self.counters
                .increment_by(CounterNamespace::PostImpressions, post_id, value)
                .await
                .unwrap();
        }
        value
    }
}

#[tokio::test]
async fn list_serves_published_posts_and_buffers_impressions() {
    let harness = Harness::new(CacheConfig::default());
    let first = harness.repo.seed_post("uno", "Uno", PostStatus::Published);
    let second = harness.repo.seed_post("dos", "Dos", PostStatus::Published);
    harness.repo.seed_post("draft", "Draft", PostStatus::Draft);

    let (status, cache_status, body) = harness.get("/api/posts").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status.as_deref(), Some("fresh"));

    let payload: Value = serde_json::from_slice(&body).unwrap();
    let slugs: Vec<&str> = payload
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["uno", "dos"]);

    assert_eq!(harness.buffered_impressions(first.id).await, 1);
    assert_eq!(harness.buffered_impressions(second.id).await, 1);
}

#[tokio::test]
async fn cached_list_hit_returns_identical_bytes_and_still_counts() {
    let harness = Harness::new(CacheConfig::default());
    let post = harness.repo.seed_post("uno", "Uno", PostStatus::Published);

    let (_, first_status, first_body) = harness.get("/api/posts").await;
    let (_, second_status, second_body) = harness.get("/api/posts").await;

    assert_eq!(first_status.as_deref(), Some("fresh"));
    assert_eq!(second_status.as_deref(), Some("cached"));
    assert_eq!(first_body, second_body);
    assert_eq!(harness.buffered_impressions(post.id).await, 2);
}

#[tokio::test]
async fn expired_list_entry_is_refetched() {
    let config = CacheConfig {
        ttl: Duration::from_millis(0),
        ..Default::default()
    };
    let harness = Harness::new(config);
    harness.repo.seed_post("uno", "Uno", PostStatus::Published);

    let (_, first_status, _) = harness.get("/api/posts").await;
    let (_, second_status, _) = harness.get("/api/posts").await;

    assert_eq!(first_status.as_deref(), Some("fresh"));
    assert_eq!(second_status.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn detail_serves_payload_and_counts_one_view_per_client() {
    let harness = Harness::new(CacheConfig::default());
    let post = harness.repo.seed_post("uno", "Uno", PostStatus::Published);
    harness.repo.seed_heading(post.id, "Intro", 2, 0);

    let forwarded = [("x-forwarded-for", "203.0.113.7")];
    let (status, _, body) = harness
        .request(Method::GET, "/api/posts/uno", &forwarded)
        .await;

    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["slug"], "uno");
    assert_eq!(payload["headings"][0]["title"], "Intro");

    // Second fetch from the same client comes from the cache and is
    // deduplicated by the ledger; a new client counts again.
    let (_, _, cached_body) = harness
        .request(Method::GET, "/api/posts/uno", &forwarded)
        .await;
    assert_eq!(body, cached_body);
    harness
        .request(
            Method::GET,
            "/api/posts/uno",
            &[("x-forwarded-for", "203.0.113.8")],
        )
        .await;

    harness.consumer.consume().await;
    assert_eq!(harness.repo.analytics_for(post.id).unwrap().views, 2);
}

#[tokio::test]
async fn detail_without_forwarded_header_or_peer_counts_one_view() {
    let harness = Harness::new(CacheConfig::default());
    let post = harness.repo.seed_post("uno", "Uno", PostStatus::Published);

    // No X-Forwarded-For and no connection info: the client identity
    // falls back to "unknown", which still dedups as one client.
    let (status, _, _) = harness.get("/api/posts/uno").await;
    assert_eq!(status, StatusCode::OK);
    harness.get("/api/posts/uno").await;

    harness.consumer.consume().await;
    assert_eq!(harness.repo.analytics_for(post.id).unwrap().views, 1);
}

#[tokio::test]
async fn unknown_slug_is_not_found_with_no_side_effects() {
    let harness = Harness::new(CacheConfig::default());
    harness.repo.seed_post("uno", "Uno", PostStatus::Published);

    let (status, _, body) = harness.get("/api/posts/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["error"]["code"], "not_found");
    assert!(harness.counters.is_empty());
    assert!(harness.queue.is_empty());
}

#[tokio::test]
async fn draft_posts_are_not_served() {
    let harness = Harness::new(CacheConfig::default());
    harness.repo.seed_post("wip", "Wip", PostStatus::Draft);

    let (status, _, _) = harness.get("/api/posts/wip").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn click_endpoint_returns_the_updated_row() {
    let harness = Harness::new(CacheConfig::default());
    let post = harness.repo.seed_post("uno", "Uno", PostStatus::Published);

    harness
        .request(Method::POST, "/api/posts/uno/clicks", &[])
        .await;
    let (status, _, body) = harness
        .request(Method::POST, "/api/posts/uno/clicks", &[])
        .await;

    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["post_id"], post.id.to_string());
    assert_eq!(payload["clicks"], 2);
    assert_eq!(payload["click_through_rate"], 0.0);
}

#[tokio::test]
async fn click_on_unknown_slug_is_not_found() {
    let harness = Harness::new(CacheConfig::default());

    let (status, _, _) = harness
        .request(Method::POST, "/api/posts/nope/clicks", &[])
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_ok_without_a_database() {
    let harness = Harness::new(CacheConfig::default());

    let (status, _, _) = harness.get("/healthz").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
