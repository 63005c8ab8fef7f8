pub mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::CACHE_STATUS_HEADER;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::application::analytics::AnalyticsService;
use crate::application::feed::FeedService;
use crate::application::repos::PostsRepo;
use crate::infra::db::PgRepositories;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub analytics: Arc<AnalyticsService>,
    pub posts: Arc<dyn PostsRepo>,
    /// Absent in counter-store-only test setups.
    pub db: Option<Arc<PgRepositories>>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/posts", get(handlers::list_posts))
        .route("/api/posts/{slug}", get(handlers::get_post))
        .route(
            "/api/posts/{slug}/clicks",
            post(handlers::increment_post_click),
        )
        .with_state(state)
}
