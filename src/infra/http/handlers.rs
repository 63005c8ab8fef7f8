//! Public API handlers.
//!
//! Thin translation layer: resolve the request, call the application
//! services, map errors. The counting side effects live behind the feed
//! and analytics services, never here.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State};
use axum::{Extension, Json};
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

use crate::infra::http::HttpState;
use crate::infra::http::error::{ApiError, feed_to_api, repo_to_api};

/// Header reporting whether the payload was populated by this request.
pub const CACHE_STATUS_HEADER: &str = "x-latido-cache";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub async fn list_posts(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let payload = state.feed.get_list().await.map_err(feed_to_api)?;

    let cache_status = if payload.fresh { "fresh" } else { "cached" };
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .header(CACHE_STATUS_HEADER, cache_status)
        .body(Body::from(payload.body))
        .map_err(|_| ApiError::internal())?;

    Ok(response)
}

pub async fn get_post(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
) -> Result<Response, ApiError> {
    // `into_make_service_with_connect_info` stores ConnectInfo as a
    // request extension; absent under `oneshot`-driven tests.
    let peer = connect_info.map(|Extension(ConnectInfo(addr))| addr);
    let client = client_identity(&headers, peer.as_ref());
    let body = state
        .feed
        .get_detail(&slug, &client)
        .await
        .map_err(feed_to_api)?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|_| ApiError::internal())?;

    Ok(response)
}

pub async fn increment_post_click(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let post = state
        .posts
        .find_published_by_slug(&slug)
        .await
        .map_err(repo_to_api)?
        .ok_or_else(|| ApiError::not_found("post not found"))?;

    let analytics = state
        .analytics
        .increment_click(post.id)
        .await
        .map_err(repo_to_api)?;

    Ok(Json(analytics).into_response())
}

pub async fn health(State(state): State<HttpState>) -> Response {
    match &state.db {
        Some(db) => match db.health_check().await {
            Ok(()) => StatusCode::NO_CONTENT.into_response(),
            Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        },
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Client identity for view dedup: the first forwarded address when the
/// service sits behind a proxy, otherwise the socket peer. Passed through
/// verbatim; the ledger does not care about its format.
fn client_identity(headers: &HeaderMap, peer: Option<&SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer: SocketAddr = "192.0.2.1:4000".parse().unwrap();

        assert_eq!(client_identity(&headers, Some(&peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.1:4000".parse().unwrap();

        assert_eq!(client_identity(&headers, Some(&peer)), "192.0.2.1");
        assert_eq!(client_identity(&headers, None), "unknown");
    }

    #[test]
    fn empty_forwarded_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("  "));
        assert_eq!(client_identity(&headers, None), "unknown");
    }
}
