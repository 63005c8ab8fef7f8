//! Latido: a blog content API with a buffered engagement-analytics
//! pipeline.
//!
//! High-frequency engagement events (impressions on list renders, views
//! on detail fetches, clicks on demand) are absorbed by a fast counter
//! store and an in-process view queue, then reconciled into Postgres on
//! a fixed interval. Read traffic is served from a TTL-bounded response
//! cache that still routes every hit through the counting path.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
