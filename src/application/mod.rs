pub mod analytics;
pub mod counters;
pub mod dedup;
pub mod error;
pub mod feed;
pub mod reconciler;
pub mod repos;
pub mod view_queue;
