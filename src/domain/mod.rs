pub mod analytics;
pub mod entities;
pub mod types;
