//! Counter store backends.
//!
//! `RedisCounterStore` is the production backend; `MemoryCounterStore`
//! keeps a single-node deployment working without Redis and backs the
//! test suites.

mod memory;
mod redis;

pub use memory::MemoryCounterStore;
pub use redis::RedisCounterStore;
