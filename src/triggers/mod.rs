//! Intake paths that feed due notifications into the delivery engine.
//!
//! The HTTP dispatch endpoint lives in `api`; this module holds the Redis
//! pub/sub subscriber an external timer publishes to.

mod redis;

pub use redis::RedisTrigger;
