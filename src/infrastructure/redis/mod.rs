//! Redis connection helpers
//!
//! - `ReconnectBackoff`: reconnection delays for the trigger subscriber

mod backoff;

pub use backoff::ReconnectBackoff;
