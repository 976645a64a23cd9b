//! PostgreSQL persistence module.
//!
//! Provides the connection pool used by the PostgreSQL token registry.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
