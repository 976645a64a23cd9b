//! Device token registry.
//!
//! Maps recipient identities (owner, tenant, role, optional topic label) to
//! opaque push tokens. The delivery engine only reads from it; clients write
//! through `register` and `set_active`.
//!
//! - `MemoryTokenRegistry`: DashMap storage (default)
//! - `PostgresTokenRegistry`: `device_tokens` table
//!
//! Use `create_token_registry()` to pick one from configuration.

mod backend;
mod factory;
pub mod memory_backend;
pub mod postgres_backend;
pub mod roster;
mod types;

pub use backend::{ClassRoster, DeviceTokenRegistry, RegistryError};
pub use factory::{create_class_roster, create_token_registry};
pub use memory_backend::MemoryTokenRegistry;
pub use postgres_backend::{PostgresClassRoster, PostgresTokenRegistry};
pub use roster::MemoryClassRoster;
pub use types::{
    redact_token, DeviceKind, DeviceToken, RegistryStats, TokenFilter, TokenRegistration,
    UpsertedToken,
};
