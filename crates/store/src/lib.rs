//! Data store backends for Clara.
//!
//! Implements the `clara_core::store` traits:
//! - `InMemoryStore` — for tests and ephemeral sessions
//! - `SqliteStore` — the production backend (behind the `sqlite` feature)

pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
