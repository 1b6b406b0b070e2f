//! # fleethub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `fleethub-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Timestamps are stored as epoch milliseconds, the same representation they
//! have on the wire.
//!
//! ## Dependency rule
//! Depends on `fleethub-app` (for port traits) and `fleethub-domain` (for
//! domain types). The `app` and `domain` crates must never reference this
//! adapter.

pub mod device_repo;
pub mod error;
pub mod history_repo;
pub mod pool;
