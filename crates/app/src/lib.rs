//! # fleethub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository` — CRUD for registered devices
//!   - `HistoryRepository` — append & query time-series readings
//!   - `EventPublisher` — fan-out of fleet events
//! - Define **driving/inbound ports** as use-case structs:
//!   - `DeviceService` — register, update, list, get, delete
//!   - `HistoryService` — append readings, windowed queries, latest
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//! - Serialize concurrent mutations per device and publish events after commit
//!
//! ## Dependency rule
//! Depends on `fleethub-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod ports;
pub mod services;
