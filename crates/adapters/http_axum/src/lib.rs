//! # fleethub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **REST JSON API** for programmatic access
//!   (`/api/devices`, `/api/devices/{id}/history`, …)
//! - Serve the **realtime hub** at `/ws`: device-list snapshot on join,
//!   fan-out of fleet events, inbound device commands
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results into HTTP responses and wire messages
//!
//! ## Dependency rule
//! Depends on `fleethub-app` (for port traits and services) and
//! `fleethub-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod ws;
