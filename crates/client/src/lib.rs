//! # fleethub-client
//!
//! Realtime client for the fleethub websocket feed.
//!
//! ## Responsibilities
//! - Maintain a **local device cache** reconciled against server broadcasts:
//!   full device-list snapshots replace the cache, incremental messages
//!   update it in place
//! - **Reconnect** with exponential backoff after transient failures; each
//!   reconnect picks up a fresh snapshot, so a client that missed updates
//!   converges anyway
//! - Issue **device commands** optimistically: the local cache is updated
//!   immediately, the authoritative state arrives via the feed
//!
//! Transient disconnects are never surfaced as fatal; only
//! [`FleetClient::shutdown`] stops the retry loop.

pub mod cache;
pub mod client;
pub mod error;

pub use cache::{DeviceCache, ReadingSample};
pub use client::{ConnectionState, FleetClient, ReconnectConfig};
pub use error::ClientError;
