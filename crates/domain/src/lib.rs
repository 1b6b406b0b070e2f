//! # fleethub-domain
//!
//! Pure domain model for the fleethub IoT fleet-state service.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (identity, status, and the current sensor snapshot)
//! - Define **History entries** (immutable time-series readings per device)
//! - Define **Commands** (validated mutation payloads) and their validator
//! - Define **Events** (state-change records fanned out to live clients)
//! - Define the **wire protocol** spoken over the live channel
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod command;
pub mod device;
pub mod error;
pub mod event;
pub mod history;
pub mod id;
pub mod protocol;
pub mod time;
