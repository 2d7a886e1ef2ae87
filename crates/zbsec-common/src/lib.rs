// ============================================
// File: crates/zbsec-common/src/lib.rs
// ============================================
//! # zbsec Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all zbsec crates,
//! so that addresses, errors and timing behave identically in the security
//! core and in the tool binary.
//!
//! ## Main Functionality
//! - [`types`]: IEEE EUI-64 extended address
//! - [`time`]: Clock abstraction and deadlines (CBKE timeouts)
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                zbsec-tool                           │
//! │                    │                                │
//! │                    ▼                                │
//! │               zbsec-core                            │
//! │                    │                                │
//! │                    ▼                                │
//! │              zbsec-common  ◄── You are here         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - Extended addresses are little-endian on the wire, big-endian in text
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use time::{Clock, Deadline, ManualClock, SystemClock, ZigbeeTime};
pub use types::ExtendedAddress;
