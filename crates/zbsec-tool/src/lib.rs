// ============================================
// File: crates/zbsec-tool/src/lib.rs
// ============================================
//! # zbsec Tool Library
//!
//! ## Creation Reason
//! Shared pieces of the `zbsec` command-line front-end: configuration
//! loading and the error type the commands report.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Device configuration (TOML) and key store construction
//! - [`error`]: Tool-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    zbsec (binary)                    │
//! │   clap commands ──► ToolConfig ──► KeyStore          │
//! │                          │                           │
//! │                          ▼                           │
//! │                FrameSecurity / crypto                │
//! │                     (zbsec-core)                     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The tool is offline: it never talks to a radio
//! - Counters issued by `secure` are not written back to the config file
//!
//! ## Last Modified
//! v0.1.0 - Initial tool library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

// Re-export primary types
pub use config::ToolConfig;
pub use error::{Result, ToolError};
