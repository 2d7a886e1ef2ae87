// ============================================
// File: crates/zbsec-core/src/lib.rs
// ============================================
//! # zbsec Core - Zigbee Frame Security Library
//!
//! ## Creation Reason
//! Implements the security services of a Zigbee stack as a synchronous,
//! thread-safe library: frame protection, key management, replay
//! protection and key establishment.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Security levels, auxiliary security header codec, CCM* nonce
//!
//! ### Crypto Module ([`crypto`])
//! - CCM* (`FrameCrypto` / `CcmStarCrypto`), AES-MMO and HMAC-MMO
//! - `Key`, `KeyType`, `EncryptType`, CBKE key derivation
//!
//! ### Key Store ([`keystore`]) and Counters ([`counter`])
//! - Key installation, install codes, key resolution by identifier mode
//! - Outgoing counter issue and incoming replay checks
//!
//! ### Key Establishment ([`cbke`]) and Signatures ([`ecdsa`])
//! - CBKE / ECDHE session state machine, implicit certificates
//! - ECDSA signature validation behind a backend trait
//!
//! ### Frame Pipeline ([`frame`]) and Events ([`events`])
//! - `FrameSecurity::secure` / `unsecure`
//! - `SecurityEvent` notifications for listeners
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   zbsec-tool                        │
//! │                       │                             │
//! │                       ▼                             │
//! │                  zbsec-core   ◄── You are here      │
//! │                       │                             │
//! │                       ▼                             │
//! │                 zbsec-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Block cipher comes from RustCrypto `aes`; CCM*, MMO and HMAC-MMO are
//!   built on it and pinned by test vectors
//! - ALL keys implement Zeroize and redact themselves in `Debug`
//! - Wire layouts are byte-exact and little-endian unless noted
//! - Koblitz-curve arithmetic is injected through traits
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cbke;
pub mod counter;
pub mod crypto;
pub mod ecdsa;
pub mod error;
pub mod events;
pub mod frame;
pub mod keystore;
pub mod protocol;

// Re-export commonly used items
pub use cbke::{CbkeConfig, CbkeRole, CbkeSession, CbkeState, CryptoSuite};
pub use counter::{CounterVerdict, FrameCounterTracker};
pub use crypto::{CcmStarCrypto, EncryptType, FrameCrypto, Key, KeyType};
pub use ecdsa::{EcdsaBackend, EcdsaValidator};
pub use error::{CoreError, Result};
pub use events::{SecurityEvent, SecurityEvents, SecurityListener};
pub use frame::{FrameSecurity, FrameSecurityConfig, UnsecuredFrame};
pub use keystore::{KeyIdentity, KeyRef, KeySelector, KeyStore};
pub use protocol::{AuxiliarySecurityHeader, KeyIdentifier, Nonce, ReservedBitsPolicy, SecurityLevel};
