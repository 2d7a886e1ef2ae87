// ============================================
// File: crates/zbsec-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes the symmetric cryptography of Zigbee security, built on the
//! RustCrypto AES-128 block cipher.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Key, key type and encrypt type definitions
//! - [`ccm`]: CCM* frame protection (`FrameCrypto`, `CcmStarCrypto`)
//! - [`mmo`]: AES-MMO hash, HMAC-MMO, hashed link keys
//! - [`kdf`]: CBKE key derivation and confirmation MACs
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Frame Protection                         │
//! │                                                             │
//! │   Key + Nonce(src, counter, control) ──► CCM* ──► body+MIC  │
//! │                                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Key Derivation                           │
//! │                                                             │
//! │   Install code ──► AES-MMO ──────────────► TC link key      │
//! │   Link key ──────► HMAC-MMO(0x00/0x02) ──► transport/load   │
//! │   CBKE Z ────────► AES-MMO KDF ──────────► MacKey, KeyData  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - AES comes from the `aes` crate; only modes are implemented here
//! - ALL key material implements Zeroize
//! - Test vectors must keep matching the published ones
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

mod block;
pub mod ccm;
pub mod kdf;
pub mod keys;
pub mod mmo;

// Re-export primary types at module level
pub use ccm::{CcmStarCrypto, FrameCrypto, Protected};
pub use keys::{EncryptType, Key, KeyType, ZIGBEE_ALLIANCE_09};
pub use mmo::{hmac_mmo, key_load_key, mmo_hash, transport_key};

// ============================================
// Constants
// ============================================

/// AES-128 key size in bytes.
pub const KEY_SIZE: usize = 16;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Largest MIC any security level produces.
pub const MAX_MIC_LENGTH: usize = 16;
