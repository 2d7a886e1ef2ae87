// ============================================
// File: crates/zbsec-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Byte-exact encodings shared by both ends of a secured Zigbee frame: the
//! auxiliary security header, the security level table and the CCM* nonce.
//!
//! ## Main Functionality
//! - [`level`]: Security levels, MIC length and encryption flag
//! - [`header`]: Auxiliary security header codec
//! - [`nonce`]: 13-byte nonce construction
//!
//! ## Wire Format Principles
//! - Little-endian byte order for multi-byte integers
//! - Fixed-size fields, no padding
//! - Optional fields are driven only by control bits
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frames are opaque octets; callers supply the aux header offset
//! - Any layout change breaks interoperability with deployed devices
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod header;
pub mod level;
pub mod nonce;

pub use header::{AuxiliarySecurityHeader, KeyIdentifier, ReservedBitsPolicy};
pub use level::SecurityLevel;
pub use nonce::Nonce;

// ============================================
// Constants
// ============================================

/// CCM* nonce length.
pub const NONCE_LENGTH: usize = 13;

/// Control byte plus frame counter.
pub const MIN_HEADER_SIZE: usize = 5;

/// Control, counter, extended source and key sequence number.
pub const MAX_HEADER_SIZE: usize = 14;

/// Last usable outgoing frame counter is one below this.
pub const MAX_FRAME_COUNTER: u32 = u32::MAX;

/// Counters below this value may be accepted during an explicit reset.
pub const FRAME_COUNTER_RESET_MAX: u32 = 256;
