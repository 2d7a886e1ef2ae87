// ============================================
// File: crates/zbsec-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the IEEE EUI-64 extended address used as the identity of
//! every Zigbee device: link keys, frame counters, nonces and certificates
//! are all keyed by it.
//!
//! ## Main Functionality
//! - `ExtendedAddress`: 64-bit IEEE address with wire and text conversions
//!
//! ## Representations
//! ```text
//! numeric:  0x0011223344556677
//! text:     00:11:22:33:44:55:66:77   (big-endian, also accepts 0x-hex)
//! wire:     77 66 55 44 33 22 11 00   (little-endian, frames and nonces)
//! cert:     00 11 22 33 44 55 66 77   (big-endian, CBKE certificates)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frames and nonces carry the address little-endian
//! - Certificates and signatures carry it big-endian
//! - Mixing the two silently breaks authentication, never panics
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Size of an extended address in bytes.
pub const EXTENDED_ADDRESS_SIZE: usize = 8;

// ============================================
// ExtendedAddress
// ============================================

/// IEEE 802.15.4 extended (EUI-64) address.
///
/// # Example
/// ```
/// use zbsec_common::types::ExtendedAddress;
///
/// let addr: ExtendedAddress = "00:0d:6f:00:00:12:34:56".parse().unwrap();
/// assert_eq!(addr.as_u64(), 0x000d_6f00_0012_3456);
///
/// let wire = addr.to_le_bytes();
/// assert_eq!(wire[0], 0x56);
/// assert_eq!(ExtendedAddress::from_le_bytes(wire), addr);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ExtendedAddress(u64);

impl ExtendedAddress {
    /// The all-zero address (used when no address is known).
    pub const UNKNOWN: Self = Self(0);

    /// Creates an address from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Decodes from wire order (little-endian).
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; EXTENDED_ADDRESS_SIZE]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Encodes in wire order (little-endian).
    #[must_use]
    pub const fn to_le_bytes(&self) -> [u8; EXTENDED_ADDRESS_SIZE] {
        self.0.to_le_bytes()
    }

    /// Decodes from certificate order (big-endian).
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; EXTENDED_ADDRESS_SIZE]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Encodes in certificate order (big-endian).
    #[must_use]
    pub const fn to_be_bytes(&self) -> [u8; EXTENDED_ADDRESS_SIZE] {
        self.0.to_be_bytes()
    }

    /// Decodes a big-endian slice, returning `None` unless it is 8 bytes.
    #[must_use]
    pub fn from_be_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; EXTENDED_ADDRESS_SIZE] = bytes.try_into().ok()?;
        Some(Self::from_be_bytes(arr))
    }
}

impl fmt::Debug for ExtendedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedAddress({self})")
    }
}

impl fmt::Display for ExtendedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl FromStr for ExtendedAddress {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits: String = if let Some(stripped) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            stripped.to_string()
        } else {
            trimmed.chars().filter(|c| *c != ':' && *c != '-').collect()
        };

        if digits.len() != EXTENDED_ADDRESS_SIZE * 2 {
            return Err(CommonError::invalid_input(
                "extended_address",
                format!("expected 16 hex digits, got {}", digits.len()),
            ));
        }

        let mut bytes = [0u8; EXTENDED_ADDRESS_SIZE];
        hex::decode_to_slice(&digits, &mut bytes)
            .map_err(|e| CommonError::decoding("extended address", e))?;
        Ok(Self::from_be_bytes(bytes))
    }
}

impl From<u64> for ExtendedAddress {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ExtendedAddress> for u64 {
    fn from(addr: ExtendedAddress) -> Self {
        addr.0
    }
}

impl Serialize for ExtendedAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for ExtendedAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            Ok(Self(u64::deserialize(deserializer)?))
        }
    }
}

// ============================================
// Tests
// ============================================
