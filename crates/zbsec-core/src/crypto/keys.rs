// ============================================
// File: crates/zbsec-core/src/crypto/keys.rs
// ============================================
//! # Key Types
//!
//! ## Creation Reason
//! Defines the 128-bit symmetric key used by every Zigbee security service
//! and the tags that say what a key is for.
//!
//! ## Main Functionality
//! - `Key`: 16-byte AES key (zeroized on drop, constant-time equality)
//! - `KeyType`: Role of an installed key (network, link, ephemeral auth)
//! - `EncryptType`: Key class that secured a received frame
//! - `ZIGBEE_ALLIANCE_09`: Well-known global trust center link key
//!
//! ## Key Classes
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Network key (StandardNetwork)                             │
//! │  ├─ Shared by every device in the network                  │
//! │  └─ Indexed by key sequence number                         │
//! │                                                            │
//! │  Link keys (AppLink, TcLink, *Auth)                        │
//! │  ├─ Shared with exactly one peer                           │
//! │  ├─ Indexed by the peer's extended address                 │
//! │  └─ Hashed into key-transport / key-load keys on demand    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Key bytes are never logged, displayed or serialized
//! - A key does not own frame counters; see `counter`
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::KEY_SIZE;
use crate::error::{CoreError, Result};

/// "ZigBeeAlliance09", the default global trust center link key.
pub const ZIGBEE_ALLIANCE_09: [u8; KEY_SIZE] = *b"ZigBeeAlliance09";

// ============================================
// Key
// ============================================

/// 128-bit symmetric key.
///
/// # Security
/// - Zeroed on drop
/// - Never logged or serialized
/// - Constant-time comparison
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a key from a slice.
    ///
    /// # Errors
    /// `MalformedInput` if the slice is not 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::malformed_input("key", KEY_SIZE, bytes.len()))?;
        Ok(Self(array))
    }

    /// Parses a key from hex (separators `:` and whitespace are ignored).
    ///
    /// # Errors
    /// `InvalidArgument` on bad hex, `MalformedInput` on a wrong length.
    pub fn from_hex(text: &str) -> Result<Self> {
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        let mut bytes = hex::decode(&cleaned)
            .map_err(|e| CoreError::invalid_argument("key", format!("invalid hex: {e}")))?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    /// Generates a random key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The "ZigBeeAlliance09" key.
    #[must_use]
    pub const fn zigbee_alliance_09() -> Self {
        Self(ZIGBEE_ALLIANCE_09)
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// Do not log or persist the returned bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key([REDACTED])")
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Key {}

// ============================================
// KeyType
// ============================================

/// Role of an installed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum KeyType {
    /// Standard network key.
    StandardNetwork = 0x01,
    /// Application link key.
    AppLink = 0x03,
    /// Trust center link key.
    TcLink = 0x04,
    /// Global ephemeral authentication key.
    GlobalEphemeralAuth = 0xb0,
    /// Unique ephemeral authentication key.
    UniqueEphemeralAuth = 0xb1,
    /// Basic authorization key.
    BasicAuth = 0xb2,
    /// Administrative authorization key.
    AdminAuth = 0xb3,
}

impl KeyType {
    /// Converts an identifier byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::StandardNetwork),
            0x03 => Some(Self::AppLink),
            0x04 => Some(Self::TcLink),
            0xb0 => Some(Self::GlobalEphemeralAuth),
            0xb1 => Some(Self::UniqueEphemeralAuth),
            0xb2 => Some(Self::BasicAuth),
            0xb3 => Some(Self::AdminAuth),
            _ => None,
        }
    }

    /// Returns the identifier byte.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Network keys are indexed by sequence number.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::StandardNetwork)
    }

    /// Link-class keys are indexed by peer address.
    #[must_use]
    pub const fn is_link(&self) -> bool {
        !self.is_network()
    }

    /// Encrypt type reported for frames secured with this key.
    #[must_use]
    pub const fn encrypt_type(&self) -> EncryptType {
        match self {
            Self::StandardNetwork => EncryptType::StandardNetwork,
            Self::TcLink => EncryptType::TcLink,
            _ => EncryptType::AppLink,
        }
    }
}

impl TryFrom<u8> for KeyType {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_byte(value)
            .ok_or_else(|| CoreError::invalid_argument("key_type", format!("unknown key type 0x{value:02x}")))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StandardNetwork => "standard-network",
            Self::AppLink => "app-link",
            Self::TcLink => "tc-link",
            Self::GlobalEphemeralAuth => "global-ephemeral-auth",
            Self::UniqueEphemeralAuth => "unique-ephemeral-auth",
            Self::BasicAuth => "basic-auth",
            Self::AdminAuth => "admin-auth",
        };
        f.write_str(name)
    }
}

// ============================================
// EncryptType
// ============================================

/// Flag marking link-class encrypt types.
pub const ENCRYPT_TYPE_LINK_FLAG: u8 = 0x80;

/// Key class that secured a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum EncryptType {
    /// Frame was not secured.
    None = 0x00,
    /// Network key.
    StandardNetwork = 0x01,
    /// Application link key.
    AppLink = 0x83,
    /// Unique trust center link key.
    TcLink = 0x84,
    /// Preconfigured global trust center link key.
    GlobalTcLink = 0x90,
    /// Distributed-security global link key.
    DistributedTcLink = 0xa0,
}

impl EncryptType {
    /// Returns the identifier byte.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Returns `true` for link-class key types.
    #[must_use]
    pub const fn is_link(&self) -> bool {
        self.as_byte() & ENCRYPT_TYPE_LINK_FLAG != 0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_debug_redacted() {
        let key = Key::from_bytes([0xAB; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(!debug.to_lowercase().contains("ab"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_key_from_hex() {
        let key = Key::from_hex("5A:69:67:42:65:65:41:6C:6C:69:61:6E:63:65:30:39").unwrap();
        assert_eq!(key, Key::zigbee_alliance_09());

        assert!(matches!(
            Key::from_hex("00112233"),
            Err(CoreError::MalformedInput { expected: 16, actual: 4, .. })
        ));
        assert!(matches!(Key::from_hex("zz"), Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(Key::generate(), Key::generate());
    }

    #[test]
    fn test_key_type_ids() {
        for byte in [0x01u8, 0x03, 0x04, 0xb0, 0xb1, 0xb2, 0xb3] {
            assert_eq!(KeyType::try_from(byte).unwrap().as_byte(), byte);
        }
        assert!(KeyType::try_from(0x02).is_err());
        assert!(KeyType::StandardNetwork.is_network());
        assert!(KeyType::AdminAuth.is_link());
    }

    #[test]
    fn test_encrypt_type_link_flag() {
        assert!(!EncryptType::StandardNetwork.is_link());
        assert!(EncryptType::AppLink.is_link());
        assert!(EncryptType::TcLink.is_link());
        assert!(EncryptType::GlobalTcLink.is_link());
        assert!(EncryptType::DistributedTcLink.is_link());
        assert_eq!(KeyType::TcLink.encrypt_type(), EncryptType::TcLink);
        assert_eq!(KeyType::BasicAuth.encrypt_type(), EncryptType::AppLink);
    }

    #[test]
    fn test_key_type_serde() {
        let json = serde_json::to_string(&KeyType::TcLink).unwrap();
        assert_eq!(json, "\"tc-link\"");
        let back: KeyType = serde_json::from_str("\"unique-ephemeral-auth\"").unwrap();
        assert_eq!(back, KeyType::UniqueEphemeralAuth);
    }
}
