// ============================================
// File: crates/zbsec-core/src/protocol/header.rs
// ============================================
//! # Auxiliary Security Header Codec
//!
//! ## Creation Reason
//! Every secured NWK/APS frame carries an auxiliary security header between
//! the frame header and the protected payload. This module encodes and
//! decodes it byte-exactly.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Security Control (1 byte)                                    │
//! │   bits 0-2  security level                                   │
//! │   bits 3-4  key identifier (link/network/transport/key-load) │
//! │   bit  5    extended nonce                                   │
//! │   bits 6-7  reserved (zero)                                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Frame Counter (4 bytes LE)                                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Source Address (8 bytes LE)      iff extended nonce          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Key Sequence Number (1 byte)     iff key identifier = NETWORK│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Parsing Strategy
//! 1. Check one byte is present, read the control byte
//! 2. Apply the reserved-bits policy
//! 3. Compute the size implied by the control byte and check the buffer
//! 4. Read the fields
//!
//! ## ⚠️ Important Note for Next Developer
//! - Reserved bits are written as zero and never interpreted as data
//! - Zigbee transmits the level field as zero; receivers substitute the
//!   network security level with [`AuxiliarySecurityHeader::with_level`]
//!   before building the nonce
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use zbsec_common::ExtendedAddress;

use super::level::{SecurityLevel, LEVEL_MASK};
use super::{MAX_HEADER_SIZE, MIN_HEADER_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Control Byte Layout
// ============================================

/// Key identifier field mask.
pub const CONTROL_KEYID_MASK: u8 = 0x18;
/// Key identifier field offset.
pub const CONTROL_KEYID_OFFSET: u8 = 3;
/// Extended nonce flag.
pub const CONTROL_EXT_NONCE: u8 = 0x20;
/// Reserved bits.
pub const CONTROL_RESERVED_MASK: u8 = 0xC0;

// ============================================
// KeyIdentifier
// ============================================

/// Key identifier sub-field (over-the-air values only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum KeyIdentifier {
    /// Data key (link key shared with the peer).
    Link = 0x00,
    /// Network key, identified by sequence number.
    Network = 0x01,
    /// Key-transport key (hashed link key).
    Transport = 0x02,
    /// Key-load key (hashed link key).
    KeyLoad = 0x03,
}

impl KeyIdentifier {
    /// Converts a 2-bit field value.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Link),
            0x01 => Some(Self::Network),
            0x02 => Some(Self::Transport),
            0x03 => Some(Self::KeyLoad),
            _ => None,
        }
    }

    /// Returns the field value.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Link-class identifiers are resolved by peer address.
    #[must_use]
    pub const fn is_link_class(&self) -> bool {
        !matches!(self, Self::Network)
    }
}

impl TryFrom<u8> for KeyIdentifier {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_byte(value).ok_or_else(|| {
            CoreError::invalid_argument("key_identifier", format!("0x{value:02x} is not in 0..=3"))
        })
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Link => "link",
            Self::Network => "network",
            Self::Transport => "key-transport",
            Self::KeyLoad => "key-load",
        };
        f.write_str(name)
    }
}

// ============================================
// ReservedBitsPolicy
// ============================================

/// What the decoder does with non-zero reserved control bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservedBitsPolicy {
    /// Fail with `MalformedHeader`.
    #[default]
    Reject,
    /// Mask them away.
    Ignore,
}

// ============================================
// AuxiliarySecurityHeader
// ============================================

/// Decoded auxiliary security header.
///
/// # Example
/// ```
/// use zbsec_common::ExtendedAddress;
/// use zbsec_core::protocol::{AuxiliarySecurityHeader, KeyIdentifier, ReservedBitsPolicy, SecurityLevel};
///
/// let header = AuxiliarySecurityHeader::new(
///     SecurityLevel::EncMic32,
///     KeyIdentifier::Network,
///     7,
///     Some(ExtendedAddress::new(0x0011_2233_4455_6677)),
///     Some(1),
/// ).unwrap();
///
/// let bytes = header.to_bytes();
/// assert_eq!(bytes.len(), 14);
///
/// let (decoded, used) = AuxiliarySecurityHeader::decode(&bytes, ReservedBitsPolicy::Reject).unwrap();
/// assert_eq!(used, 14);
/// assert_eq!(decoded, header);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuxiliarySecurityHeader {
    /// Security level.
    pub level: SecurityLevel,
    /// Key identifier mode.
    pub key_id: KeyIdentifier,
    /// Frame counter.
    pub frame_counter: u32,
    /// Source address; present iff the extended-nonce bit is set.
    pub source: Option<ExtendedAddress>,
    /// Key sequence number; present iff `key_id` is `Network`.
    pub key_seq: Option<u8>,
}

impl AuxiliarySecurityHeader {
    /// Builds a header, checking that optional fields match the control bits.
    ///
    /// # Errors
    /// `InvalidArgument` if a key sequence number is missing for network
    /// keys, or supplied for any other key identifier.
    pub fn new(
        level: SecurityLevel,
        key_id: KeyIdentifier,
        frame_counter: u32,
        source: Option<ExtendedAddress>,
        key_seq: Option<u8>,
    ) -> Result<Self> {
        match (key_id, key_seq) {
            (KeyIdentifier::Network, None) => {
                return Err(CoreError::invalid_argument(
                    "key_seq",
                    "network key identifier requires a key sequence number",
                ));
            }
            (id, Some(_)) if id != KeyIdentifier::Network => {
                return Err(CoreError::invalid_argument(
                    "key_seq",
                    format!("key sequence number is only carried for network keys, not {id}"),
                ));
            }
            _ => {}
        }

        Ok(Self {
            level,
            key_id,
            frame_counter,
            source,
            key_seq,
        })
    }

    /// Encodes a header from raw field values.
    ///
    /// # Errors
    /// `InvalidArgument` if `level > 7`, `key_id > 3`, or the optional
    /// fields disagree with `has_extended_nonce` / `key_id`.
    pub fn encode_fields(
        level: u8,
        key_id: u8,
        has_extended_nonce: bool,
        frame_counter: u32,
        source: Option<ExtendedAddress>,
        key_seq: Option<u8>,
    ) -> Result<Vec<u8>> {
        let level = SecurityLevel::try_from(level)?;
        let key_id = KeyIdentifier::try_from(key_id)?;
        if has_extended_nonce != source.is_some() {
            return Err(CoreError::invalid_argument(
                "source",
                "extended source must be supplied iff the extended nonce flag is set",
            ));
        }
        Ok(Self::new(level, key_id, frame_counter, source, key_seq)?.to_bytes())
    }

    /// Returns `true` if the source address is carried in the header.
    #[must_use]
    pub const fn has_extended_nonce(&self) -> bool {
        self.source.is_some()
    }

    /// Builds the security control byte (reserved bits zero).
    #[must_use]
    pub const fn control_byte(&self) -> u8 {
        let mut control = self.level.as_byte() & LEVEL_MASK;
        control |= (self.key_id.as_byte() << CONTROL_KEYID_OFFSET) & CONTROL_KEYID_MASK;
        if self.source.is_some() {
            control |= CONTROL_EXT_NONCE;
        }
        control
    }

    /// Returns a copy with the level replaced (receiver-side substitution).
    #[must_use]
    pub const fn with_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    /// Number of bytes this header occupies on the wire.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        Self::size_from_control(self.control_byte())
    }

    /// Header size implied by a control byte.
    #[must_use]
    pub const fn size_from_control(control: u8) -> usize {
        let mut size = MIN_HEADER_SIZE;
        if control & CONTROL_EXT_NONCE != 0 {
            size += 8;
        }
        if (control & CONTROL_KEYID_MASK) >> CONTROL_KEYID_OFFSET == KeyIdentifier::Network as u8 {
            size += 1;
        }
        size
    }

    /// Appends the encoded header to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(self.control_byte());
        buf.put_u32_le(self.frame_counter);
        if let Some(source) = self.source {
            buf.put_slice(&source.to_le_bytes());
        }
        if let Some(seq) = self.key_seq {
            buf.put_u8(seq);
        }
    }

    /// Encodes into a fresh vector.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(MAX_HEADER_SIZE);
        self.encode(&mut buf);
        buf.to_vec()
    }

    /// Decodes a header from the start of `buf`.
    ///
    /// # Returns
    /// The header and the number of bytes consumed.
    ///
    /// # Errors
    /// `MalformedHeader` if the buffer is shorter than the size implied by
    /// the control byte, or reserved bits are set under `Reject`.
    pub fn decode(buf: &[u8], policy: ReservedBitsPolicy) -> Result<(Self, usize)> {
        let Some(&raw_control) = buf.first() else {
            return Err(CoreError::malformed_header("empty buffer"));
        };

        let control = match policy {
            ReservedBitsPolicy::Reject if raw_control & CONTROL_RESERVED_MASK != 0 => {
                return Err(CoreError::malformed_header(format!(
                    "reserved control bits set (0x{raw_control:02x})"
                )));
            }
            ReservedBitsPolicy::Reject => raw_control,
            ReservedBitsPolicy::Ignore => raw_control & !CONTROL_RESERVED_MASK,
        };

        let size = Self::size_from_control(control);
        if buf.len() < size {
            return Err(CoreError::malformed_header(format!(
                "control 0x{control:02x} implies {size} bytes, buffer has {}",
                buf.len()
            )));
        }

        let mut cursor = &buf[1..size];
        let level = SecurityLevel::from_control_bits(control);
        let key_id = match KeyIdentifier::from_byte((control & CONTROL_KEYID_MASK) >> CONTROL_KEYID_OFFSET) {
            Some(id) => id,
            None => return Err(CoreError::malformed_header("key identifier out of range")),
        };
        let frame_counter = cursor.get_u32_le();

        let source = if control & CONTROL_EXT_NONCE != 0 {
            let mut addr = [0u8; 8];
            cursor.copy_to_slice(&mut addr);
            Some(ExtendedAddress::from_le_bytes(addr))
        } else {
            None
        };

        let key_seq = if key_id == KeyIdentifier::Network {
            Some(cursor.get_u8())
        } else {
            None
        };

        Ok((
            Self {
                level,
                key_id,
                frame_counter,
                source,
                key_seq,
            },
            size,
        ))
    }
}

// ============================================
// Tests
// ============================================
