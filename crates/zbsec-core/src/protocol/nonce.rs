// ============================================
// File: crates/zbsec-core/src/protocol/nonce.rs
// ============================================
//! # CCM* Nonce
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────┬──────────────────────┬─────────────┐
//! │ Source address (8, LE)   │ Frame counter (4, LE)│ Control (1) │
//! └──────────────────────────┴──────────────────────┴─────────────┘
//! ```
//!
//! The control byte is taken after level substitution, so sender and
//! receiver build identical nonces even though the wire level is zero.

use std::fmt;

use zbsec_common::ExtendedAddress;

use super::header::AuxiliarySecurityHeader;
use super::NONCE_LENGTH;

/// 13-byte CCM* nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LENGTH]);

impl Nonce {
    /// Builds a nonce from its three components.
    #[must_use]
    pub fn new(source: ExtendedAddress, frame_counter: u32, control: u8) -> Self {
        let mut bytes = [0u8; NONCE_LENGTH];
        bytes[..8].copy_from_slice(&source.to_le_bytes());
        bytes[8..12].copy_from_slice(&frame_counter.to_le_bytes());
        bytes[12] = control;
        Self(bytes)
    }

    /// Builds the nonce for a header whose level has already been substituted.
    ///
    /// `source` is used when the header does not carry one (extended nonce
    /// bit clear).
    #[must_use]
    pub fn for_header(header: &AuxiliarySecurityHeader, source: ExtendedAddress) -> Self {
        Self::new(
            header.source.unwrap_or(source),
            header.frame_counter,
            header.control_byte(),
        )
    }

    /// Wraps raw nonce bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; NONCE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NONCE_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{KeyIdentifier, SecurityLevel};

    #[test]
    fn test_nonce_layout() {
        let nonce = Nonce::new(ExtendedAddress::new(0x0102_0304_0506_0708), 0xA1B2_C3D4, 0x2d);
        assert_eq!(
            nonce.as_bytes(),
            &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0xD4, 0xC3, 0xB2, 0xA1, 0x2d]
        );
    }

    #[test]
    fn test_header_source_wins_over_fallback() {
        let carried = ExtendedAddress::new(0x11);
        let fallback = ExtendedAddress::new(0x22);

        let header = AuxiliarySecurityHeader::new(
            SecurityLevel::EncMic32,
            KeyIdentifier::Link,
            1,
            Some(carried),
            None,
        )
        .unwrap();
        assert_eq!(Nonce::for_header(&header, fallback), Nonce::new(carried, 1, 0x25));

        let header =
            AuxiliarySecurityHeader::new(SecurityLevel::EncMic32, KeyIdentifier::Link, 1, None, None)
                .unwrap();
        assert_eq!(Nonce::for_header(&header, fallback), Nonce::new(fallback, 1, 0x05));
    }

    #[test]
    fn test_level_changes_nonce() {
        let addr = ExtendedAddress::new(1);
        let wire = AuxiliarySecurityHeader::new(SecurityLevel::None, KeyIdentifier::Link, 3, Some(addr), None)
            .unwrap();
        let substituted = wire.with_level(SecurityLevel::EncMic32);
        assert_ne!(Nonce::for_header(&wire, addr), Nonce::for_header(&substituted, addr));
    }
}
