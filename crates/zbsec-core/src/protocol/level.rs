// ============================================
// File: crates/zbsec-core/src/protocol/level.rs
// ============================================
//! # Security Levels
//!
//! ## Level Table
//! ```text
//! ┌──────┬──────────────┬────────────┬──────────┐
//! │ Id   │ Name         │ Encryption │ MIC (M)  │
//! ├──────┼──────────────┼────────────┼──────────┤
//! │ 0x00 │ None         │ OFF        │ 0        │
//! │ 0x01 │ MIC-32       │ OFF        │ 4        │
//! │ 0x02 │ MIC-64       │ OFF        │ 8        │
//! │ 0x03 │ MIC-128      │ OFF        │ 16       │
//! │ 0x04 │ ENC          │ ON         │ 0        │
//! │ 0x05 │ ENC-MIC-32   │ ON         │ 4        │
//! │ 0x06 │ ENC-MIC-64   │ ON         │ 8        │
//! │ 0x07 │ ENC-MIC-128  │ ON         │ 16       │
//! └──────┴──────────────┴────────────┴──────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The MIC length only depends on the two low bits; bit 2 is encryption
//! - `None` is pass-through and must never be reported as secured

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Bit selecting encryption within a level value.
pub const LEVEL_ENC_FLAG: u8 = 0x04;

/// Mask of the level field inside the security control byte.
pub const LEVEL_MASK: u8 = 0x07;

/// Security level sub-field of the security control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum SecurityLevel {
    /// No security.
    None = 0x00,
    /// 32-bit MIC, no encryption.
    Mic32 = 0x01,
    /// 64-bit MIC, no encryption.
    Mic64 = 0x02,
    /// 128-bit MIC, no encryption.
    Mic128 = 0x03,
    /// Encryption without MIC.
    Enc = 0x04,
    /// Encryption with 32-bit MIC (Zigbee network default).
    EncMic32 = 0x05,
    /// Encryption with 64-bit MIC.
    EncMic64 = 0x06,
    /// Encryption with 128-bit MIC.
    EncMic128 = 0x07,
}

impl SecurityLevel {
    /// All levels in identifier order.
    pub const ALL: [Self; 8] = [
        Self::None,
        Self::Mic32,
        Self::Mic64,
        Self::Mic128,
        Self::Enc,
        Self::EncMic32,
        Self::EncMic64,
        Self::EncMic128,
    ];

    /// Converts a byte to a level, rejecting values above 7.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Mic32),
            0x02 => Some(Self::Mic64),
            0x03 => Some(Self::Mic128),
            0x04 => Some(Self::Enc),
            0x05 => Some(Self::EncMic32),
            0x06 => Some(Self::EncMic64),
            0x07 => Some(Self::EncMic128),
            _ => None,
        }
    }

    /// Extracts the level from the low three bits of a control byte.
    #[must_use]
    pub const fn from_control_bits(control: u8) -> Self {
        match Self::from_byte(control & LEVEL_MASK) {
            Some(level) => level,
            // Unreachable: masked to 0..=7
            None => Self::None,
        }
    }

    /// Returns the identifier value.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Returns `true` if payloads are encrypted at this level.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.as_byte() & LEVEL_ENC_FLAG != 0
    }

    /// Returns the MIC length `M` in bytes: 0, 4, 8 or 16.
    #[must_use]
    pub const fn mic_length(&self) -> usize {
        ((2u8 << (self.as_byte() & 0x03)) & !0x03) as usize
    }

    /// Returns `true` if frames at this level carry any protection.
    #[must_use]
    pub const fn is_secured(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::EncMic32
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_byte(value).ok_or_else(|| {
            CoreError::invalid_argument("security_level", format!("0x{value:02x} is not in 0..=7"))
        })
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> Self {
        level.as_byte()
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Mic32 => "MIC-32",
            Self::Mic64 => "MIC-64",
            Self::Mic128 => "MIC-128",
            Self::Enc => "ENC",
            Self::EncMic32 => "ENC-MIC-32",
            Self::EncMic64 => "ENC-MIC-64",
            Self::EncMic128 => "ENC-MIC-128",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mic_length_table() {
        let expected = [0usize, 4, 8, 16, 0, 4, 8, 16];
        for (level, m) in SecurityLevel::ALL.iter().zip(expected) {
            assert_eq!(level.mic_length(), m, "level {level}");
        }
    }

    #[test]
    fn test_encryption_bit_independent_of_mic() {
        for level in SecurityLevel::ALL {
            assert_eq!(level.is_encrypted(), level.as_byte() >= 4);
            let plain = SecurityLevel::from_byte(level.as_byte() & 0x03).unwrap();
            assert_eq!(level.mic_length(), plain.mic_length());
        }
    }

    #[test]
    fn test_try_from_rejects_out_of_range() {
        assert_eq!(SecurityLevel::try_from(5).unwrap(), SecurityLevel::EncMic32);
        assert!(matches!(
            SecurityLevel::try_from(8),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_none_is_not_secured() {
        assert!(!SecurityLevel::None.is_secured());
        assert!(SecurityLevel::Enc.is_secured());
        assert_eq!(SecurityLevel::from_control_bits(0xfd), SecurityLevel::EncMic32);
    }
}
