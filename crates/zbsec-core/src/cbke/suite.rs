// ============================================
// File: crates/zbsec-core/src/cbke/suite.rs
// ============================================
//! # Crypto Suites
//!
//! ## Sizes
//! ```text
//! ┌────────────┬───────────┬─────────┬────────┬─────────┬───────────┐
//! │ Suite      │ Curve     │ Private │ Public │ Cert    │ Signature │
//! ├────────────┼───────────┼─────────┼────────┼─────────┼───────────┤
//! │ Suite1     │ sect163k1 │ 21      │ 22     │ 48 (v1) │ 50        │
//! │ Suite2     │ sect283k1 │ 36      │ 37     │ 74 (v2) │ 80        │
//! │ Ecdhe25519 │ X25519    │ 32      │ 32     │ -       │ -         │
//! └────────────┴───────────┴─────────┴────────┴─────────┴───────────┘
//! ```
//! Public keys are point-compressed; signatures are `EUI64 ‖ r ‖ s`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Curve identifier carried in v2 certificates.
pub const CURVE_IDENTIFIER_SECT283K1: u8 = 0x0D;

/// Hash identifier carried in v2 certificates.
pub const HASH_IDENTIFIER_AES_MMO: u8 = 0x08;

/// Key usage bit: key agreement.
pub const KEY_USAGE_AGREEMENT: u8 = 0x08;

/// Key usage bit: digital signature.
pub const KEY_USAGE_SIGNATURE: u8 = 0x80;

/// ECDHE session identifier size: both public keys and both EUI64s.
pub const ECDHE_SESSION_ID_SIZE: usize = 80;

/// Key establishment / signature suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CryptoSuite {
    /// sect163k1 with v1 certificates.
    Suite1,
    /// sect283k1 with v2 certificates.
    Suite2,
    /// Curve25519 ephemeral Diffie-Hellman, no certificates.
    Ecdhe25519,
}

impl CryptoSuite {
    /// Private scalar size.
    #[must_use]
    pub const fn private_key_size(&self) -> usize {
        match self {
            Self::Suite1 => 21,
            Self::Suite2 => 36,
            Self::Ecdhe25519 => 32,
        }
    }

    /// Public key size (compressed for the Koblitz suites).
    #[must_use]
    pub const fn public_key_size(&self) -> usize {
        match self {
            Self::Suite1 => 22,
            Self::Suite2 => 37,
            Self::Ecdhe25519 => 32,
        }
    }

    /// Certificate size, `None` when the suite has no certificates.
    #[must_use]
    pub const fn certificate_size(&self) -> Option<usize> {
        match self {
            Self::Suite1 => Some(48),
            Self::Suite2 => Some(74),
            Self::Ecdhe25519 => None,
        }
    }

    /// ECDSA signature size, `None` when the suite does not sign.
    #[must_use]
    pub const fn signature_size(&self) -> Option<usize> {
        match self {
            Self::Suite1 => Some(50),
            Self::Suite2 => Some(80),
            Self::Ecdhe25519 => None,
        }
    }

    /// Returns `true` if peers exchange certificates.
    #[must_use]
    pub const fn uses_certificates(&self) -> bool {
        self.certificate_size().is_some()
    }

    /// Budget for the ephemeral key exchange phase.
    #[must_use]
    pub const fn default_ephemeral_time(&self) -> Duration {
        match self {
            Self::Suite2 => Duration::from_secs(20),
            Self::Suite1 | Self::Ecdhe25519 => Duration::from_secs(10),
        }
    }

    /// Budget for the confirmation phase.
    #[must_use]
    pub const fn default_confirm_time(&self) -> Duration {
        match self {
            Self::Suite2 => Duration::from_secs(20),
            Self::Suite1 | Self::Ecdhe25519 => Duration::from_secs(10),
        }
    }

    /// Finds the certificate-based suite with the given certificate size.
    #[must_use]
    pub const fn from_certificate_size(size: usize) -> Option<Self> {
        match size {
            48 => Some(Self::Suite1),
            74 => Some(Self::Suite2),
            _ => None,
        }
    }
}

impl fmt::Display for CryptoSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Suite1 => "suite-1 (sect163k1)",
            Self::Suite2 => "suite-2 (sect283k1)",
            Self::Ecdhe25519 => "ecdhe-25519",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_sizes() {
        assert_eq!(CryptoSuite::Suite1.private_key_size() + 1, CryptoSuite::Suite1.public_key_size());
        assert_eq!(CryptoSuite::Suite2.private_key_size() + 1, CryptoSuite::Suite2.public_key_size());
        // Signature = EUI64 + r + s
        assert_eq!(CryptoSuite::Suite1.signature_size(), Some(8 + 2 * 21));
        assert_eq!(CryptoSuite::Suite2.signature_size(), Some(8 + 2 * 36));
        assert_eq!(
            ECDHE_SESSION_ID_SIZE,
            2 * CryptoSuite::Ecdhe25519.public_key_size() + 16
        );
    }

    #[test]
    fn test_certificate_size_lookup() {
        assert_eq!(CryptoSuite::from_certificate_size(48), Some(CryptoSuite::Suite1));
        assert_eq!(CryptoSuite::from_certificate_size(74), Some(CryptoSuite::Suite2));
        assert_eq!(CryptoSuite::from_certificate_size(32), None);
        assert!(!CryptoSuite::Ecdhe25519.uses_certificates());
    }
}
