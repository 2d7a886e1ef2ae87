// ============================================
// File: crates/zbsec-core/src/cbke/certificate.rs
// ============================================
//! # Implicit Certificates
//!
//! ## Layouts
//! ```text
//! v1 (48 bytes, suite 1)
//! ┌──────────────────┬─────────────┬────────────┬──────────┐
//! │ Public key (22)  │ Subject (8) │ Issuer (8) │ Data (10)│
//! └──────────────────┴─────────────┴────────────┴──────────┘
//!
//! v2 (74 bytes, suite 2)
//! ┌──────┬────────┬───────┬──────┬────────┬────────────┬──────────┬─────────┬───────┬─────────────────┐
//! │ Type │ Serial │ Curve │ Hash │ Issuer │ Valid from │ Valid to │ Subject │ Usage │ Public key (37) │
//! │  1   │   8    │   1   │  1   │   8    │     5      │    4     │    8    │   1   │                 │
//! └──────┴────────┴───────┴──────┴────────┴────────────┴──────────┴─────────┴───────┴─────────────────┘
//! ```
//! EUI64 fields and times are big-endian.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Parsing only checks layout; `validate_for_agreement` checks
//!   identifiers and identities. Both run before any curve arithmetic
//! - "Valid to" is a lifetime in seconds after "valid from";
//!   `0xFFFFFFFF` means no expiry

use zbsec_common::{ExtendedAddress, ZigbeeTime};

use super::suite::{
    CryptoSuite, CURVE_IDENTIFIER_SECT283K1, HASH_IDENTIFIER_AES_MMO, KEY_USAGE_AGREEMENT,
};
use crate::error::{CoreError, Result};

/// Required v2 certificate type.
pub const CERTIFICATE_V2_TYPE: u8 = 0x00;

/// "Valid to" value meaning the certificate never expires.
pub const NO_EXPIRY: u32 = u32::MAX;

/// Version 1 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateV1 {
    /// Compressed reconstruction point.
    pub public_key: [u8; 22],
    /// Owner of the certificate.
    pub subject: ExtendedAddress,
    /// Certificate authority.
    pub issuer: ExtendedAddress,
    /// Opaque profile data.
    pub data: [u8; 10],
}

/// Version 2 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateV2 {
    /// Certificate type.
    pub cert_type: u8,
    /// Serial number.
    pub serial: [u8; 8],
    /// Curve identifier.
    pub curve: u8,
    /// Hash identifier.
    pub hash: u8,
    /// Certificate authority.
    pub issuer: ExtendedAddress,
    /// Start of validity (40-bit seconds since 2000).
    pub valid_from: ZigbeeTime,
    /// Lifetime in seconds, or `NO_EXPIRY`.
    pub valid_to: u32,
    /// Owner of the certificate.
    pub subject: ExtendedAddress,
    /// Key usage bits.
    pub key_usage: u8,
    /// Compressed reconstruction point.
    pub public_key: [u8; 37],
}

/// Parsed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    /// Suite 1 certificate.
    V1(CertificateV1),
    /// Suite 2 certificate.
    V2(CertificateV2),
}

fn eui(bytes: &[u8]) -> ExtendedAddress {
    // Slices are taken at fixed offsets inside a length-checked buffer
    ExtendedAddress::from_be_slice(bytes).unwrap_or(ExtendedAddress::UNKNOWN)
}

impl Certificate {
    /// Parses a certificate for `suite`.
    ///
    /// # Errors
    /// - `CurveMismatch`: length belongs to another suite (or none)
    /// - `InvalidArgument`: `suite` has no certificates
    pub fn parse(suite: CryptoSuite, bytes: &[u8]) -> Result<Self> {
        let Some(expected) = suite.certificate_size() else {
            return Err(CoreError::invalid_argument(
                "suite",
                format!("{suite} does not use certificates"),
            ));
        };
        if bytes.len() != expected {
            let actual = CryptoSuite::from_certificate_size(bytes.len())
                .map_or_else(|| format!("{}-byte certificate", bytes.len()), |s| s.to_string());
            return Err(CoreError::CurveMismatch {
                expected: suite.to_string(),
                actual,
            });
        }

        Ok(match suite {
            CryptoSuite::Suite1 => {
                let mut public_key = [0u8; 22];
                public_key.copy_from_slice(&bytes[..22]);
                let mut data = [0u8; 10];
                data.copy_from_slice(&bytes[38..48]);
                Self::V1(CertificateV1 {
                    public_key,
                    subject: eui(&bytes[22..30]),
                    issuer: eui(&bytes[30..38]),
                    data,
                })
            }
            _ => {
                let mut serial = [0u8; 8];
                serial.copy_from_slice(&bytes[1..9]);
                let mut from = [0u8; 8];
                from[3..].copy_from_slice(&bytes[19..24]);
                let mut public_key = [0u8; 37];
                public_key.copy_from_slice(&bytes[37..74]);
                Self::V2(CertificateV2 {
                    cert_type: bytes[0],
                    serial,
                    curve: bytes[9],
                    hash: bytes[10],
                    issuer: eui(&bytes[11..19]),
                    valid_from: ZigbeeTime::from_secs(u64::from_be_bytes(from)),
                    valid_to: u32::from_be_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
                    subject: eui(&bytes[28..36]),
                    key_usage: bytes[36],
                    public_key,
                })
            }
        })
    }

    /// Suite this certificate belongs to.
    #[must_use]
    pub const fn suite(&self) -> CryptoSuite {
        match self {
            Self::V1(_) => CryptoSuite::Suite1,
            Self::V2(_) => CryptoSuite::Suite2,
        }
    }

    /// Certificate owner.
    #[must_use]
    pub const fn subject(&self) -> ExtendedAddress {
        match self {
            Self::V1(c) => c.subject,
            Self::V2(c) => c.subject,
        }
    }

    /// Certificate authority.
    #[must_use]
    pub const fn issuer(&self) -> ExtendedAddress {
        match self {
            Self::V1(c) => c.issuer,
            Self::V2(c) => c.issuer,
        }
    }

    /// Reconstruction point.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        match self {
            Self::V1(c) => &c.public_key,
            Self::V2(c) => &c.public_key,
        }
    }

    /// Checks the fixed v2 identifiers (no-op for v1).
    ///
    /// # Errors
    /// `InvalidCertificate` on a wrong type, curve or hash identifier.
    pub fn check_identifiers(&self) -> Result<()> {
        let Self::V2(c) = self else {
            return Ok(());
        };
        if c.cert_type != CERTIFICATE_V2_TYPE {
            return Err(CoreError::invalid_certificate(format!(
                "certificate type 0x{:02x}, expected 0x{CERTIFICATE_V2_TYPE:02x}",
                c.cert_type
            )));
        }
        if c.curve != CURVE_IDENTIFIER_SECT283K1 {
            return Err(CoreError::invalid_certificate(format!(
                "curve identifier 0x{:02x}, expected 0x{CURVE_IDENTIFIER_SECT283K1:02x}",
                c.curve
            )));
        }
        if c.hash != HASH_IDENTIFIER_AES_MMO {
            return Err(CoreError::invalid_certificate(format!(
                "hash identifier 0x{:02x}, expected 0x{HASH_IDENTIFIER_AES_MMO:02x}",
                c.hash
            )));
        }
        Ok(())
    }

    /// Full pre-agreement validation of a peer certificate.
    ///
    /// # Arguments
    /// * `peer` - Address the session is established with
    /// * `issuer` - Issuer of the local certificate (trusted CA)
    /// * `now` - Current UTC time; `None` skips the validity window
    ///
    /// # Errors
    /// `InvalidCertificate` if identifiers, key usage, subject or issuer
    /// do not match, or `now` is outside the validity window.
    pub fn validate_for_agreement(
        &self,
        peer: ExtendedAddress,
        issuer: ExtendedAddress,
        now: Option<ZigbeeTime>,
    ) -> Result<()> {
        self.check_identifiers()?;
        if let Self::V2(c) = self {
            if c.key_usage & KEY_USAGE_AGREEMENT == 0 {
                return Err(CoreError::invalid_certificate(format!(
                    "key usage 0x{:02x} does not allow key agreement",
                    c.key_usage
                )));
            }
        }
        if self.subject() != peer {
            return Err(CoreError::invalid_certificate(format!(
                "subject {} is not the peer {peer}",
                self.subject()
            )));
        }
        if self.issuer() != issuer {
            return Err(CoreError::invalid_certificate(format!(
                "issuer {} is not the trusted issuer {issuer}",
                self.issuer()
            )));
        }
        if let Some(now) = now {
            if !self.is_valid_at(now) {
                return Err(CoreError::invalid_certificate(format!(
                    "not valid at {} s since 2000-01-01",
                    now.as_secs()
                )));
            }
        }
        Ok(())
    }

    /// Returns `true` if the certificate is valid at `now` (v1 always is).
    #[must_use]
    pub fn is_valid_at(&self, now: ZigbeeTime) -> bool {
        match self {
            Self::V1(_) => true,
            Self::V2(c) => {
                if now < c.valid_from {
                    return false;
                }
                c.valid_to == NO_EXPIRY
                    || now.as_secs() <= c.valid_from.as_secs() + u64::from(c.valid_to)
            }
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn v2_bytes(subject: ExtendedAddress, issuer: ExtendedAddress) -> Vec<u8> {
        let mut cert = vec![CERTIFICATE_V2_TYPE];
        cert.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        cert.push(CURVE_IDENTIFIER_SECT283K1);
        cert.push(HASH_IDENTIFIER_AES_MMO);
        cert.extend_from_slice(&issuer.to_be_bytes());
        cert.extend_from_slice(&[0, 0, 0, 0x03, 0xE8]); // valid from 1000
        cert.extend_from_slice(&[0, 0, 0, 100]); // 100 s lifetime
        cert.extend_from_slice(&subject.to_be_bytes());
        cert.push(KEY_USAGE_AGREEMENT | 0x80);
        cert.extend_from_slice(&[0x02; 37]);
        cert
    }

    pub(crate) fn v1_bytes(subject: ExtendedAddress, issuer: ExtendedAddress) -> Vec<u8> {
        let mut cert = vec![0x03; 22];
        cert.extend_from_slice(&subject.to_be_bytes());
        cert.extend_from_slice(&issuer.to_be_bytes());
        cert.extend_from_slice(&[0u8; 10]);
        cert
    }

    fn subject() -> ExtendedAddress {
        ExtendedAddress::new(0x0022_A000_0000_1234)
    }

    fn issuer() -> ExtendedAddress {
        ExtendedAddress::new(0x5445_5354_5345_4341)
    }

    #[test]
    fn test_parse_v2_fields() {
        let cert = Certificate::parse(CryptoSuite::Suite2, &v2_bytes(subject(), issuer())).unwrap();
        let Certificate::V2(c) = &cert else {
            panic!("expected v2");
        };
        assert_eq!(c.subject, subject());
        assert_eq!(c.issuer, issuer());
        assert_eq!(c.valid_from.as_secs(), 1000);
        assert_eq!(c.valid_to, 100);
        assert_eq!(cert.public_key(), &[0x02; 37]);
        assert!(cert.validate_for_agreement(subject(), issuer(), None).is_ok());
    }

    #[test]
    fn test_parse_v1_fields() {
        let cert = Certificate::parse(CryptoSuite::Suite1, &v1_bytes(subject(), issuer())).unwrap();
        assert_eq!(cert.suite(), CryptoSuite::Suite1);
        assert_eq!(cert.subject(), subject());
        assert_eq!(cert.issuer(), issuer());
        assert!(cert.is_valid_at(ZigbeeTime::from_secs(0)));
    }

    #[test]
    fn test_wrong_curve_id_is_invalid_certificate() {
        let mut bytes = v2_bytes(subject(), issuer());
        bytes[9] = 0x0C;
        let cert = Certificate::parse(CryptoSuite::Suite2, &bytes).unwrap();
        assert!(matches!(
            cert.validate_for_agreement(subject(), issuer(), None),
            Err(CoreError::InvalidCertificate { .. })
        ));
    }

    #[test]
    fn test_wrong_type_hash_and_usage_rejected() {
        for (offset, value) in [(0usize, 0x01u8), (10, 0x01), (36, 0x80)] {
            let mut bytes = v2_bytes(subject(), issuer());
            bytes[offset] = value;
            let cert = Certificate::parse(CryptoSuite::Suite2, &bytes).unwrap();
            assert!(matches!(
                cert.validate_for_agreement(subject(), issuer(), None),
                Err(CoreError::InvalidCertificate { .. })
            ));
        }
    }

    #[test]
    fn test_identity_checks() {
        let cert = Certificate::parse(CryptoSuite::Suite2, &v2_bytes(subject(), issuer())).unwrap();
        assert!(cert
            .validate_for_agreement(ExtendedAddress::new(1), issuer(), None)
            .is_err());
        assert!(cert
            .validate_for_agreement(subject(), ExtendedAddress::new(1), None)
            .is_err());
    }

    #[test]
    fn test_length_mismatch_is_curve_mismatch() {
        let v1 = v1_bytes(subject(), issuer());
        assert!(matches!(
            Certificate::parse(CryptoSuite::Suite2, &v1),
            Err(CoreError::CurveMismatch { .. })
        ));
        assert!(matches!(
            Certificate::parse(CryptoSuite::Suite1, &[0u8; 50]),
            Err(CoreError::CurveMismatch { .. })
        ));
        assert!(matches!(
            Certificate::parse(CryptoSuite::Ecdhe25519, &v1),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_validity_window() {
        let cert = Certificate::parse(CryptoSuite::Suite2, &v2_bytes(subject(), issuer())).unwrap();
        assert!(!cert.is_valid_at(ZigbeeTime::from_secs(999)));
        assert!(cert.is_valid_at(ZigbeeTime::from_secs(1000)));
        assert!(cert.is_valid_at(ZigbeeTime::from_secs(1100)));
        assert!(!cert.is_valid_at(ZigbeeTime::from_secs(1101)));

        let at = |secs| cert.validate_for_agreement(subject(), issuer(), Some(ZigbeeTime::from_secs(secs)));
        assert!(at(1050).is_ok());
        assert!(matches!(at(2000), Err(CoreError::InvalidCertificate { .. })));
    }
}
