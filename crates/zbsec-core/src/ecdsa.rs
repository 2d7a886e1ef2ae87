// ============================================
// File: crates/zbsec-core/src/ecdsa.rs
// ============================================
//! # ECDSA Signature Validation
//!
//! ## Creation Reason
//! Signed artifacts (OTA images) carry a Koblitz-curve ECDSA signature made
//! with the key embedded in the signer's implicit certificate.
//!
//! ## Main Functionality
//! - `EcdsaBackend`: Public key reconstruction and verification capability
//! - `EcdsaValidator`: Length, signer and certificate checks, then the backend
//! - `image_digest`: AES-MMO digest of a signed artifact
//!
//! ## Signature Layout
//! ```text
//! ┌──────────────┬──────────┬──────────┐
//! │ Signer EUI64 │    r     │    s     │
//! │  8 (BE)      │ 21 / 36  │ 21 / 36  │
//! └──────────────┴──────────┴──────────┘
//!   suite 1: 50 bytes    suite 2: 80 bytes
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every length is checked before anything else; the backend never sees
//!   malformed input
//! - A signer that is not the certificate subject is `SignatureInvalid`

use std::sync::Arc;

use tracing::{debug, warn};

use zbsec_common::ExtendedAddress;

use crate::cbke::{Certificate, CryptoSuite};
use crate::crypto::mmo::{mmo_hash, MMO_DIGEST_SIZE};
use crate::error::{CoreError, Result};

/// Size of the signer EUI64 prefix.
pub const SIGNER_EUI_SIZE: usize = 8;

/// Digest size accepted by the validator.
pub const DIGEST_SIZE: usize = MMO_DIGEST_SIZE;

/// Curve operations needed for signature validation.
pub trait EcdsaBackend: Send + Sync {
    /// Reconstructs the signer public key from its implicit certificate.
    ///
    /// # Errors
    /// `SignatureInvalid` if the certificate does not yield a valid point.
    fn reconstruct_public_key(
        &self,
        suite: CryptoSuite,
        certificate: &[u8],
        ca_public_key: &[u8],
        cert_digest: &[u8; DIGEST_SIZE],
    ) -> Result<Vec<u8>>;

    /// Verifies `(r, s)` over `digest`.
    ///
    /// # Errors
    /// Backend failures only; a bad signature is `Ok(false)`.
    fn verify(
        &self,
        suite: CryptoSuite,
        public_key: &[u8],
        digest: &[u8; DIGEST_SIZE],
        r: &[u8],
        s: &[u8],
    ) -> Result<bool>;
}

/// AES-MMO digest of a signed artifact.
#[must_use]
pub fn image_digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
    mmo_hash(data)
}

/// ECDSA signature validator.
#[derive(Clone)]
pub struct EcdsaValidator {
    backend: Arc<dyn EcdsaBackend>,
}

impl std::fmt::Debug for EcdsaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaValidator").finish_non_exhaustive()
    }
}

impl EcdsaValidator {
    /// Creates a validator over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn EcdsaBackend>) -> Self {
        Self { backend }
    }

    /// Validates `signature` over `image_digest`.
    ///
    /// # Arguments
    /// * `suite` - Suite 1 or suite 2
    /// * `ca_public_key` - Certificate authority public key (22 / 37 bytes)
    /// * `certificate` - Signer certificate (48 / 74 bytes)
    /// * `signature` - Signer EUI64 ‖ r ‖ s (50 / 80 bytes)
    /// * `image_digest` - Digest of the signed data (16 bytes)
    /// * `cert_digest` - Digest of the signer certificate (16 bytes)
    ///
    /// # Errors
    /// - `InvalidArgument`: suite does not sign
    /// - `MalformedInput`: any length is wrong
    /// - `SignatureInvalid`: signer, certificate or signature check failed
    pub fn validate(
        &self,
        suite: CryptoSuite,
        ca_public_key: &[u8],
        certificate: &[u8],
        signature: &[u8],
        image_digest: &[u8],
        cert_digest: &[u8],
    ) -> Result<()> {
        let (Some(cert_size), Some(sig_size)) = (suite.certificate_size(), suite.signature_size()) else {
            return Err(CoreError::invalid_argument(
                "suite",
                format!("{suite} has no ECDSA signatures"),
            ));
        };

        check_len("ca_public_key", suite.public_key_size(), ca_public_key)?;
        check_len("certificate", cert_size, certificate)?;
        check_len("signature", sig_size, signature)?;
        let image_digest = digest("image_digest", image_digest)?;
        let cert_digest = digest("cert_digest", cert_digest)?;

        let cert = Certificate::parse(suite, certificate)?;
        let signer = ExtendedAddress::from_be_slice(&signature[..SIGNER_EUI_SIZE])
            .unwrap_or(ExtendedAddress::UNKNOWN);
        if signer != cert.subject() {
            warn!(signer = %signer, subject = %cert.subject(), "[ECDSA] Signer is not the certificate subject");
            return Err(CoreError::signature_invalid(format!(
                "signer {signer} is not the certificate subject {}",
                cert.subject()
            )));
        }
        cert.check_identifiers()
            .map_err(|e| CoreError::signature_invalid(e.to_string()))?;

        let scalar = (sig_size - SIGNER_EUI_SIZE) / 2;
        let (r, s) = signature[SIGNER_EUI_SIZE..].split_at(scalar);

        let public_key = self
            .backend
            .reconstruct_public_key(suite, certificate, ca_public_key, &cert_digest)?;
        if !self.backend.verify(suite, &public_key, &image_digest, r, s)? {
            warn!(signer = %signer, "[ECDSA] Signature does not verify");
            return Err(CoreError::signature_invalid("signature does not verify"));
        }

        debug!(signer = %signer, suite = %suite, "[ECDSA] Signature valid");
        Ok(())
    }
}

fn check_len(field: &str, expected: usize, bytes: &[u8]) -> Result<()> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(CoreError::malformed_input(field, expected, bytes.len()))
    }
}

fn digest(field: &str, bytes: &[u8]) -> Result<[u8; DIGEST_SIZE]> {
    bytes
        .try_into()
        .map_err(|_| CoreError::malformed_input(field, DIGEST_SIZE, bytes.len()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cbke::certificate::tests::{v1_bytes, v2_bytes};

    /// Accepts signatures whose r equals the first bytes of the digest.
    #[derive(Default)]
    struct MockBackend {
        calls: AtomicUsize,
    }

    impl EcdsaBackend for MockBackend {
        fn reconstruct_public_key(
            &self,
            suite: CryptoSuite,
            _certificate: &[u8],
            _ca_public_key: &[u8],
            _cert_digest: &[u8; DIGEST_SIZE],
        ) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(vec![0x02; suite.public_key_size()])
        }

        fn verify(
            &self,
            _suite: CryptoSuite,
            _public_key: &[u8],
            digest: &[u8; DIGEST_SIZE],
            r: &[u8],
            _s: &[u8],
        ) -> Result<bool> {
            Ok(r[..DIGEST_SIZE] == digest[..])
        }
    }

    fn signer() -> ExtendedAddress {
        ExtendedAddress::new(0x0022_A000_0000_1234)
    }

    fn ca() -> ExtendedAddress {
        ExtendedAddress::new(0x5445_5354_5345_4341)
    }

    fn signature(suite: CryptoSuite, eui: ExtendedAddress, digest: &[u8; DIGEST_SIZE]) -> Vec<u8> {
        let size = suite.signature_size().unwrap();
        let mut sig = eui.to_be_bytes().to_vec();
        sig.extend_from_slice(digest);
        sig.resize(size, 0x5A);
        sig
    }

    fn validator() -> (Arc<MockBackend>, EcdsaValidator) {
        let backend = Arc::new(MockBackend::default());
        (backend.clone(), EcdsaValidator::new(backend))
    }

    #[test]
    fn test_valid_suite2_signature() {
        let (_, validator) = validator();
        let digest = image_digest(b"ota image body");
        let cert = v2_bytes(signer(), ca());
        let sig = signature(CryptoSuite::Suite2, signer(), &digest);
        validator
            .validate(CryptoSuite::Suite2, &[0x02; 37], &cert, &sig, &digest, &[0u8; 16])
            .unwrap();
    }

    #[test]
    fn test_valid_suite1_signature() {
        let (_, validator) = validator();
        let digest = image_digest(b"firmware");
        let cert = v1_bytes(signer(), ca());
        let sig = signature(CryptoSuite::Suite1, signer(), &digest);
        assert_eq!(sig.len(), 50);
        validator
            .validate(CryptoSuite::Suite1, &[0x02; 22], &cert, &sig, &digest, &[0u8; 16])
            .unwrap();
    }

    #[test]
    fn test_short_signature_is_malformed_before_backend() {
        let (backend, validator) = validator();
        let digest = image_digest(b"x");
        let cert = v2_bytes(signer(), ca());
        let mut sig = signature(CryptoSuite::Suite2, signer(), &digest);
        sig.pop();

        let err = validator
            .validate(CryptoSuite::Suite2, &[0x02; 37], &cert, &sig, &digest, &[0u8; 16])
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::MalformedInput { expected: 80, actual: 79, .. }
        ));
        assert_eq!(backend.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_bad_lengths_rejected() {
        let (_, validator) = validator();
        let digest = image_digest(b"x");
        let cert = v2_bytes(signer(), ca());
        let sig = signature(CryptoSuite::Suite2, signer(), &digest);

        for (ca_key, cert, img) in [
            (&[0x02; 22][..], &cert[..], &digest[..]),
            (&[0x02; 37][..], &cert[..48], &digest[..]),
            (&[0x02; 37][..], &cert[..], &digest[..15]),
        ] {
            assert!(matches!(
                validator.validate(CryptoSuite::Suite2, ca_key, cert, &sig, img, &[0u8; 16]),
                Err(CoreError::MalformedInput { .. })
            ));
        }
    }

    #[test]
    fn test_signer_must_be_subject() {
        let (backend, validator) = validator();
        let digest = image_digest(b"x");
        let cert = v2_bytes(signer(), ca());
        let sig = signature(CryptoSuite::Suite2, ExtendedAddress::new(1), &digest);

        assert!(matches!(
            validator.validate(CryptoSuite::Suite2, &[0x02; 37], &cert, &sig, &digest, &[0u8; 16]),
            Err(CoreError::SignatureInvalid { .. })
        ));
        assert_eq!(backend.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_wrong_curve_identifier_is_invalid() {
        let (_, validator) = validator();
        let digest = image_digest(b"x");
        let mut cert = v2_bytes(signer(), ca());
        cert[9] = 0x0C;
        let sig = signature(CryptoSuite::Suite2, signer(), &digest);

        assert!(matches!(
            validator.validate(CryptoSuite::Suite2, &[0x02; 37], &cert, &sig, &digest, &[0u8; 16]),
            Err(CoreError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn test_tampered_image_fails_verification() {
        let (_, validator) = validator();
        let digest = image_digest(b"original");
        let cert = v2_bytes(signer(), ca());
        let sig = signature(CryptoSuite::Suite2, signer(), &digest);
        let other = image_digest(b"tampered");

        assert!(matches!(
            validator.validate(CryptoSuite::Suite2, &[0x02; 37], &cert, &sig, &other, &[0u8; 16]),
            Err(CoreError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn test_ecdhe_suite_rejected() {
        let (_, validator) = validator();
        assert!(matches!(
            validator.validate(CryptoSuite::Ecdhe25519, &[], &[], &[], &[0; 16], &[0; 16]),
            Err(CoreError::InvalidArgument { .. })
        ));
    }
}
