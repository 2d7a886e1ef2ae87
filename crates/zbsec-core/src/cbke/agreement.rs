// ============================================
// File: crates/zbsec-core/src/cbke/agreement.rs
// ============================================
//! # Key Agreement Capability
//!
//! ## Creation Reason
//! CBKE needs elliptic-curve key generation and shared-secret derivation.
//! The Koblitz-curve suites (ECMQV over sect163k1 / sect283k1) come from an
//! external engine; Curve25519 ECDHE is provided here by `x25519-dalek`.
//!
//! ## Main Functionality
//! - `KeyPair`: Ephemeral private scalar and public key (zeroized on drop)
//! - `SharedSecret`: Agreement output `Z` (zeroized on drop)
//! - `AgreementInput`: Everything a backend may need to compute `Z`
//! - `KeyAgreement`: Backend trait
//! - `X25519Agreement`: Curve25519 backend
//!
//! ## ⚠️ Important Note for Next Developer
//! - Backends receive only pre-validated input: lengths, certificate
//!   identifiers, subject and issuer are checked by the session first
//! - Never log scalars or shared secrets

use std::fmt;

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::suite::CryptoSuite;
use crate::error::{CoreError, Result};

// ============================================
// KeyPair / SharedSecret
// ============================================

/// Private scalar with its public key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    private: Vec<u8>,
    #[zeroize(skip)]
    public: Vec<u8>,
}

impl KeyPair {
    /// Wraps backend-produced key material.
    #[must_use]
    pub fn from_parts(private: Vec<u8>, public: Vec<u8>) -> Self {
        Self { private, public }
    }

    /// Private scalar.
    ///
    /// # Security Warning
    /// Do not log or persist the returned bytes.
    #[must_use]
    pub fn private_key(&self) -> &[u8] {
        &self.private
    }

    /// Public key as sent to the peer.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(&self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// Shared secret `Z`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wraps backend output.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

// ============================================
// KeyAgreement Trait
// ============================================

/// Input to shared-secret derivation.
#[derive(Debug, Clone, Copy)]
pub struct AgreementInput<'a> {
    /// Local ephemeral key pair.
    pub local_ephemeral: &'a KeyPair,
    /// Local static private key (certificate suites only).
    pub local_static_private: Option<&'a [u8]>,
    /// Certificate authority public key (certificate suites only).
    pub ca_public_key: Option<&'a [u8]>,
    /// Validated peer certificate (certificate suites only).
    pub peer_certificate: Option<&'a [u8]>,
    /// Peer ephemeral public key.
    pub peer_ephemeral_public: &'a [u8],
}

/// Elliptic-curve capability used by key establishment.
pub trait KeyAgreement: Send + Sync {
    /// Suite this backend implements.
    fn suite(&self) -> CryptoSuite;

    /// Generates an ephemeral key pair.
    ///
    /// # Errors
    /// `KeyAgreement` if the backend cannot produce a key.
    fn generate_ephemeral(&self) -> Result<KeyPair>;

    /// Derives the shared secret.
    ///
    /// # Errors
    /// `KeyAgreement` on invalid points or backend failure.
    fn shared_secret(&self, input: &AgreementInput<'_>) -> Result<SharedSecret>;
}

// ============================================
// X25519Agreement
// ============================================

/// Curve25519 ECDHE backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct X25519Agreement;

impl X25519Agreement {
    /// Creates a new instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn array32(field: &str, bytes: &[u8]) -> Result<[u8; 32]> {
        bytes
            .try_into()
            .map_err(|_| CoreError::malformed_input(field, 32, bytes.len()))
    }
}

impl KeyAgreement for X25519Agreement {
    fn suite(&self) -> CryptoSuite {
        CryptoSuite::Ecdhe25519
    }

    fn generate_ephemeral(&self) -> Result<KeyPair> {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Ok(KeyPair::from_parts(
            secret.to_bytes().to_vec(),
            public.as_bytes().to_vec(),
        ))
    }

    fn shared_secret(&self, input: &AgreementInput<'_>) -> Result<SharedSecret> {
        let mut private = Self::array32("private_key", input.local_ephemeral.private_key())?;
        let peer = Self::array32("peer_public_key", input.peer_ephemeral_public)?;

        let secret = StaticSecret::from(private);
        private.zeroize();
        let shared = secret.diffie_hellman(&X25519PublicKey::from(peer));

        if !shared.was_contributory() {
            return Err(CoreError::KeyAgreement {
                reason: "peer public key is a low-order point".into(),
            });
        }
        Ok(SharedSecret::from_bytes(shared.as_bytes().to_vec()))
    }
}

// ============================================
// Tests
// ============================================
