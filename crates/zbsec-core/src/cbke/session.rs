// ============================================
// File: crates/zbsec-core/src/cbke/session.rs
// ============================================
//! # Key Establishment Session
//!
//! ## Creation Reason
//! Drives one CBKE (or Curve25519 ECDHE) exchange with a single peer, from
//! ephemeral key generation to a confirmed application link key.
//!
//! ## Main Functionality
//! - `CbkeSession`: Per-peer state machine
//! - `CbkeCredentials`: Local static private key, CA key and certificate
//! - `CbkeConfig`: Phase timeouts (0 selects the suite default)
//!
//! ## State Machine
//! ```text
//! Idle ──generate──► KeysGenerated ──peer cert ok──► CertificateExchanged
//!                                                           │
//!                                                     shared secret
//!                                                           ▼
//!         Confirmed ◄──MAC match── SharedSecretDerived
//!
//! any failure or timeout ──► Aborted
//! ```
//! ECDHE sessions carry no certificate but still pass through
//! `CertificateExchanged` once the peer ephemeral key is accepted.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Confirmed` and `Aborted` are terminal; there is no retry
//! - All peer input is validated before the agreement backend is called
//! - Private material is dropped (and zeroized) on entry to a terminal state
//! - A wrong-state call returns `InvalidState` without aborting
//!
//! ## Last Modified
//! v0.1.0 - Initial CBKE session

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use zbsec_common::{Clock, Deadline, ExtendedAddress, SystemClock, ZigbeeTime};

use super::agreement::{AgreementInput, KeyAgreement, KeyPair};
use super::certificate::Certificate;
use super::suite::{CryptoSuite, ECDHE_SESSION_ID_SIZE};
use crate::crypto::kdf::{derive_session_keys, initiator_mac, responder_mac, SessionKeys};
use crate::crypto::{Key, KeyType};
use crate::error::{CoreError, Result};
use crate::events::{SecurityEvent, SecurityEvents};
use crate::keystore::{KeyRef, KeyStore};

/// Confirmation MAC size.
pub const CONFIRMATION_MAC_SIZE: usize = 16;

// ============================================
// CbkeState / CbkeRole
// ============================================

/// Key establishment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CbkeState {
    /// Nothing done yet.
    Idle,
    /// Local ephemeral key pair generated.
    KeysGenerated,
    /// Peer certificate and ephemeral key accepted.
    CertificateExchanged,
    /// Shared secret and session keys derived.
    SharedSecretDerived,
    /// Peer confirmation verified (terminal).
    Confirmed,
    /// Session failed or timed out (terminal).
    Aborted,
}

impl CbkeState {
    /// Returns `true` for `Confirmed` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Aborted)
    }
}

impl fmt::Display for CbkeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::KeysGenerated => "keys-generated",
            Self::CertificateExchanged => "certificate-exchanged",
            Self::SharedSecretDerived => "shared-secret-derived",
            Self::Confirmed => "confirmed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Side of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CbkeRole {
    /// Device that started the exchange (U).
    Initiator,
    /// Device that answered (V).
    Responder,
}

// ============================================
// CbkeConfig
// ============================================

/// Phase timeouts in seconds; 0 selects the suite default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CbkeConfig {
    /// Budget from key generation until the shared secret is derived.
    pub ephemeral_time_secs: u8,
    /// Budget from shared secret derivation until confirmation.
    pub confirm_time_secs: u8,
}

impl CbkeConfig {
    /// Effective ephemeral phase budget for `suite`.
    #[must_use]
    pub fn ephemeral_time(&self, suite: CryptoSuite) -> Duration {
        match self.ephemeral_time_secs {
            0 => suite.default_ephemeral_time(),
            secs => Duration::from_secs(u64::from(secs)),
        }
    }

    /// Effective confirmation phase budget for `suite`.
    #[must_use]
    pub fn confirm_time(&self, suite: CryptoSuite) -> Duration {
        match self.confirm_time_secs {
            0 => suite.default_confirm_time(),
            secs => Duration::from_secs(u64::from(secs)),
        }
    }
}

// ============================================
// CbkeCredentials
// ============================================

/// Long-term material for certificate-based suites.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CbkeCredentials {
    static_private: Vec<u8>,
    #[zeroize(skip)]
    ca_public_key: Vec<u8>,
    #[zeroize(skip)]
    certificate: Certificate,
}

impl CbkeCredentials {
    /// Checks and wraps the local credentials.
    ///
    /// # Errors
    /// - `MalformedInput`: private key or CA key has the wrong length
    /// - `CurveMismatch` / `InvalidArgument`: certificate does not fit `suite`
    /// - `InvalidCertificate`: certificate identifiers are wrong
    pub fn new(
        suite: CryptoSuite,
        static_private: Vec<u8>,
        ca_public_key: Vec<u8>,
        certificate: &[u8],
    ) -> Result<Self> {
        if static_private.len() != suite.private_key_size() {
            return Err(CoreError::malformed_input(
                "static_private_key",
                suite.private_key_size(),
                static_private.len(),
            ));
        }
        if ca_public_key.len() != suite.public_key_size() {
            return Err(CoreError::malformed_input(
                "ca_public_key",
                suite.public_key_size(),
                ca_public_key.len(),
            ));
        }
        let certificate = Certificate::parse(suite, certificate)?;
        certificate.check_identifiers()?;
        Ok(Self {
            static_private,
            ca_public_key,
            certificate,
        })
    }

    /// Local certificate.
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Certificate authority public key.
    #[must_use]
    pub fn ca_public_key(&self) -> &[u8] {
        &self.ca_public_key
    }
}

impl fmt::Debug for CbkeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbkeCredentials")
            .field("subject", &self.certificate.subject())
            .field("issuer", &self.certificate.issuer())
            .field("static_private", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

// ============================================
// CbkeSession
// ============================================

/// One key establishment exchange with one peer.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use zbsec_common::ExtendedAddress;
/// use zbsec_core::cbke::{CbkeConfig, CbkeRole, CbkeSession, X25519Agreement};
///
/// let u = ExtendedAddress::new(1);
/// let v = ExtendedAddress::new(2);
/// let backend = Arc::new(X25519Agreement::new());
///
/// let mut init = CbkeSession::new(CbkeRole::Initiator, u, v, backend.clone(), None, CbkeConfig::default()).unwrap();
/// let mut resp = CbkeSession::new(CbkeRole::Responder, v, u, backend, None, CbkeConfig::default()).unwrap();
///
/// let qeu = init.generate_ephemeral_keys().unwrap().to_vec();
/// let qev = resp.generate_ephemeral_keys().unwrap().to_vec();
/// init.derive_shared_secret(None, &qev).unwrap();
/// resp.derive_shared_secret(None, &qeu).unwrap();
///
/// let macu = init.local_confirmation().unwrap();
/// let macv = resp.local_confirmation().unwrap();
/// let k1 = resp.confirm(&macu).unwrap();
/// let k2 = init.confirm(&macv).unwrap();
/// assert_eq!(k1, k2);
/// ```
pub struct CbkeSession {
    suite: CryptoSuite,
    role: CbkeRole,
    local: ExtendedAddress,
    peer: ExtendedAddress,
    agreement: Arc<dyn KeyAgreement>,
    clock: Arc<dyn Clock>,
    certificate_time: Option<ZigbeeTime>,
    events: Option<Arc<SecurityEvents>>,
    config: CbkeConfig,
    credentials: Option<CbkeCredentials>,
    state: CbkeState,
    ephemeral: Option<KeyPair>,
    peer_ephemeral: Option<Vec<u8>>,
    session_keys: Option<SessionKeys>,
    deadline: Option<Deadline>,
}

impl CbkeSession {
    /// Creates an idle session.
    ///
    /// # Arguments
    /// * `role` - Initiator (U) or responder (V)
    /// * `local` / `peer` - Extended addresses of both ends
    /// * `agreement` - Curve backend; its suite selects the exchange
    /// * `credentials` - Required for certificate suites, absent for ECDHE
    /// * `config` - Phase timeouts
    ///
    /// # Errors
    /// `InvalidArgument` if credentials do not match the suite or the local
    /// certificate belongs to another device.
    pub fn new(
        role: CbkeRole,
        local: ExtendedAddress,
        peer: ExtendedAddress,
        agreement: Arc<dyn KeyAgreement>,
        credentials: Option<CbkeCredentials>,
        config: CbkeConfig,
    ) -> Result<Self> {
        let suite = agreement.suite();
        match (&credentials, suite.uses_certificates()) {
            (None, true) => {
                return Err(CoreError::invalid_argument(
                    "credentials",
                    format!("{suite} requires local credentials"),
                ))
            }
            (Some(_), false) => {
                return Err(CoreError::invalid_argument(
                    "credentials",
                    format!("{suite} does not use certificates"),
                ))
            }
            (Some(creds), true) => {
                if creds.certificate.suite() != suite {
                    return Err(CoreError::invalid_argument(
                        "credentials",
                        format!("certificate belongs to {}", creds.certificate.suite()),
                    ));
                }
                if creds.certificate.subject() != local {
                    return Err(CoreError::invalid_argument(
                        "credentials",
                        "local certificate subject is not this device",
                    ));
                }
            }
            (None, false) => {}
        }
        if local == peer {
            return Err(CoreError::invalid_argument("peer", "peer is the local device"));
        }

        Ok(Self {
            suite,
            role,
            local,
            peer,
            agreement,
            clock: Arc::new(SystemClock),
            certificate_time: None,
            events: None,
            config,
            credentials,
            state: CbkeState::Idle,
            ephemeral: None,
            peer_ephemeral: None,
            session_keys: None,
            deadline: None,
        })
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Checks peer certificates against the validity window at `now`.
    /// Without it the window is not checked.
    #[must_use]
    pub fn with_certificate_time(mut self, now: ZigbeeTime) -> Self {
        self.certificate_time = Some(now);
        self
    }

    /// Publishes state changes to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<SecurityEvents>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CbkeState {
        self.state
    }

    /// Suite in use.
    #[must_use]
    pub const fn suite(&self) -> CryptoSuite {
        self.suite
    }

    /// Role of this device.
    #[must_use]
    pub const fn role(&self) -> CbkeRole {
        self.role
    }

    /// Remote device.
    #[must_use]
    pub const fn peer(&self) -> ExtendedAddress {
        self.peer
    }

    /// Time left in the current phase, `None` outside a timed phase.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.remaining(self.clock.now()))
    }

    // ========================================
    // Operations
    // ========================================

    /// Generates the local ephemeral key pair and starts the ephemeral timer.
    ///
    /// # Returns
    /// The ephemeral public key to send to the peer.
    ///
    /// # Errors
    /// - `InvalidState` unless `Idle`
    /// - `KeyAgreement` if the backend fails (session aborts)
    pub fn generate_ephemeral_keys(&mut self) -> Result<&[u8]> {
        self.require(CbkeState::Idle, "generate_ephemeral_keys")?;

        let pair = match self.agreement.generate_ephemeral() {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail(e)),
        };
        if pair.private_key().len() != self.suite.private_key_size()
            || pair.public_key().len() != self.suite.public_key_size()
        {
            return Err(self.fail(CoreError::KeyAgreement {
                reason: format!("backend produced keys of the wrong size for {}", self.suite),
            }));
        }

        self.deadline = Some(Deadline::start(
            self.clock.now(),
            self.config.ephemeral_time(self.suite),
        ));
        self.ephemeral = Some(pair);
        self.transition(CbkeState::KeysGenerated);

        Ok(self
            .ephemeral
            .as_ref()
            .map_or(&[][..], KeyPair::public_key))
    }

    /// Accepts the peer material and derives the session keys.
    ///
    /// Every length, certificate identifier, subject and issuer check runs
    /// before the agreement backend is called.
    ///
    /// # Arguments
    /// * `peer_certificate` - Peer certificate (certificate suites only)
    /// * `peer_ephemeral` - Peer ephemeral public key
    ///
    /// # Errors
    /// - `InvalidState` unless `KeysGenerated`
    /// - `Aborted` if the ephemeral phase timed out
    /// - `MalformedInput`, `CurveMismatch`, `InvalidCertificate`,
    ///   `KeyAgreement` (session aborts)
    pub fn derive_shared_secret(
        &mut self,
        peer_certificate: Option<&[u8]>,
        peer_ephemeral: &[u8],
    ) -> Result<()> {
        self.check_timeout()?;
        self.require(CbkeState::KeysGenerated, "derive_shared_secret")?;

        if let Err(e) = self.accept_peer_material(peer_certificate, peer_ephemeral) {
            return Err(self.fail(e));
        }
        self.peer_ephemeral = Some(peer_ephemeral.to_vec());
        self.transition(CbkeState::CertificateExchanged);

        let secret = {
            let Some(local_ephemeral) = self.ephemeral.as_ref() else {
                return Err(self.fail(CoreError::aborted("ephemeral key missing")));
            };
            let input = AgreementInput {
                local_ephemeral,
                local_static_private: self.credentials.as_ref().map(|c| &c.static_private[..]),
                ca_public_key: self.credentials.as_ref().map(|c| &c.ca_public_key[..]),
                peer_certificate,
                peer_ephemeral_public: peer_ephemeral,
            };
            self.agreement.shared_secret(&input)
        };
        let secret = match secret {
            Ok(secret) => secret,
            Err(e) => return Err(self.fail(e)),
        };

        self.session_keys = Some(derive_session_keys(secret.as_bytes()));
        self.deadline = Some(Deadline::start(
            self.clock.now(),
            self.config.confirm_time(self.suite),
        ));
        self.transition(CbkeState::SharedSecretDerived);
        Ok(())
    }

    /// Confirmation MAC this device sends (MACU for the initiator, MACV
    /// for the responder).
    ///
    /// # Errors
    /// - `InvalidState` unless `SharedSecretDerived`
    /// - `Aborted` if the confirmation phase timed out
    pub fn local_confirmation(&mut self) -> Result<[u8; CONFIRMATION_MAC_SIZE]> {
        self.check_timeout()?;
        self.require(CbkeState::SharedSecretDerived, "local_confirmation")?;
        let (keys, transcript) = self.transcript()?;
        Ok(match self.role {
            CbkeRole::Initiator => initiator_mac(&keys.mac_key, transcript.u, transcript.v, transcript.qeu, transcript.qev),
            CbkeRole::Responder => responder_mac(&keys.mac_key, transcript.u, transcript.v, transcript.qeu, transcript.qev),
        })
    }

    /// Verifies the peer confirmation MAC and finishes the session.
    ///
    /// # Returns
    /// KeyData, the new application link key.
    ///
    /// # Errors
    /// - `InvalidState` unless `SharedSecretDerived`
    /// - `Aborted` if the confirmation phase timed out
    /// - `ConfirmationFailed` on a MAC mismatch (session aborts)
    pub fn confirm(&mut self, peer_mac: &[u8]) -> Result<Key> {
        self.check_timeout()?;
        self.require(CbkeState::SharedSecretDerived, "confirm")?;

        let (keys, transcript) = self.transcript()?;
        let expected = match self.role {
            CbkeRole::Initiator => responder_mac(&keys.mac_key, transcript.u, transcript.v, transcript.qeu, transcript.qev),
            CbkeRole::Responder => initiator_mac(&keys.mac_key, transcript.u, transcript.v, transcript.qeu, transcript.qev),
        };
        let matches = peer_mac.len() == CONFIRMATION_MAC_SIZE && bool::from(expected.ct_eq(peer_mac));
        let key_data = keys.key_data.clone();

        if !matches {
            warn!(peer = %self.peer, "[CBKE] Peer confirmation MAC mismatch");
            return Err(self.fail(CoreError::ConfirmationFailed));
        }

        self.enter_terminal(CbkeState::Confirmed);
        info!(peer = %self.peer, suite = %self.suite, "[CBKE] Key establishment confirmed");
        Ok(key_data)
    }

    /// Confirms and installs KeyData as the peer's application link key.
    ///
    /// # Errors
    /// As [`Self::confirm`]; nothing is installed on failure.
    pub fn confirm_and_install(&mut self, store: &KeyStore, peer_mac: &[u8]) -> Result<KeyRef> {
        let key = self.confirm(peer_mac)?;
        store.install_link_key(self.peer, KeyType::AppLink, key)
    }

    /// 80-byte ECDHE session identifier `U ‖ V ‖ QEU ‖ QEV`.
    ///
    /// `None` for certificate suites or before both ephemeral keys are known.
    #[must_use]
    pub fn session_id(&self) -> Option<[u8; ECDHE_SESSION_ID_SIZE]> {
        if self.suite != CryptoSuite::Ecdhe25519 {
            return None;
        }
        let local = self.ephemeral.as_ref()?.public_key();
        let peer = self.peer_ephemeral.as_deref()?;
        let (u, v, qeu, qev) = match self.role {
            CbkeRole::Initiator => (self.local, self.peer, local, peer),
            CbkeRole::Responder => (self.peer, self.local, peer, local),
        };

        let mut id = [0u8; ECDHE_SESSION_ID_SIZE];
        id[..8].copy_from_slice(&u.to_be_bytes());
        id[8..16].copy_from_slice(&v.to_be_bytes());
        id[16..48].copy_from_slice(qeu);
        id[48..].copy_from_slice(qev);
        Some(id)
    }

    /// Aborts the session if the current phase has timed out.
    ///
    /// # Returns
    /// The state after the check.
    pub fn poll(&mut self) -> CbkeState {
        let _ = self.check_timeout();
        self.state
    }

    /// Aborts the session.
    pub fn abort(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        debug!(peer = %self.peer, reason, "[CBKE] Session aborted");
        self.enter_terminal(CbkeState::Aborted);
    }

    // ========================================
    // Internal
    // ========================================

    fn require(&self, required: CbkeState, operation: &str) -> Result<()> {
        if self.state == CbkeState::Aborted {
            return Err(CoreError::aborted(format!("{operation} on an aborted session")));
        }
        if self.state != required {
            return Err(CoreError::invalid_state(operation, required.to_string()));
        }
        Ok(())
    }

    fn check_timeout(&mut self) -> Result<()> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };
        if self.state.is_terminal() || !deadline.is_expired(self.clock.now()) {
            return Ok(());
        }
        let phase = if self.state == CbkeState::SharedSecretDerived {
            "confirmation"
        } else {
            "ephemeral key exchange"
        };
        warn!(peer = %self.peer, phase, budget_secs = deadline.budget().as_secs(), "[CBKE] Phase timed out");
        self.enter_terminal(CbkeState::Aborted);
        Err(CoreError::aborted(format!("{phase} timed out")))
    }

    fn accept_peer_material(&self, peer_certificate: Option<&[u8]>, peer_ephemeral: &[u8]) -> Result<()> {
        if peer_ephemeral.len() != self.suite.public_key_size() {
            return Err(CoreError::malformed_input(
                "peer_ephemeral_public_key",
                self.suite.public_key_size(),
                peer_ephemeral.len(),
            ));
        }
        match (peer_certificate, self.credentials.as_ref()) {
            (Some(bytes), Some(creds)) => {
                let cert = Certificate::parse(self.suite, bytes)?;
                cert.validate_for_agreement(self.peer, creds.certificate.issuer(), self.certificate_time)?;
                debug!(peer = %self.peer, suite = %self.suite, "[CBKE] Peer certificate accepted");
                Ok(())
            }
            (None, Some(_)) => Err(CoreError::invalid_argument(
                "peer_certificate",
                format!("{} requires a peer certificate", self.suite),
            )),
            (Some(_), None) => Err(CoreError::invalid_argument(
                "peer_certificate",
                format!("{} does not use certificates", self.suite),
            )),
            (None, None) => Ok(()),
        }
    }

    fn transcript(&self) -> Result<(&SessionKeys, Transcript<'_>)> {
        let (Some(keys), Some(local), Some(peer)) = (
            self.session_keys.as_ref(),
            self.ephemeral.as_ref(),
            self.peer_ephemeral.as_deref(),
        ) else {
            return Err(CoreError::invalid_state("confirmation", "shared-secret-derived"));
        };
        let transcript = match self.role {
            CbkeRole::Initiator => Transcript {
                u: self.local,
                v: self.peer,
                qeu: local.public_key(),
                qev: peer,
            },
            CbkeRole::Responder => Transcript {
                u: self.peer,
                v: self.local,
                qeu: peer,
                qev: local.public_key(),
            },
        };
        Ok((keys, transcript))
    }

    fn fail(&mut self, error: CoreError) -> CoreError {
        warn!(peer = %self.peer, error = %error, "[CBKE] Session failed");
        self.enter_terminal(CbkeState::Aborted);
        error
    }

    fn enter_terminal(&mut self, state: CbkeState) {
        self.ephemeral = None;
        self.session_keys = None;
        self.credentials = None;
        self.deadline = None;
        self.transition(state);
    }

    fn transition(&mut self, to: CbkeState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(peer = %self.peer, %from, %to, "[CBKE] State change");
        if let Some(events) = &self.events {
            events.publish(&SecurityEvent::CbkeStateChanged {
                peer: self.peer,
                from,
                to,
            });
        }
    }
}

impl fmt::Debug for CbkeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbkeSession")
            .field("suite", &self.suite)
            .field("role", &self.role)
            .field("local", &self.local)
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Identities and ephemeral keys in U/V order.
struct Transcript<'a> {
    u: ExtendedAddress,
    v: ExtendedAddress,
    qeu: &'a [u8],
    qev: &'a [u8],
}

// ============================================
// Tests
// ============================================
