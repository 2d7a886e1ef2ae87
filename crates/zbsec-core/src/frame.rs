// ============================================
// File: crates/zbsec-core/src/frame.rs
// ============================================
//! # Frame Security Pipeline
//!
//! ## Creation Reason
//! Ties the header codec, key store, frame counters and CCM* together into
//! the two operations a NWK or APS layer needs: secure an outgoing frame
//! and unsecure an incoming one.
//!
//! ## Main Functionality
//! - `FrameSecurity::secure`: Resolve key, issue counter, protect, emit
//! - `FrameSecurity::unsecure`: Decode, substitute level, check freshness,
//!   authenticate, commit counter
//! - `FrameSecurityConfig`: Local address, network level, reserved-bits policy
//!
//! ## Wire Layout
//! ```text
//! ┌──────────────┬────────────┬─────────────────────┬──────────┐
//! │ Frame header │ Aux header │ Payload / ciphertext│ MIC (M)  │
//! └──────────────┴────────────┴─────────────────────┴──────────┘
//!  ◄──────── authenticated (a) ─────►◄──── m ───────►
//! ```
//! The aux header level field is sent as zero; both sides authenticate it
//! with the configured level substituted.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Counters are committed only after authentication succeeds
//! - No plaintext is returned or logged on failure
//!
//! ## Last Modified
//! v0.1.0 - Initial pipeline

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use zbsec_common::ExtendedAddress;

use crate::counter::{CounterVerdict, FrameCounterTracker};
use crate::crypto::{CcmStarCrypto, EncryptType, FrameCrypto};
use crate::error::{CoreError, Result};
use crate::events::{SecurityEvent, SecurityEvents};
use crate::keystore::{KeyIdentity, KeyRef, KeySelector, KeyStore, ResolvedKey};
use crate::protocol::{AuxiliarySecurityHeader, KeyIdentifier, Nonce, ReservedBitsPolicy, SecurityLevel};

// ============================================
// Configuration
// ============================================

/// Pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSecurityConfig {
    /// This device's extended address (sent in the extended nonce).
    pub local_address: ExtendedAddress,
    /// Network security level substituted into every header.
    pub security_level: SecurityLevel,
    /// Handling of reserved control bits on receive.
    pub reserved_bits: ReservedBitsPolicy,
}

impl Default for FrameSecurityConfig {
    fn default() -> Self {
        Self {
            local_address: ExtendedAddress::UNKNOWN,
            security_level: SecurityLevel::EncMic32,
            reserved_bits: ReservedBitsPolicy::Reject,
        }
    }
}

impl FrameSecurityConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    /// `InvalidArgument` if the level does not secure frames or the local
    /// address is unset.
    pub fn validate(&self) -> Result<()> {
        if !self.security_level.is_secured() {
            return Err(CoreError::invalid_argument(
                "security_level",
                "frame security requires a level with a MIC or encryption",
            ));
        }
        if self.local_address == ExtendedAddress::UNKNOWN {
            return Err(CoreError::invalid_argument(
                "local_address",
                "local extended address is not set",
            ));
        }
        Ok(())
    }
}

/// Options for [`FrameSecurity::unsecure_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnsecureOptions {
    /// Sender address when the header carries none.
    pub source: Option<ExtendedAddress>,
    /// Caller asserts the sender legitimately restarted its counter.
    pub counter_reset: bool,
    /// Overrides the key identifier from the header.
    pub selector: Option<KeySelector>,
}

/// Result of a successful unsecure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsecuredFrame {
    /// Aux header with the level substituted.
    pub header: AuxiliarySecurityHeader,
    /// Decrypted (or authenticated) payload.
    pub payload: Vec<u8>,
    /// Key class that secured the frame.
    pub encrypt_type: EncryptType,
    /// Key installation used.
    pub key: KeyRef,
    /// Sending device.
    pub source: ExtendedAddress,
    /// Offset of the payload in the original frame.
    pub payload_offset: usize,
}

// ============================================
// FrameSecurity
// ============================================

/// Secures and unsecures frames.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use zbsec_common::ExtendedAddress;
/// use zbsec_core::crypto::Key;
/// use zbsec_core::frame::{FrameSecurity, FrameSecurityConfig};
/// use zbsec_core::keystore::{KeySelector, KeyStore};
///
/// let keys = Arc::new(KeyStore::new());
/// keys.install_network_key(0, Key::from_bytes([0xAB; 16]));
///
/// let a = ExtendedAddress::new(0xA);
/// let config = FrameSecurityConfig { local_address: a, ..Default::default() };
/// let sender = FrameSecurity::new(config, keys.clone()).unwrap();
///
/// let b = FrameSecurity::new(
///     FrameSecurityConfig { local_address: ExtendedAddress::new(0xB), ..Default::default() },
///     keys,
/// ).unwrap();
///
/// let frame = sender.secure(&[0x08, 0x02], KeySelector::Network, None, b"hello").unwrap();
/// let out = b.unsecure(&frame, 2, None).unwrap();
/// assert_eq!(out.payload, b"hello");
/// assert_eq!(out.source, a);
/// ```
pub struct FrameSecurity {
    config: FrameSecurityConfig,
    keys: Arc<KeyStore>,
    counters: Arc<FrameCounterTracker>,
    crypto: Arc<dyn FrameCrypto>,
    events: Arc<SecurityEvents>,
}

impl std::fmt::Debug for FrameSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSecurity")
            .field("config", &self.config)
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl FrameSecurity {
    /// Creates a pipeline with software CCM* and a fresh counter tracker.
    ///
    /// Events are published to the key store's event bus.
    ///
    /// # Errors
    /// `InvalidArgument` if `config` is invalid.
    pub fn new(config: FrameSecurityConfig, keys: Arc<KeyStore>) -> Result<Self> {
        config.validate()?;
        let events = keys.events().clone();
        Ok(Self {
            config,
            keys,
            counters: Arc::new(FrameCounterTracker::new()),
            crypto: Arc::new(CcmStarCrypto),
            events,
        })
    }

    /// Replaces the CCM* engine.
    #[must_use]
    pub fn with_crypto(mut self, crypto: Arc<dyn FrameCrypto>) -> Self {
        self.crypto = crypto;
        self
    }

    /// Shares an existing counter tracker.
    #[must_use]
    pub fn with_counters(mut self, counters: Arc<FrameCounterTracker>) -> Self {
        self.counters = counters;
        self
    }

    /// Pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &FrameSecurityConfig {
        &self.config
    }

    /// Key store in use.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// Counter tracker in use.
    #[must_use]
    pub fn counters(&self) -> &Arc<FrameCounterTracker> {
        &self.counters
    }

    /// Drops counters that belong to replaced or removed keys.
    pub fn prune_counters(&self) {
        self.counters.prune(|key| self.keys.is_current(key));
    }

    // ========================================
    // Outgoing
    // ========================================

    /// Secures an outgoing frame.
    ///
    /// # Arguments
    /// * `frame_header` - NWK / APS header preceding the aux header
    /// * `selector` - Key to use; `BothLinkNetwork` prefers the link key
    /// * `peer` - Destination for link-class keys
    /// * `payload` - Plaintext payload
    ///
    /// # Returns
    /// `frame_header ‖ aux header ‖ body ‖ MIC`
    ///
    /// # Errors
    /// - `KeyNotFound`: no key for the selector
    /// - `CountersExhausted`: the key must be replaced
    /// - `InvalidArgument`: CCM* limits exceeded
    pub fn secure(
        &self,
        frame_header: &[u8],
        selector: KeySelector,
        peer: Option<ExtendedAddress>,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let resolved = self
            .keys
            .resolve_candidates(selector, peer, None)?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::key_not_found(format!("{selector:?}")))?;
        let key_ref = resolved.key_ref();

        let counter = match self.counters.next_outbound(key_ref) {
            Ok(counter) => counter,
            Err(e) => {
                self.events.publish(&SecurityEvent::CountersExhausted { key: key_ref });
                return Err(e);
            }
        };

        let key_seq = match (resolved.usage(), key_ref.identity) {
            (KeyIdentifier::Network, KeyIdentity::Network(seq)) => Some(seq),
            _ => None,
        };
        let header = AuxiliarySecurityHeader::new(
            self.config.security_level,
            resolved.usage(),
            counter,
            Some(self.config.local_address),
            key_seq,
        )?;

        let nonce = Nonce::for_header(&header, self.config.local_address);
        let aad = Self::associated_data(frame_header, &header);
        let protected = self.crypto.protect(
            resolved.key(),
            &nonce,
            header.level,
            &aad,
            payload,
        )?;

        let wire_header = header.with_level(SecurityLevel::None).to_bytes();
        let mut frame = Vec::with_capacity(
            frame_header.len() + wire_header.len() + protected.body.len() + protected.mic.len(),
        );
        frame.extend_from_slice(frame_header);
        frame.extend_from_slice(&wire_header);
        frame.extend_from_slice(&protected.into_wire());

        trace!(
            key = %key_ref,
            counter,
            len = frame.len(),
            "[FRAME] Frame secured"
        );
        Ok(frame)
    }

    // ========================================
    // Incoming
    // ========================================

    /// Unsecures an incoming frame.
    ///
    /// # Arguments
    /// * `frame` - Whole frame as received
    /// * `aux_offset` - Offset of the aux header
    /// * `source` - Sender address when the header carries none
    ///
    /// # Errors
    /// See [`Self::unsecure_with`].
    pub fn unsecure(
        &self,
        frame: &[u8],
        aux_offset: usize,
        source: Option<ExtendedAddress>,
    ) -> Result<UnsecuredFrame> {
        self.unsecure_with(
            frame,
            aux_offset,
            UnsecureOptions {
                source,
                ..UnsecureOptions::default()
            },
        )
    }

    /// Unsecures an incoming frame with explicit options.
    ///
    /// # Errors
    /// - `MalformedHeader` / `MalformedInput`: frame too short
    /// - `InvalidArgument`: sender address unknown
    /// - `KeyNotFound`: no candidate key
    /// - `Replay`: counter not fresh for any candidate
    /// - `AuthenticationFailed`: a candidate with a fresh counter was tried
    ///   and none authenticated the frame
    pub fn unsecure_with(
        &self,
        frame: &[u8],
        aux_offset: usize,
        options: UnsecureOptions,
    ) -> Result<UnsecuredFrame> {
        let Some(aux) = frame.get(aux_offset..) else {
            return Err(CoreError::malformed_header(format!(
                "aux header offset {aux_offset} beyond frame of {} bytes",
                frame.len()
            )));
        };
        let (wire_header, used) = AuxiliarySecurityHeader::decode(aux, self.config.reserved_bits)?;
        let header = wire_header.with_level(self.config.security_level);

        let payload_offset = aux_offset + used;
        let mic_len = header.level.mic_length();
        if frame.len() < payload_offset + mic_len {
            return Err(CoreError::malformed_input(
                "frame",
                payload_offset + mic_len,
                frame.len(),
            ));
        }
        let source = header.source.or(options.source).ok_or_else(|| {
            CoreError::invalid_argument("source", "header carries no source and none was supplied")
        })?;

        let selector = options.selector.unwrap_or_else(|| header.key_id.into());
        let candidates = self.keys.resolve_candidates(selector, Some(source), header.key_seq)?;

        let (body, mic) = frame[payload_offset..].split_at(frame.len() - payload_offset - mic_len);
        let aad = Self::associated_data(&frame[..aux_offset], &header);
        let nonce = Nonce::for_header(&header, source);

        let mut replay: Option<CoreError> = None;
        let mut authenticated_any = false;
        for candidate in &candidates {
            let key_ref = candidate.key_ref();
            if let CounterVerdict::Replay { last_accepted } =
                self.counters
                    .check_inbound(key_ref, source, header.frame_counter, options.counter_reset)
            {
                self.report_replay(key_ref, source, header.frame_counter, last_accepted);
                replay = Some(CoreError::replay(header.frame_counter, last_accepted));
                continue;
            }

            authenticated_any = true;
            let Ok(payload) = self
                .crypto
                .unprotect(candidate.key(), &nonce, header.level, &aad, body, mic)
            else {
                trace!(key = %key_ref, "[FRAME] Candidate key did not authenticate");
                continue;
            };

            self.commit(candidate, source, &header, options.counter_reset)?;
            return Ok(UnsecuredFrame {
                header,
                payload,
                encrypt_type: candidate.encrypt_type(),
                key: key_ref,
                source,
                payload_offset,
            });
        }

        // Stale counters on every candidate: nothing was authenticated
        if let (Some(replay), false) = (replay, authenticated_any) {
            return Err(replay);
        }
        warn!(source = %source, counter = header.frame_counter, "[FRAME] Authentication failed");
        self.events
            .publish(&SecurityEvent::AuthenticationFailed { source });
        Err(CoreError::AuthenticationFailed)
    }

    // ========================================
    // Internal
    // ========================================

    fn associated_data(frame_header: &[u8], header: &AuxiliarySecurityHeader) -> Vec<u8> {
        let mut aad = Vec::with_capacity(frame_header.len() + header.encoded_len());
        aad.extend_from_slice(frame_header);
        aad.extend_from_slice(&header.to_bytes());
        aad
    }

    fn commit(
        &self,
        candidate: &ResolvedKey,
        source: ExtendedAddress,
        header: &AuxiliarySecurityHeader,
        reset: bool,
    ) -> Result<()> {
        let key = candidate.key_ref();
        let counter = header.frame_counter;
        match self.counters.accept_inbound(key, source, counter, reset) {
            CounterVerdict::Accept => {
                trace!(key = %key, source = %source, counter, "[FRAME] Frame unsecured");
                Ok(())
            }
            CounterVerdict::AcceptReset => {
                debug!(key = %key, source = %source, counter, "[FRAME] Frame accepted after counter reset");
                self.events
                    .publish(&SecurityEvent::FrameCounterReset { key, source, counter });
                Ok(())
            }
            // Another frame with a higher counter was committed concurrently
            CounterVerdict::Replay { last_accepted } => {
                self.report_replay(key, source, counter, last_accepted);
                Err(CoreError::replay(counter, last_accepted))
            }
        }
    }

    fn report_replay(&self, key: KeyRef, source: ExtendedAddress, received: u32, last_accepted: u32) {
        warn!(
            key = %key,
            source = %source,
            received,
            last_accepted,
            "[FRAME] Replayed frame counter"
        );
        self.events.publish(&SecurityEvent::ReplayRejected {
            key,
            source,
            received,
            last_accepted,
        });
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Key, KeyType};
    use crate::events::tests::RecordingListener;

    const NWK_HEADER: [u8; 8] = [0x08, 0x12, 0xFC, 0xFF, 0x00, 0x00, 0x1E, 0x9B];

    fn addr_a() -> ExtendedAddress {
        ExtendedAddress::new(0x0022_A000_0000_000A)
    }

    fn addr_b() -> ExtendedAddress {
        ExtendedAddress::new(0x0022_A000_0000_000B)
    }

    fn node(local: ExtendedAddress, keys: &Arc<KeyStore>) -> FrameSecurity {
        FrameSecurity::new(
            FrameSecurityConfig {
                local_address: local,
                ..FrameSecurityConfig::default()
            },
            keys.clone(),
        )
        .unwrap()
    }

    fn network_keys() -> Arc<KeyStore> {
        let keys = Arc::new(KeyStore::new());
        keys.install_network_key(3, Key::from_bytes([0x5A; 16]));
        keys
    }

    #[test]
    fn test_network_round_trip() {
        let keys = network_keys();
        let a = node(addr_a(), &keys);
        let b = node(addr_b(), &keys);

        let frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"payload").unwrap();
        assert_eq!(&frame[..NWK_HEADER.len()], &NWK_HEADER);
        // Level zeroed on the wire, extended nonce and network key id set
        assert_eq!(frame[NWK_HEADER.len()], 0x28);
        assert_eq!(frame.len(), NWK_HEADER.len() + 14 + 7 + 4);

        let out = b.unsecure(&frame, NWK_HEADER.len(), None).unwrap();
        assert_eq!(out.payload, b"payload");
        assert_eq!(out.source, addr_a());
        assert_eq!(out.encrypt_type, EncryptType::StandardNetwork);
        assert_eq!(out.header.key_seq, Some(3));
        assert_eq!(out.header.level, SecurityLevel::EncMic32);
        assert_eq!(out.payload_offset, NWK_HEADER.len() + 14);
    }

    #[test]
    fn test_replay_rejected_and_reported() {
        let keys = network_keys();
        let recorder = Arc::new(RecordingListener::default());
        keys.events().subscribe(recorder.clone());
        let a = node(addr_a(), &keys);
        let b = node(addr_b(), &keys);

        let frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"x").unwrap();
        b.unsecure(&frame, NWK_HEADER.len(), None).unwrap();
        let err = b.unsecure(&frame, NWK_HEADER.len(), None).unwrap_err();
        assert!(matches!(err, CoreError::Replay { received: 0, last_accepted: 0 }));
        assert!(recorder
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, SecurityEvent::ReplayRejected { .. })));
    }

    #[test]
    fn test_tampered_frame_does_not_advance_counter() {
        let keys = network_keys();
        let a = node(addr_a(), &keys);
        let b = node(addr_b(), &keys);

        let frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"abc").unwrap();
        let mut bad = frame.clone();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;

        assert!(matches!(
            b.unsecure(&bad, NWK_HEADER.len(), None),
            Err(CoreError::AuthenticationFailed)
        ));
        let key = keys.active_network_key().unwrap().key_ref();
        assert_eq!(b.counters().last_inbound(&key, addr_a()), None);
        assert!(b.unsecure(&frame, NWK_HEADER.len(), None).is_ok());
    }

    #[test]
    fn test_tampered_header_fails_authentication() {
        let keys = network_keys();
        let a = node(addr_a(), &keys);
        let b = node(addr_b(), &keys);

        let mut frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"abc").unwrap();
        frame[0] ^= 0x80;
        assert!(matches!(
            b.unsecure(&frame, NWK_HEADER.len(), None),
            Err(CoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_counter_reset_accepted_with_event() {
        let keys = network_keys();
        let recorder = Arc::new(RecordingListener::default());
        keys.events().subscribe(recorder.clone());
        let b = node(addr_b(), &keys);
        let key = keys.active_network_key().unwrap().key_ref();

        // Sender rebooted: its restored tracker starts at 10 after we saw 1000
        b.counters().accept_inbound(key, addr_a(), 1000, false);
        let a = node(addr_a(), &keys);
        a.counters().restore_outbound(key, 10);
        let frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"r").unwrap();

        assert!(matches!(
            b.unsecure(&frame, NWK_HEADER.len(), None),
            Err(CoreError::Replay { received: 10, last_accepted: 1000 })
        ));
        let out = b
            .unsecure_with(
                &frame,
                NWK_HEADER.len(),
                UnsecureOptions {
                    counter_reset: true,
                    ..UnsecureOptions::default()
                },
            )
            .unwrap();
        assert_eq!(out.header.frame_counter, 10);
        assert!(recorder
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, SecurityEvent::FrameCounterReset { counter: 10, .. })));
    }

    #[test]
    fn test_link_key_frame_reports_link_class() {
        let keys = Arc::new(KeyStore::new());
        let key = Key::from_bytes([0x11; 16]);
        keys.install_link_key(addr_b(), KeyType::TcLink, key.clone()).unwrap();
        let a = node(addr_a(), &keys);

        let peer_keys = Arc::new(KeyStore::new());
        peer_keys.install_link_key(addr_a(), KeyType::TcLink, key).unwrap();
        let b = node(addr_b(), &peer_keys);

        let frame = a.secure(&[0x21, 0x05], KeySelector::Link, Some(addr_b()), b"aps").unwrap();
        let out = b.unsecure(&frame, 2, None).unwrap();
        assert_eq!(out.payload, b"aps");
        assert_eq!(out.encrypt_type, EncryptType::TcLink);
    }

    #[test]
    fn test_both_link_network_falls_back_to_network() {
        let keys = network_keys();
        let a = node(addr_a(), &keys);
        let b = node(addr_b(), &keys);

        // No link key anywhere: the network key secures and unsecures
        let frame = a
            .secure(&NWK_HEADER, KeySelector::BothLinkNetwork, Some(addr_b()), b"both")
            .unwrap();
        let out = b
            .unsecure_with(
                &frame,
                NWK_HEADER.len(),
                UnsecureOptions {
                    selector: Some(KeySelector::BothLinkNetwork),
                    ..UnsecureOptions::default()
                },
            )
            .unwrap();
        assert_eq!(out.payload, b"both");
        assert_eq!(out.encrypt_type, EncryptType::StandardNetwork);
    }

    #[test]
    fn test_both_link_network_replay_is_not_auth_failure() {
        let keys = network_keys();
        let link = Key::from_bytes([0x33; 16]);
        keys.install_link_key(addr_a(), KeyType::TcLink, link.clone()).unwrap();
        keys.install_link_key(addr_b(), KeyType::TcLink, link).unwrap();
        let recorder = Arc::new(RecordingListener::default());
        keys.events().subscribe(recorder.clone());
        let a = node(addr_a(), &keys);
        let b = node(addr_b(), &keys);
        let both = UnsecureOptions {
            selector: Some(KeySelector::BothLinkNetwork),
            ..UnsecureOptions::default()
        };

        let link_frame = a
            .secure(&NWK_HEADER, KeySelector::BothLinkNetwork, Some(addr_b()), b"link")
            .unwrap();
        let out = b.unsecure_with(&link_frame, NWK_HEADER.len(), both).unwrap();
        assert_eq!(out.encrypt_type, EncryptType::TcLink);

        let nwk_frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"nwk").unwrap();
        b.unsecure(&nwk_frame, NWK_HEADER.len(), None).unwrap();

        // Both candidates have now seen counter 0 from a
        let err = b.unsecure_with(&link_frame, NWK_HEADER.len(), both).unwrap_err();
        assert!(matches!(err, CoreError::Replay { received: 0, last_accepted: 0 }));

        let events = recorder.events.lock();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SecurityEvent::ReplayRejected { .. }))
                .count(),
            2
        );
        assert!(!events
            .iter()
            .any(|e| matches!(e, SecurityEvent::AuthenticationFailed { .. })));
    }

    #[test]
    fn test_replaced_key_retires_counters() {
        let keys = network_keys();
        let a = node(addr_a(), &keys);
        let b = node(addr_b(), &keys);

        let frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"1").unwrap();
        b.unsecure(&frame, NWK_HEADER.len(), None).unwrap();
        assert_eq!(b.counters().inbound_len(), 1);

        keys.install_network_key(3, Key::from_bytes([0x6B; 16]));
        b.prune_counters();
        assert_eq!(b.counters().inbound_len(), 0);

        // New generation starts a fresh outgoing sequence
        let frame = a.secure(&NWK_HEADER, KeySelector::Network, None, b"2").unwrap();
        let out = b.unsecure(&frame, NWK_HEADER.len(), None).unwrap();
        assert_eq!(out.header.frame_counter, 0);
    }

    #[test]
    fn test_short_frames_rejected() {
        let keys = network_keys();
        let b = node(addr_b(), &keys);
        assert!(matches!(
            b.unsecure(&NWK_HEADER, 20, None),
            Err(CoreError::MalformedHeader { .. })
        ));
        assert!(matches!(
            b.unsecure(&[0x28, 0, 0], 0, None),
            Err(CoreError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_missing_source_rejected() {
        let keys = network_keys();
        let b = node(addr_b(), &keys);
        // Control 0x08: network key id, no extended nonce
        let frame = [0x08, 1, 0, 0, 0, 3, 0xAA, 0, 0, 0, 0];
        assert!(matches!(
            b.unsecure(&frame, 0, None),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let keys = network_keys();
        assert!(FrameSecurity::new(FrameSecurityConfig::default(), keys.clone()).is_err());
        let config = FrameSecurityConfig {
            local_address: addr_a(),
            security_level: SecurityLevel::None,
            ..FrameSecurityConfig::default()
        };
        assert!(FrameSecurity::new(config, keys).is_err());
    }

    #[test]
    fn test_config_serde() {
        let config: FrameSecurityConfig = serde_json::from_str(
            r#"{"local_address":"00:22:a0:00:00:00:00:0a","security_level":"enc-mic64"}"#,
        )
        .unwrap();
        assert_eq!(config.local_address, addr_a());
        assert_eq!(config.security_level, SecurityLevel::EncMic64);
        assert_eq!(config.reserved_bits, ReservedBitsPolicy::Reject);
    }
}
