// ============================================
// File: crates/zbsec-core/src/keystore/store.rs
// ============================================
//! # Key Store
//!
//! ## Creation Reason
//! Holds every installed key and resolves frame key references to key
//! material, for both the inbound and outbound paths.
//!
//! ## Concurrency
//! - `parking_lot::RwLock` over the key table: many concurrent resolves,
//!   one installer at a time
//! - Records are handed out as `Arc<KeyRecord>` snapshots, so a resolve
//!   never observes a half-written key
//! - Events are published after the write lock is released
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every install bumps the generation, even for identical key bytes
//! - The first network key installed becomes the active one
//!
//! ## Last Modified
//! v0.1.0 - Initial key store

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace};

use zbsec_common::ExtendedAddress;

use super::install_code::derive_link_key;
use super::{KeyIdentity, KeyRef, KeySelector};
use crate::crypto::mmo::{key_load_key, transport_key};
use crate::crypto::{EncryptType, Key, KeyType};
use crate::error::{CoreError, Result};
use crate::events::{SecurityEvent, SecurityEvents};
use crate::protocol::KeyIdentifier;

// ============================================
// KeyRecord
// ============================================

/// An installed key.
#[derive(Debug)]
pub struct KeyRecord {
    key: Key,
    key_type: KeyType,
    key_ref: KeyRef,
}

impl KeyRecord {
    /// Key material.
    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }

    /// Role of the key.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Slot and generation.
    #[must_use]
    pub const fn key_ref(&self) -> KeyRef {
        self.key_ref
    }

    /// Key class reported for frames secured with this record.
    #[must_use]
    pub const fn encrypt_type(&self) -> EncryptType {
        match self.key_ref.identity {
            KeyIdentity::GlobalTcLink => EncryptType::GlobalTcLink,
            _ => self.key_type.encrypt_type(),
        }
    }
}

// ============================================
// ResolvedKey
// ============================================

/// Result of key resolution: the effective key and where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    record: Arc<KeyRecord>,
    key: Key,
    usage: KeyIdentifier,
}

impl ResolvedKey {
    fn direct(record: Arc<KeyRecord>, usage: KeyIdentifier) -> Self {
        let key = record.key.clone();
        Self { record, key, usage }
    }

    /// Key to run CCM* with (hashed for transport/key-load usage).
    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }

    /// Installed record this key derives from.
    #[must_use]
    pub fn record(&self) -> &Arc<KeyRecord> {
        &self.record
    }

    /// Counter key reference.
    #[must_use]
    pub fn key_ref(&self) -> KeyRef {
        self.record.key_ref
    }

    /// Key identifier to place in the aux header.
    #[must_use]
    pub const fn usage(&self) -> KeyIdentifier {
        self.usage
    }

    /// Key class reported to the caller.
    #[must_use]
    pub fn encrypt_type(&self) -> EncryptType {
        self.record.encrypt_type()
    }
}

// ============================================
// KeyStore
// ============================================

#[derive(Debug, Default)]
struct KeyTable {
    network: HashMap<u8, Arc<KeyRecord>>,
    active_network: Option<u8>,
    links: HashMap<ExtendedAddress, Arc<KeyRecord>>,
    global_tc_link: Option<Arc<KeyRecord>>,
    last_generation: u64,
}

impl KeyTable {
    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    fn get(&self, identity: KeyIdentity) -> Option<&Arc<KeyRecord>> {
        match identity {
            KeyIdentity::Network(seq) => self.network.get(&seq),
            KeyIdentity::Link(peer) => self.links.get(&peer),
            KeyIdentity::GlobalTcLink => self.global_tc_link.as_ref(),
        }
    }

    fn replace(&mut self, record: Arc<KeyRecord>) -> Option<Arc<KeyRecord>> {
        match record.key_ref.identity {
            KeyIdentity::Network(seq) => self.network.insert(seq, record),
            KeyIdentity::Link(peer) => self.links.insert(peer, record),
            KeyIdentity::GlobalTcLink => self.global_tc_link.replace(record),
        }
    }
}

/// Thread-safe key store.
///
/// # Example
/// ```
/// use zbsec_common::ExtendedAddress;
/// use zbsec_core::crypto::{Key, KeyType};
/// use zbsec_core::keystore::KeyStore;
/// use zbsec_core::protocol::KeyIdentifier;
///
/// let store = KeyStore::new();
/// store.install_network_key(0, Key::generate());
///
/// let peer = ExtendedAddress::new(0x0011_2233_4455_6677);
/// store.install_link_key(peer, KeyType::TcLink, Key::generate()).unwrap();
///
/// let resolved = store.resolve(KeyIdentifier::Transport, Some(peer), None).unwrap();
/// assert_eq!(resolved.usage(), KeyIdentifier::Transport);
/// ```
#[derive(Debug)]
pub struct KeyStore {
    table: RwLock<KeyTable>,
    events: Arc<SecurityEvents>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore {
    /// Creates an empty store with its own event registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_events(Arc::new(SecurityEvents::new()))
    }

    /// Creates an empty store publishing to `events`.
    #[must_use]
    pub fn with_events(events: Arc<SecurityEvents>) -> Self {
        Self {
            table: RwLock::new(KeyTable::default()),
            events,
        }
    }

    /// Event registry this store publishes to.
    #[must_use]
    pub fn events(&self) -> &Arc<SecurityEvents> {
        &self.events
    }

    // ========================================
    // Installation
    // ========================================

    /// Installs a key.
    ///
    /// # Arguments
    /// * `key_type` - Role of the key
    /// * `peer` - Peer address, required for link-class types
    /// * `key_seq` - Sequence number, required for network keys
    /// * `key` - Key material
    ///
    /// # Errors
    /// `InvalidArgument` if the identity fields do not match the key type.
    pub fn install(
        &self,
        key_type: KeyType,
        peer: Option<ExtendedAddress>,
        key_seq: Option<u8>,
        key: Key,
    ) -> Result<KeyRef> {
        let identity = match (key_type.is_network(), peer, key_seq) {
            (true, None, Some(seq)) => KeyIdentity::Network(seq),
            (true, _, None) => {
                return Err(CoreError::invalid_argument(
                    "key_seq",
                    "network keys require a sequence number",
                ))
            }
            (true, Some(_), Some(_)) => {
                return Err(CoreError::invalid_argument(
                    "peer",
                    "network keys are not bound to a peer",
                ))
            }
            (false, Some(peer), None) => KeyIdentity::Link(peer),
            (false, None, _) => {
                return Err(CoreError::invalid_argument(
                    "peer",
                    format!("{key_type} keys require a peer address"),
                ))
            }
            (false, Some(_), Some(_)) => {
                return Err(CoreError::invalid_argument(
                    "key_seq",
                    "link keys have no sequence number",
                ))
            }
        };
        Ok(self.insert(identity, key_type, key))
    }

    /// Installs a network key under `key_seq`.
    pub fn install_network_key(&self, key_seq: u8, key: Key) -> KeyRef {
        self.insert(KeyIdentity::Network(key_seq), KeyType::StandardNetwork, key)
    }

    /// Installs a link-class key shared with `peer`.
    ///
    /// # Errors
    /// `InvalidArgument` if `key_type` is the network type.
    pub fn install_link_key(&self, peer: ExtendedAddress, key_type: KeyType, key: Key) -> Result<KeyRef> {
        self.install(key_type, Some(peer), None, key)
    }

    /// Installs the preconfigured global trust center link key.
    pub fn set_preconfigured_tc_link_key(&self, key: Key) -> KeyRef {
        self.insert(KeyIdentity::GlobalTcLink, KeyType::TcLink, key)
    }

    /// Validates an install code and installs the derived TC link key.
    ///
    /// # Errors
    /// `InvalidInstallCode` if the code fails length or CRC checks; nothing
    /// is installed in that case.
    pub fn install_by_install_code(&self, peer: ExtendedAddress, install_code: &[u8]) -> Result<KeyRef> {
        let key = derive_link_key(install_code)?;
        debug!(peer = %peer, "[KEYSTORE] Install code accepted");
        Ok(self.insert(KeyIdentity::Link(peer), KeyType::TcLink, key))
    }

    fn insert(&self, identity: KeyIdentity, key_type: KeyType, key: Key) -> KeyRef {
        let (key_ref, replaced, became_active) = {
            let mut table = self.table.write();
            // Generation order must match installation order
            let key_ref = KeyRef {
                identity,
                generation: table.next_generation(),
            };
            let record = Arc::new(KeyRecord {
                key,
                key_type,
                key_ref,
            });
            let replaced = table.replace(record).map(|old| old.key_ref);
            let became_active = match identity {
                KeyIdentity::Network(seq) if table.active_network.is_none() => {
                    table.active_network = Some(seq);
                    Some(seq)
                }
                _ => None,
            };
            (key_ref, replaced, became_active)
        };

        info!(
            key = %key_ref,
            key_type = %key_type,
            replaced = replaced.is_some(),
            "[KEYSTORE] Key installed"
        );

        self.events.publish(&SecurityEvent::KeyInstalled {
            key: key_ref,
            key_type,
            replaced,
        });
        if let Some(key_seq) = became_active {
            self.events
                .publish(&SecurityEvent::ActiveNetworkKeyChanged { key_seq });
        }

        key_ref
    }

    // ========================================
    // Removal / Network Key Selection
    // ========================================

    /// Removes the key at `identity`.
    ///
    /// # Errors
    /// `KeyNotFound` if nothing is installed there.
    pub fn remove(&self, identity: KeyIdentity) -> Result<KeyRef> {
        let removed = {
            let mut table = self.table.write();
            let removed = match identity {
                KeyIdentity::Network(seq) => {
                    let removed = table.network.remove(&seq);
                    if removed.is_some() && table.active_network == Some(seq) {
                        table.active_network = None;
                    }
                    removed
                }
                KeyIdentity::Link(peer) => table.links.remove(&peer),
                KeyIdentity::GlobalTcLink => table.global_tc_link.take(),
            };
            removed.ok_or_else(|| CoreError::key_not_found(identity.to_string()))?
        };

        let key_ref = removed.key_ref;
        info!(key = %key_ref, "[KEYSTORE] Key removed");
        self.events.publish(&SecurityEvent::KeyRemoved { key: key_ref });
        Ok(key_ref)
    }

    /// Selects the network key used for outgoing frames.
    ///
    /// # Errors
    /// `KeyNotFound` if no network key has that sequence number.
    pub fn set_active_network_key(&self, key_seq: u8) -> Result<()> {
        {
            let mut table = self.table.write();
            if !table.network.contains_key(&key_seq) {
                return Err(CoreError::key_not_found(KeyIdentity::Network(key_seq).to_string()));
            }
            table.active_network = Some(key_seq);
        }
        info!(key_seq, "[KEYSTORE] Active network key switched");
        self.events
            .publish(&SecurityEvent::ActiveNetworkKeyChanged { key_seq });
        Ok(())
    }

    /// Currently active network key.
    #[must_use]
    pub fn active_network_key(&self) -> Option<Arc<KeyRecord>> {
        let table = self.table.read();
        table
            .active_network
            .and_then(|seq| table.network.get(&seq).cloned())
    }

    /// Record installed at `identity`.
    #[must_use]
    pub fn get(&self, identity: KeyIdentity) -> Option<Arc<KeyRecord>> {
        self.table.read().get(identity).cloned()
    }

    /// Returns `true` if `key_ref` is still the installed generation.
    #[must_use]
    pub fn is_current(&self, key_ref: &KeyRef) -> bool {
        self.table
            .read()
            .get(key_ref.identity)
            .is_some_and(|record| record.key_ref.generation == key_ref.generation)
    }

    /// Number of installed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let table = self.table.read();
        table.network.len() + table.links.len() + usize::from(table.global_tc_link.is_some())
    }

    /// Returns `true` if no key is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================
    // Resolution
    // ========================================

    /// Resolves a wire key identifier to one key.
    ///
    /// # Arguments
    /// * `id` - Key identifier mode from the aux header
    /// * `source` - Peer address for link-class identifiers
    /// * `key_seq` - Sequence number for network keys (active key if `None`)
    ///
    /// # Errors
    /// `KeyNotFound` if no matching key is installed.
    pub fn resolve(
        &self,
        id: KeyIdentifier,
        source: Option<ExtendedAddress>,
        key_seq: Option<u8>,
    ) -> Result<ResolvedKey> {
        let table = self.table.read();
        let resolved = match id {
            KeyIdentifier::Network => {
                let seq = key_seq
                    .or(table.active_network)
                    .ok_or_else(|| CoreError::key_not_found("network (no active key)"))?;
                let record = table
                    .network
                    .get(&seq)
                    .cloned()
                    .ok_or_else(|| CoreError::key_not_found(KeyIdentity::Network(seq).to_string()))?;
                ResolvedKey::direct(record, id)
            }
            KeyIdentifier::Link | KeyIdentifier::Transport | KeyIdentifier::KeyLoad => {
                let record = Self::link_record(&table, source)?;
                let key = match id {
                    KeyIdentifier::Transport => transport_key(&record.key),
                    KeyIdentifier::KeyLoad => key_load_key(&record.key),
                    _ => record.key.clone(),
                };
                ResolvedKey {
                    record,
                    key,
                    usage: id,
                }
            }
        };
        drop(table);

        trace!(
            usage = %id,
            key = %resolved.key_ref(),
            "[KEYSTORE] Key resolved"
        );
        Ok(resolved)
    }

    fn link_record(table: &KeyTable, source: Option<ExtendedAddress>) -> Result<Arc<KeyRecord>> {
        source
            .and_then(|peer| table.links.get(&peer).cloned())
            .or_else(|| table.global_tc_link.clone())
            .ok_or_else(|| {
                CoreError::key_not_found(match source {
                    Some(peer) => KeyIdentity::Link(peer).to_string(),
                    None => "link (no source address)".to_string(),
                })
            })
    }

    /// Resolves a selector to its candidate keys, in trial order.
    ///
    /// # Errors
    /// `KeyNotFound` if no candidate exists.
    pub fn resolve_candidates(
        &self,
        selector: KeySelector,
        source: Option<ExtendedAddress>,
        key_seq: Option<u8>,
    ) -> Result<Vec<ResolvedKey>> {
        if let Some(id) = selector.wire_identifier() {
            return self.resolve(id, source, key_seq).map(|key| vec![key]);
        }

        let candidates: Vec<ResolvedKey> = [KeyIdentifier::Link, KeyIdentifier::Network]
            .into_iter()
            .filter_map(|id| self.resolve(id, source, key_seq).ok())
            .collect();

        if candidates.is_empty() {
            return Err(CoreError::key_not_found("link or network"));
        }
        Ok(candidates)
    }
}

// ============================================
// Tests
// ============================================
