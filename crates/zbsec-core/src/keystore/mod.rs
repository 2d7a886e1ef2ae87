// ============================================
// File: crates/zbsec-core/src/keystore/mod.rs
// ============================================
//! # Key Store Module
//!
//! ## Creation Reason
//! Frames name their key indirectly (key identifier mode plus source
//! address or key sequence number). This module keeps the installed keys
//! and maps those references to concrete key material.
//!
//! ## Main Functionality
//! - [`store`]: `KeyStore` with install, remove and resolution
//! - [`install_code`]: Install code validation and link key derivation
//! - `KeySelector`: Wire key identifiers plus the local `BothLinkNetwork`
//! - `KeyIdentity` / `KeyRef`: Stable names used to key frame counters
//!
//! ## Resolution Table
//! ```text
//! ┌────────────────┬───────────────────────────────────────────────┐
//! │ Selector       │ Key                                           │
//! ├────────────────┼───────────────────────────────────────────────┤
//! │ Network        │ network key with the given sequence number    │
//! │ Link           │ peer link key, else preconfigured TC link key │
//! │ Transport      │ HMAC-MMO(peer link key, 0x00)                 │
//! │ KeyLoad        │ HMAC-MMO(peer link key, 0x02)                 │
//! │ BothLinkNetwork│ link candidate, then network candidate        │
//! └────────────────┴───────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `BothLinkNetwork` has no wire encoding; never put it in a header
//! - Generations change on every install; counters follow generations
//!
//! ## Last Modified
//! v0.1.0 - Initial key store

pub mod install_code;
pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

use zbsec_common::ExtendedAddress;

use crate::protocol::KeyIdentifier;

pub use install_code::{derive_link_key, validate_install_code};
pub use store::{KeyRecord, KeyStore, ResolvedKey};

// ============================================
// KeySelector
// ============================================

/// Local key selection directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeySelector {
    /// Network key.
    Network,
    /// Peer link key.
    Link,
    /// Key-transport key derived from the peer link key.
    Transport,
    /// Key-load key derived from the peer link key.
    KeyLoad,
    /// Try the link key, then the network key (local only, `0xfe`).
    BothLinkNetwork,
}

impl KeySelector {
    /// Local code used by configuration and CLI.
    pub const BOTH_LINK_NETWORK_CODE: u8 = 0xfe;

    /// Over-the-air identifier, `None` for `BothLinkNetwork`.
    #[must_use]
    pub const fn wire_identifier(&self) -> Option<KeyIdentifier> {
        match self {
            Self::Network => Some(KeyIdentifier::Network),
            Self::Link => Some(KeyIdentifier::Link),
            Self::Transport => Some(KeyIdentifier::Transport),
            Self::KeyLoad => Some(KeyIdentifier::KeyLoad),
            Self::BothLinkNetwork => None,
        }
    }
}

impl From<KeyIdentifier> for KeySelector {
    fn from(id: KeyIdentifier) -> Self {
        match id {
            KeyIdentifier::Link => Self::Link,
            KeyIdentifier::Network => Self::Network,
            KeyIdentifier::Transport => Self::Transport,
            KeyIdentifier::KeyLoad => Self::KeyLoad,
        }
    }
}

// ============================================
// KeyIdentity / KeyRef
// ============================================

/// Where a key lives in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyIdentity {
    /// Network key by sequence number.
    Network(u8),
    /// Link key shared with one peer.
    Link(ExtendedAddress),
    /// Preconfigured global trust center link key.
    GlobalTcLink,
}

impl fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(seq) => write!(f, "network#{seq}"),
            Self::Link(peer) => write!(f, "link@{peer}"),
            Self::GlobalTcLink => f.write_str("global-tc-link"),
        }
    }
}

/// A specific installation of a key.
///
/// Replacing the key at an identity yields a new generation, so frame
/// counters recorded against the old `KeyRef` are never consulted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyRef {
    /// Store slot.
    pub identity: KeyIdentity,
    /// Install generation.
    pub generation: u64,
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/g{}", self.identity, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_wire_mapping() {
        for id in [
            KeyIdentifier::Link,
            KeyIdentifier::Network,
            KeyIdentifier::Transport,
            KeyIdentifier::KeyLoad,
        ] {
            assert_eq!(KeySelector::from(id).wire_identifier(), Some(id));
        }
        assert_eq!(KeySelector::BothLinkNetwork.wire_identifier(), None);
    }

    #[test]
    fn test_key_ref_display() {
        let r = KeyRef {
            identity: KeyIdentity::Network(3),
            generation: 9,
        };
        assert_eq!(r.to_string(), "network#3/g9");
    }
}
