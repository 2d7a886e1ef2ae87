// ============================================
// File: crates/zbsec-tool/src/config.rs
// ============================================
//! # Tool Configuration
//!
//! ## Creation Reason
//! Describes one device's security state (address, level, keys, persisted
//! counters, CBKE timing) in a TOML file the CLI can load.
//!
//! ## Main Functionality
//! - `ToolConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Building a populated `KeyStore` and restoring outgoing counters
//!
//! ## Configuration Sections
//! - `device`: Extended address, network security level, reserved-bits policy
//! - `keys`: Network keys, link keys (raw or install code), TC link key
//! - `counters`: Persisted outgoing frame counters
//! - `cbke`: Key establishment timeouts
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [device]
//! extended_address = "00:0d:6f:00:00:12:34:56"
//! security_level = "enc-mic32"
//!
//! [keys]
//! active_network_seq = 0
//! preconfigured_tc_link_key = "zigbee-alliance-09"
//!
//! [[keys.network]]
//! seq = 0
//! key = "01030507090b0d0f00020406080a0c0d"
//!
//! [[keys.link]]
//! peer = "00:0d:6f:00:00:ab:cd:ef"
//! install_code = "83FED3407A939723A5C639B26916D505C3B5"
//!
//! [[counters.outbound]]
//! network_seq = 0
//! next = 4096
//!
//! [cbke]
//! ephemeral_time_secs = 0
//! confirm_time_secs = 0
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Key material in this file is a secret; keep the file mode restrictive
//! - Link entries carry exactly one of `key` or `install_code`
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use zbsec_common::ExtendedAddress;
use zbsec_core::cbke::{CbkeConfig, CbkeRole, CbkeSession, KeyAgreement};
use zbsec_core::counter::FrameCounterTracker;
use zbsec_core::crypto::{Key, KeyType};
use zbsec_core::frame::FrameSecurityConfig;
use zbsec_core::keystore::{validate_install_code, KeyIdentity, KeyStore};
use zbsec_core::protocol::{ReservedBitsPolicy, SecurityLevel};

use crate::error::{Result, ToolError};

/// Value of `preconfigured_tc_link_key` selecting the well-known key.
pub const ZIGBEE_ALLIANCE_09_NAME: &str = "zigbee-alliance-09";

// ============================================
// ToolConfig
// ============================================

/// Main tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Local device settings.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Installed keys.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Persisted frame counters.
    #[serde(default)]
    pub counters: CountersConfig,

    /// Key establishment timing.
    #[serde(default)]
    pub cbke: CbkeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ToolConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ToolError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ToolError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        self.keys.validate()?;
        self.counters.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Frame pipeline settings.
    #[must_use]
    pub fn frame_config(&self) -> FrameSecurityConfig {
        FrameSecurityConfig {
            local_address: self.device.extended_address,
            security_level: self.device.security_level,
            reserved_bits: self.device.reserved_bits,
        }
    }

    /// Builds a key store holding every configured key.
    ///
    /// # Errors
    /// Returns error if a key or install code is malformed.
    pub fn build_key_store(&self) -> Result<KeyStore> {
        let store = KeyStore::new();

        for entry in &self.keys.network {
            store.install_network_key(entry.seq, parse_key("keys.network.key", &entry.key)?);
        }
        if let Some(seq) = self.keys.active_network_seq {
            store.set_active_network_key(seq)?;
        }

        for entry in &self.keys.link {
            match (&entry.key, &entry.install_code) {
                (Some(key), None) => {
                    store.install_link_key(entry.peer, entry.key_type, parse_key("keys.link.key", key)?)?;
                }
                (None, Some(code)) => {
                    store.install_by_install_code(entry.peer, &parse_hex("keys.link.install_code", code)?)?;
                }
                _ => {
                    return Err(ToolError::config_invalid(
                        "keys.link",
                        "exactly one of key or install_code is required",
                    ))
                }
            }
        }

        if let Some(tc) = &self.keys.preconfigured_tc_link_key {
            store.set_preconfigured_tc_link_key(parse_tc_link_key(tc)?);
        }

        debug!(keys = store.len(), "Key store built from configuration");
        Ok(store)
    }

    /// Starts a certificate-less key establishment between this device and
    /// `peer` with the `[cbke]` timings.
    ///
    /// # Errors
    /// Returns error if the agreement suite needs certificates or `peer` is
    /// this device.
    pub fn cbke_session(
        &self,
        role: CbkeRole,
        peer: ExtendedAddress,
        agreement: Arc<dyn KeyAgreement>,
    ) -> Result<CbkeSession> {
        Ok(CbkeSession::new(
            role,
            self.device.extended_address,
            peer,
            agreement,
            None,
            self.cbke,
        )?)
    }

    /// Restores persisted outgoing counters against the keys in `store`.
    ///
    /// Entries whose key is not installed are skipped.
    pub fn restore_counters(&self, store: &KeyStore, counters: &FrameCounterTracker) {
        for entry in &self.counters.outbound {
            let Some(identity) = entry.identity() else {
                continue;
            };
            if let Some(record) = store.get(identity) {
                counters.restore_outbound(record.key_ref(), entry.next);
            }
        }
    }
}

// ============================================
// DeviceConfig
// ============================================

/// Local device section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// This device's EUI64.
    #[serde(default)]
    pub extended_address: ExtendedAddress,

    /// Network security level.
    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Handling of reserved aux header bits.
    #[serde(default)]
    pub reserved_bits: ReservedBitsPolicy,
}

impl DeviceConfig {
    fn validate(&self) -> Result<()> {
        if self.extended_address == ExtendedAddress::UNKNOWN {
            return Err(ToolError::config_invalid(
                "device.extended_address",
                "must be set",
            ));
        }
        if !self.security_level.is_secured() {
            return Err(ToolError::config_invalid(
                "device.security_level",
                "must include a MIC or encryption",
            ));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            extended_address: ExtendedAddress::new(1),
            security_level: SecurityLevel::default(),
            reserved_bits: ReservedBitsPolicy::default(),
        }
    }
}

// ============================================
// KeysConfig
// ============================================

/// Installed keys section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Sequence number of the active network key.
    #[serde(default)]
    pub active_network_seq: Option<u8>,

    /// Global TC link key: hex, or `zigbee-alliance-09`.
    #[serde(default)]
    pub preconfigured_tc_link_key: Option<String>,

    /// Network keys.
    #[serde(default)]
    pub network: Vec<NetworkKeyEntry>,

    /// Link keys.
    #[serde(default)]
    pub link: Vec<LinkKeyEntry>,
}

/// One network key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkKeyEntry {
    /// Key sequence number.
    pub seq: u8,
    /// Key as hex.
    pub key: String,
}

/// One link key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkKeyEntry {
    /// Peer EUI64.
    pub peer: ExtendedAddress,

    /// Link key role (ignored for install codes, which install TC link keys).
    #[serde(default = "default_link_key_type")]
    pub key_type: KeyType,

    /// Key as hex.
    #[serde(default)]
    pub key: Option<String>,

    /// Install code with CRC as hex.
    #[serde(default)]
    pub install_code: Option<String>,
}

fn default_link_key_type() -> KeyType {
    KeyType::TcLink
}

impl KeysConfig {
    fn validate(&self) -> Result<()> {
        let mut seqs = HashSet::new();
        for entry in &self.network {
            if !seqs.insert(entry.seq) {
                return Err(ToolError::config_invalid(
                    "keys.network",
                    format!("duplicate sequence number {}", entry.seq),
                ));
            }
            parse_key("keys.network.key", &entry.key)?;
        }
        if let Some(active) = self.active_network_seq {
            if !seqs.contains(&active) {
                return Err(ToolError::config_invalid(
                    "keys.active_network_seq",
                    format!("no network key with sequence number {active}"),
                ));
            }
        }

        let mut peers = HashSet::new();
        for entry in &self.link {
            if !peers.insert(entry.peer) {
                return Err(ToolError::config_invalid(
                    "keys.link",
                    format!("duplicate peer {}", entry.peer),
                ));
            }
            if entry.key_type.is_network() {
                return Err(ToolError::config_invalid(
                    "keys.link.key_type",
                    "network key type in a link entry",
                ));
            }
            match (&entry.key, &entry.install_code) {
                (Some(key), None) => {
                    parse_key("keys.link.key", key)?;
                }
                (None, Some(code)) => {
                    let code = parse_hex("keys.link.install_code", code)?;
                    validate_install_code(&code)
                        .map_err(|e| ToolError::config_invalid("keys.link.install_code", e.to_string()))?;
                }
                _ => {
                    return Err(ToolError::config_invalid(
                        "keys.link",
                        format!("peer {}: exactly one of key or install_code is required", entry.peer),
                    ))
                }
            }
        }

        if let Some(tc) = &self.preconfigured_tc_link_key {
            parse_tc_link_key(tc)?;
        }
        Ok(())
    }
}

// ============================================
// CountersConfig
// ============================================

/// Persisted counters section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountersConfig {
    /// Next outgoing counter per key.
    #[serde(default)]
    pub outbound: Vec<OutboundCounterEntry>,
}

/// One persisted outgoing counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundCounterEntry {
    /// Network key sequence number.
    #[serde(default)]
    pub network_seq: Option<u8>,
    /// Link key peer.
    #[serde(default)]
    pub peer: Option<ExtendedAddress>,
    /// Next counter value to send.
    pub next: u32,
}

impl OutboundCounterEntry {
    /// Key identity this counter belongs to.
    #[must_use]
    pub fn identity(&self) -> Option<KeyIdentity> {
        match (self.network_seq, self.peer) {
            (Some(seq), None) => Some(KeyIdentity::Network(seq)),
            (None, Some(peer)) => Some(KeyIdentity::Link(peer)),
            _ => None,
        }
    }
}

impl CountersConfig {
    fn validate(&self) -> Result<()> {
        for entry in &self.outbound {
            if entry.identity().is_none() {
                return Err(ToolError::config_invalid(
                    "counters.outbound",
                    "exactly one of network_seq or peer is required",
                ));
            }
        }
        Ok(())
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Parsing Helpers
// ============================================

/// Decodes hex, ignoring `:`, `-` and whitespace separators.
///
/// # Errors
/// `InvalidInput` if the text is not valid hex.
pub fn parse_hex(field: &str, text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ':' | '-') && !c.is_whitespace())
        .collect();
    hex::decode(&cleaned).map_err(|e| ToolError::invalid_input(field, e.to_string()))
}

fn parse_key(field: &str, text: &str) -> Result<Key> {
    let bytes = parse_hex(field, text)?;
    Key::from_slice(&bytes).map_err(|e| ToolError::config_invalid(field, e.to_string()))
}

fn parse_tc_link_key(text: &str) -> Result<Key> {
    if text.eq_ignore_ascii_case(ZIGBEE_ALLIANCE_09_NAME) {
        Ok(Key::zigbee_alliance_09())
    } else {
        parse_key("keys.preconfigured_tc_link_key", text)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use zbsec_common::ManualClock;
    use zbsec_core::cbke::X25519Agreement;
    use zbsec_core::crypto::EncryptType;
    use zbsec_core::keystore::KeySelector;

    const FULL: &str = r#"
        [device]
        extended_address = "00:0d:6f:00:00:12:34:56"
        security_level = "enc-mic32"
        reserved_bits = "ignore"

        [keys]
        active_network_seq = 1
        preconfigured_tc_link_key = "zigbee-alliance-09"

        [[keys.network]]
        seq = 0
        key = "00112233445566778899aabbccddeeff"

        [[keys.network]]
        seq = 1
        key = "ff:ee:dd:cc:bb:aa:99:88:77:66:55:44:33:22:11:00"

        [[keys.link]]
        peer = "00:0d:6f:00:00:ab:cd:ef"
        install_code = "83FED3407A939723A5C639B26916D505C3B5"

        [[keys.link]]
        peer = "00:0d:6f:00:00:00:00:02"
        key_type = "app-link"
        key = "0102030405060708090a0b0c0d0e0f10"

        [[counters.outbound]]
        network_seq = 1
        next = 4096

        [cbke]
        confirm_time_secs = 15

        [logging]
        level = "debug"
    "#;

    #[test]
    fn test_default_config() {
        let config = ToolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_config() {
        let config = ToolConfig::from_str(FULL).unwrap();
        assert_eq!(config.device.extended_address.as_u64(), 0x000d_6f00_0012_3456);
        assert_eq!(config.device.reserved_bits, ReservedBitsPolicy::Ignore);
        assert_eq!(config.keys.network.len(), 2);
        assert_eq!(config.cbke.confirm_time_secs, 15);
        assert_eq!(config.frame_config().security_level, SecurityLevel::EncMic32);
    }

    #[test]
    fn test_build_key_store() {
        let config = ToolConfig::from_str(FULL).unwrap();
        let store = config.build_key_store().unwrap();

        let active = store.active_network_key().unwrap();
        assert_eq!(active.key_ref().identity, KeyIdentity::Network(1));

        let peer: ExtendedAddress = "00:0d:6f:00:00:ab:cd:ef".parse().unwrap();
        let link = store.get(KeyIdentity::Link(peer)).unwrap();
        assert_eq!(
            link.key().as_bytes(),
            &hex::decode("66B6900981E1EE3CA4206B6B861C02BB").unwrap()[..]
        );

        // Unknown peer falls back to the preconfigured key
        let stranger = ExtendedAddress::new(0x77);
        let resolved = store
            .resolve_candidates(KeySelector::Link, Some(stranger), None)
            .unwrap();
        assert_eq!(resolved[0].encrypt_type(), EncryptType::GlobalTcLink);
        assert_eq!(resolved[0].key(), &Key::zigbee_alliance_09());
    }

    #[test]
    fn test_cbke_session_uses_configured_timing() {
        let config = ToolConfig::from_str(FULL).unwrap();
        let peer_addr = ExtendedAddress::new(0x000d_6f00_0000_0002);
        let peer_config = ToolConfig {
            device: DeviceConfig {
                extended_address: peer_addr,
                ..DeviceConfig::default()
            },
            ..config.clone()
        };
        let agreement: Arc<dyn KeyAgreement> = Arc::new(X25519Agreement::new());
        let clock = Arc::new(ManualClock::new());

        let mut local = config
            .cbke_session(CbkeRole::Initiator, peer_addr, agreement.clone())
            .unwrap()
            .with_clock(clock.clone());
        let mut remote = peer_config
            .cbke_session(CbkeRole::Responder, config.device.extended_address, agreement.clone())
            .unwrap()
            .with_clock(clock);

        let qeu = local.generate_ephemeral_keys().unwrap().to_vec();
        let qev = remote.generate_ephemeral_keys().unwrap().to_vec();
        local.derive_shared_secret(None, &qev).unwrap();
        remote.derive_shared_secret(None, &qeu).unwrap();
        assert_eq!(local.remaining(), Some(Duration::from_secs(15)));

        assert!(config
            .cbke_session(CbkeRole::Initiator, config.device.extended_address, agreement)
            .is_err());
    }

    #[test]
    fn test_restore_counters() {
        let config = ToolConfig::from_str(FULL).unwrap();
        let store = config.build_key_store().unwrap();
        let counters = FrameCounterTracker::new();
        config.restore_counters(&store, &counters);

        let key = store.get(KeyIdentity::Network(1)).unwrap().key_ref();
        assert_eq!(counters.next_outbound(key).unwrap(), 4096);
    }

    #[test]
    fn test_rejects_corrupted_install_code() {
        let toml = FULL.replace("C3B5", "C3B4");
        let err = ToolConfig::from_str(&toml).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_rejects_unknown_active_sequence() {
        let toml = FULL.replace("active_network_seq = 1", "active_network_seq = 7");
        assert!(ToolConfig::from_str(&toml).is_err());
    }

    #[test]
    fn test_rejects_link_with_key_and_code() {
        let toml = r#"
            [device]
            extended_address = "00:0d:6f:00:00:12:34:56"

            [[keys.link]]
            peer = "00:0d:6f:00:00:00:00:02"
            key = "0102030405060708090a0b0c0d0e0f10"
            install_code = "83FED3407A939723A5C639B26916D505C3B5"
        "#;
        assert!(ToolConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_rejects_unsecured_level() {
        let toml = r#"
            [device]
            extended_address = "00:0d:6f:00:00:12:34:56"
            security_level = "none"
        "#;
        assert!(ToolConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ToolConfig::from_str(FULL).unwrap();
        let restored = ToolConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(restored.keys.link.len(), 2);
        assert_eq!(restored.device.extended_address, config.device.extended_address);
    }

    #[test]
    fn test_parse_hex_separators() {
        assert_eq!(parse_hex("x", "01:02-03 04").unwrap(), vec![1, 2, 3, 4]);
        assert!(parse_hex("x", "zz").is_err());
    }
}
