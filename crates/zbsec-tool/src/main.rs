// ============================================
// File: crates/zbsec-tool/src/main.rs
// ============================================
//! # zbsec Entry Point
//!
//! ## Creation Reason
//! Command-line access to the security core for commissioning and
//! debugging: install codes, hashes, aux headers and whole frames.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Command execution
//!
//! ## Usage
//! ```bash
//! zbsec install-code 83FED3407A939723A5C639B26916D505C3B5
//! zbsec hash 00112233 --hmac-key 000102030405060708090a0b0c0d0e0f
//! zbsec header decode 2801000000efcdab000000000000
//! zbsec header encode --level 5 --key-id 1 --counter 1 --key-seq 0
//! zbsec secure -c device.toml --selector network --frame-header 0812 --payload 68656c6c6f
//! zbsec unsecure -c device.toml --frame <HEX> --aux-offset 2
//! zbsec establish -c device.toml --peer 00:0d:6f:00:00:00:00:02
//! zbsec validate -c device.toml
//! zbsec show-config -c device.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Output goes to stdout; logs go through tracing
//! - Never print key material except where the command exists to derive it
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zbsec_common::ExtendedAddress;
use zbsec_core::cbke::{CbkeRole, KeyAgreement, X25519Agreement};
use zbsec_core::crypto::{hmac_mmo, mmo_hash};
use zbsec_core::frame::{FrameSecurity, UnsecureOptions};
use zbsec_core::keystore::install_code::install_code_crc;
use zbsec_core::keystore::{derive_link_key, KeySelector};
use zbsec_core::protocol::{AuxiliarySecurityHeader, ReservedBitsPolicy};
use zbsec_core::FrameCounterTracker;
use zbsec_tool::config::parse_hex;
use zbsec_tool::ToolConfig;

// ============================================
// CLI Definition
// ============================================

/// Zigbee frame security toolbox
#[derive(Parser, Debug)]
#[command(name = "zbsec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is unset (defaults to the config's level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate an install code and derive its TC link key
    InstallCode {
        /// Install code including its CRC, as hex
        code: String,
    },

    /// AES-MMO hash (or HMAC-MMO with --hmac-key)
    Hash {
        /// Data to hash, as hex
        data: String,

        /// HMAC key, as hex
        #[arg(long)]
        hmac_key: Option<String>,
    },

    /// Encode or decode an auxiliary security header
    Header {
        #[command(subcommand)]
        action: HeaderAction,
    },

    /// Secure a frame with the keys from a config file
    Secure {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/zbsec/device.toml")]
        config: PathBuf,

        /// Key to use
        #[arg(long, value_enum, default_value_t = SelectorArg::Network)]
        selector: SelectorArg,

        /// Destination for link-class keys
        #[arg(long)]
        peer: Option<ExtendedAddress>,

        /// NWK / APS header preceding the aux header, as hex
        #[arg(long, default_value = "")]
        frame_header: String,

        /// Payload, as hex
        #[arg(long)]
        payload: String,
    },

    /// Unsecure a frame with the keys from a config file
    Unsecure {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/zbsec/device.toml")]
        config: PathBuf,

        /// Whole frame, as hex
        #[arg(long)]
        frame: String,

        /// Offset of the aux header in the frame
        #[arg(long, default_value_t = 0)]
        aux_offset: usize,

        /// Sender address when the header carries none
        #[arg(long)]
        source: Option<ExtendedAddress>,

        /// Key selection override
        #[arg(long, value_enum)]
        selector: Option<SelectorArg>,
    },

    /// Run an in-process ECDHE key establishment with a simulated peer
    Establish {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/zbsec/device.toml")]
        config: PathBuf,

        /// Address of the simulated peer
        #[arg(long)]
        peer: ExtendedAddress,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/zbsec/device.toml")]
        config: PathBuf,
    },

    /// Print the effective configuration as TOML
    ShowConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/zbsec/device.toml")]
        config: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum HeaderAction {
    /// Encode a header from field values
    Encode {
        /// Security level (0-7)
        #[arg(long, default_value_t = 5)]
        level: u8,

        /// Key identifier mode (0 link, 1 network, 2 transport, 3 key-load)
        #[arg(long, default_value_t = 1)]
        key_id: u8,

        /// Frame counter
        #[arg(long)]
        counter: u32,

        /// Extended source address (sets the extended nonce bit)
        #[arg(long)]
        source: Option<ExtendedAddress>,

        /// Key sequence number (network key id only)
        #[arg(long)]
        key_seq: Option<u8>,
    },

    /// Decode a header
    Decode {
        /// Header bytes, as hex
        bytes: String,

        /// Mask reserved control bits instead of failing
        #[arg(long)]
        ignore_reserved: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SelectorArg {
    Network,
    Link,
    Transport,
    KeyLoad,
    BothLinkNetwork,
}

impl Commands {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Self::Secure { config, .. }
            | Self::Unsecure { config, .. }
            | Self::Establish { config, .. }
            | Self::Validate { config }
            | Self::ShowConfig { config } => Some(config.as_path()),
            _ => None,
        }
    }
}

impl From<SelectorArg> for KeySelector {
    fn from(arg: SelectorArg) -> Self {
        match arg {
            SelectorArg::Network => Self::Network,
            SelectorArg::Link => Self::Link,
            SelectorArg::Transport => Self::Transport,
            SelectorArg::KeyLoad => Self::KeyLoad,
            SelectorArg::BothLinkNetwork => Self::BothLinkNetwork,
        }
    }
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.log_level.clone() {
        Some(level) => level,
        None => configured_log_level(cli.command.config_path()).await,
    };
    init_logging(&level);

    // Execute command
    let result = match cli.command {
        Commands::InstallCode { code } => cmd_install_code(&code),
        Commands::Hash { data, hmac_key } => cmd_hash(&data, hmac_key.as_deref()),
        Commands::Header { action } => cmd_header(action),
        Commands::Secure {
            config,
            selector,
            peer,
            frame_header,
            payload,
        } => cmd_secure(config, selector, peer, &frame_header, &payload).await,
        Commands::Unsecure {
            config,
            frame,
            aux_offset,
            source,
            selector,
        } => cmd_unsecure(config, &frame, aux_offset, source, selector).await,
        Commands::Establish { config, peer } => cmd_establish(config, peer).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::ShowConfig { config } => cmd_show_config(config).await,
    };

    // Handle errors
    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Validates an install code and prints the derived link key.
fn cmd_install_code(code: &str) -> anyhow::Result<()> {
    let code = parse_hex("install_code", code)?;
    let key = derive_link_key(&code)?;
    let body = &code[..code.len() - 2];

    println!("Install code:  {}", hex::encode_upper(body));
    println!("CRC:           {:04X}", install_code_crc(body));
    println!("Link key:      {}", hex::encode_upper(key.as_bytes()));
    Ok(())
}

/// Prints an AES-MMO digest or HMAC-MMO tag.
fn cmd_hash(data: &str, hmac_key: Option<&str>) -> anyhow::Result<()> {
    let data = parse_hex("data", data)?;
    let digest = match hmac_key {
        Some(key) => hmac_mmo(&parse_hex("hmac_key", key)?, &data),
        None => mmo_hash(&data),
    };
    println!("{}", hex::encode_upper(digest));
    Ok(())
}

/// Encodes or decodes an aux header.
fn cmd_header(action: HeaderAction) -> anyhow::Result<()> {
    match action {
        HeaderAction::Encode {
            level,
            key_id,
            counter,
            source,
            key_seq,
        } => {
            let bytes = AuxiliarySecurityHeader::encode_fields(
                level,
                key_id,
                source.is_some(),
                counter,
                source,
                key_seq,
            )?;
            println!("{}", hex::encode(bytes));
        }
        HeaderAction::Decode {
            bytes,
            ignore_reserved,
        } => {
            let policy = if ignore_reserved {
                ReservedBitsPolicy::Ignore
            } else {
                ReservedBitsPolicy::Reject
            };
            let (header, used) = AuxiliarySecurityHeader::decode(&parse_hex("bytes", &bytes)?, policy)?;

            println!("Control:        0x{:02x}", header.control_byte());
            println!("Level:          {}", header.level);
            println!("Key id:         {}", header.key_id);
            println!("Frame counter:  {}", header.frame_counter);
            match header.source {
                Some(source) => println!("Source:         {source}"),
                None => println!("Source:         (not carried)"),
            }
            if let Some(seq) = header.key_seq {
                println!("Key sequence:   {seq}");
            }
            println!("Length:         {used}");
        }
    }
    Ok(())
}

/// Secures a frame and prints it as hex.
async fn cmd_secure(
    config_path: PathBuf,
    selector: SelectorArg,
    peer: Option<ExtendedAddress>,
    frame_header: &str,
    payload: &str,
) -> anyhow::Result<()> {
    let (config, pipeline) = load_pipeline(&config_path).await?;
    let frame = pipeline.secure(
        &parse_hex("frame_header", frame_header)?,
        selector.into(),
        peer,
        &parse_hex("payload", payload)?,
    )?;

    info!(len = frame.len(), device = %config.device.extended_address, "Frame secured");
    println!("{}", hex::encode(frame));
    Ok(())
}

/// Unsecures a frame and prints the payload.
async fn cmd_unsecure(
    config_path: PathBuf,
    frame: &str,
    aux_offset: usize,
    source: Option<ExtendedAddress>,
    selector: Option<SelectorArg>,
) -> anyhow::Result<()> {
    let (_, pipeline) = load_pipeline(&config_path).await?;
    let frame = parse_hex("frame", frame)?;
    let out = pipeline.unsecure_with(
        &frame,
        aux_offset,
        UnsecureOptions {
            source,
            counter_reset: false,
            selector: selector.map(Into::into),
        },
    )?;

    println!("Source:         {}", out.source);
    println!("Frame counter:  {}", out.header.frame_counter);
    println!("Level:          {}", out.header.level);
    println!("Key:            {} ({:?})", out.key, out.encrypt_type);
    println!("Payload:        {}", hex::encode(&out.payload));
    Ok(())
}

/// Runs both sides of an ECDHE exchange and installs the resulting
/// application link key in the configured store.
async fn cmd_establish(config_path: PathBuf, peer: ExtendedAddress) -> anyhow::Result<()> {
    let config = ToolConfig::load(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;
    let store = config.build_key_store()?;
    let agreement: Arc<dyn KeyAgreement> = Arc::new(X25519Agreement::new());

    let mut peer_config = config.clone();
    peer_config.device.extended_address = peer;
    let mut local = config.cbke_session(CbkeRole::Initiator, peer, agreement.clone())?;
    let mut remote =
        peer_config.cbke_session(CbkeRole::Responder, config.device.extended_address, agreement)?;

    let qeu = local.generate_ephemeral_keys()?.to_vec();
    let qev = remote.generate_ephemeral_keys()?.to_vec();
    local.derive_shared_secret(None, &qev)?;
    remote.derive_shared_secret(None, &qeu)?;

    let macu = local.local_confirmation()?;
    let macv = remote.local_confirmation()?;
    remote.confirm(&macu)?;
    let key_ref = local.confirm_and_install(&store, &macv)?;

    info!(peer = %peer, key = %key_ref, "Key establishment complete");
    println!("Suite:          {}", local.suite());
    println!("State:          {}", local.state());
    println!("Installed:      {key_ref}");
    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        bail!("config file not found: {}", config_path.display());
    }

    let config = ToolConfig::load(&config_path).await?;
    let store = config.build_key_store()?;

    println!("✅ Configuration is valid");
    println!();
    println!("Device:");
    println!("   Address:    {}", config.device.extended_address);
    println!("   Level:      {}", config.device.security_level);
    println!();
    println!("Keys:");
    println!("   Installed:  {}", store.len());
    match store.active_network_key() {
        Some(active) => println!("   Active:     {}", active.key_ref()),
        None => println!("   Active:     (none)"),
    }
    println!();
    Ok(())
}

/// Prints the effective configuration.
async fn cmd_show_config(config_path: PathBuf) -> anyhow::Result<()> {
    let config = if config_path.exists() {
        ToolConfig::load(&config_path).await?
    } else {
        info!("Config file not found, using defaults");
        ToolConfig::default()
    };
    print!("{}", config.to_toml());
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

/// Reads `[logging] level` from the config, falling back to `warn`.
async fn configured_log_level(path: Option<&Path>) -> String {
    match path {
        Some(path) if path.exists() => ToolConfig::load(path)
            .await
            .map(|config| config.logging.level)
            .unwrap_or_else(|_| "warn".to_string()),
        _ => "warn".to_string(),
    }
}

/// Loads a config and builds the frame pipeline over its keys.
async fn load_pipeline(path: &Path) -> anyhow::Result<(ToolConfig, FrameSecurity)> {
    let config = ToolConfig::load(path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;

    let store = Arc::new(config.build_key_store()?);
    let counters = Arc::new(FrameCounterTracker::new());
    config.restore_counters(&store, &counters);

    let pipeline = FrameSecurity::new(config.frame_config(), store)?.with_counters(counters);
    Ok((config, pipeline))
}
