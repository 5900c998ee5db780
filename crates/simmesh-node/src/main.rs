//! Simmesh node security diagnostics.
//!
//! # Usage
//!
//! ```bash
//! # Show key and rotation state (bootstraps keys on first run)
//! simmesh-node --store keys.redb status
//!
//! # Rotate if the schedule says so, or unconditionally
//! simmesh-node --store keys.redb check
//! simmesh-node --store keys.redb rotate
//!
//! # Seal a payload into a hex envelope, and open it again
//! simmesh-node --store keys.redb seal "AT+CSQ"
//! simmesh-node --store keys.redb open 3041...
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use simmesh_node::{NodeError, RedbKeyStore, SecurityLayer, SystemEnv, TracingHealth};
use simmesh_security::SecurityConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Simmesh node security layer
#[derive(Parser, Debug)]
#[command(name = "simmesh-node")]
#[command(about = "Key management and envelope diagnostics for simmesh nodes")]
#[command(version)]
struct Args {
    /// Path to the key store database
    #[arg(short, long, default_value = "simmesh-keys.redb")]
    store: PathBuf,

    /// Key rotation interval in seconds
    #[arg(long, default_value = "86400")]
    rotation_interval_secs: u32,

    /// Oldest accepted envelope age in seconds
    #[arg(long, default_value = "300")]
    replay_window_secs: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print key and rotation status
    Status,
    /// Rotate keys now
    Rotate,
    /// Rotate keys if the interval has elapsed
    Check,
    /// Encrypt and authenticate a payload, print the envelope as hex
    Seal {
        /// Payload text
        payload: String,
    },
    /// Verify and decrypt a hex envelope, print the payload
    Open {
        /// Envelope as hex
        envelope: String,
    },
}

#[allow(clippy::print_stdout)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = SecurityConfig {
        rotation_interval_ms: args.rotation_interval_secs.saturating_mul(1_000),
        replay_window_ms: args.replay_window_secs.saturating_mul(1_000),
        ..SecurityConfig::default()
    };

    tracing::info!("Opening key store at {}", args.store.display());
    let store = RedbKeyStore::create(&args.store).map_err(NodeError::from)?;
    let mut layer = SecurityLayer::start(SystemEnv::new(), store, config, TracingHealth)?;

    match args.command {
        Command::Status => {
            println!("{}", layer.status());
        },
        Command::Rotate => {
            layer.rotate_now().map_err(NodeError::from)?;
            println!("rotated to generation {}", layer.status().keys.generation);
        },
        Command::Check => {
            if layer.check_rotation().map_err(NodeError::from)? {
                println!("rotated to generation {}", layer.status().keys.generation);
            } else {
                println!("rotation not due for {} s", layer.status().keys.until_rotation_ms / 1_000);
            }
        },
        Command::Seal { payload } => {
            let sealed = layer.seal(payload.as_bytes()).map_err(NodeError::from)?;
            println!("{}", hex::encode(sealed));
        },
        Command::Open { envelope } => {
            let bytes = hex::decode(envelope.trim())?;
            let payload = layer.open(&bytes).map_err(NodeError::from)?;
            println!("{}", String::from_utf8_lossy(&payload));
        },
    }

    Ok(())
}
