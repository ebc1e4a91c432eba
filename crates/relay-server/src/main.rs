//! Relay server entry point.
//!
//! Accepts TLS connections from masters and slaves, pairs them by channel
//! name, and relays their line-delimited JSON messages to each other.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Config file [default: discovered relay.toml]
//!   --write-config <PATH>    Write the merged config as TOML and exit
//!   --address <ADDR>...      Listen address(es): ip:port, [v6]:port, :port
//!   --cert <PATH>            PEM certificate chain
//!   --key <PATH>             PEM private key
//!   --gen-cert-file <PATH>   Where to save a generated certificate
//!   --pid-file <PATH>        Write the process id here
//!   --log-level <LEVEL>      off|error|warn|info|debug|trace
//!   --log-file <PATH>        Also append logs to this file
//!   --motd <TEXT>            Message of the day
//!   --motd-always-display    Ask clients to always show the MOTD
//!   --send-origin <BOOL>     Add `origin` to relayed messages
//! ```
//!
//! # Environment variable overrides
//!
//! Every option can also be given as an environment variable.  Command-line
//! arguments take precedence when both are present.
//!
//! | Variable                     | Option                  |
//! |------------------------------|-------------------------|
//! | `RELAY_CONFIG`               | `--config`              |
//! | `RELAY_ADDRESS`              | `--address` (comma-separated) |
//! | `RELAY_CERT`                 | `--cert`                |
//! | `RELAY_KEY`                  | `--key`                 |
//! | `RELAY_GEN_CERT_FILE`        | `--gen-cert-file`       |
//! | `RELAY_PID_FILE`             | `--pid-file`            |
//! | `RELAY_LOG_LEVEL`            | `--log-level`           |
//! | `RELAY_LOG_FILE`             | `--log-file`            |
//! | `RELAY_MOTD`                 | `--motd`                |
//! | `RELAY_MOTD_ALWAYS_DISPLAY`  | `--motd-always-display` |
//! | `RELAY_SEND_ORIGIN`          | `--send-origin`         |
//!
//! `RUST_LOG`, when set, replaces the configured log level entirely.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use relay_server::application::{Registry, Relay};
use relay_server::infrastructure::listener;
use relay_server::infrastructure::storage::config::{
    discover_config_file, load_config, save_config, FileConfig, Overrides,
};
use relay_server::infrastructure::storage::pid::PidFile;
use relay_server::infrastructure::tls::acceptor_from_settings;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// TLS relay server for remote-control clients.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "TLS relay pairing master and slave clients over shared channels",
    version
)]
struct Cli {
    /// Config file to load instead of the discovered `relay.toml`.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Write the merged configuration to this path and exit.
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Listen address; repeat or comma-separate for several.
    #[arg(long = "address", env = "RELAY_ADDRESS", value_delimiter = ',')]
    addresses: Vec<String>,

    /// PEM certificate chain.
    #[arg(long = "cert", env = "RELAY_CERT")]
    cert: Option<PathBuf>,

    /// PEM private key.
    #[arg(long = "key", env = "RELAY_KEY")]
    key: Option<PathBuf>,

    /// Where to save the key and certificate if one is generated.
    #[arg(long, env = "RELAY_GEN_CERT_FILE")]
    gen_cert_file: Option<PathBuf>,

    /// Write the process id to this file while running.
    #[arg(long, env = "RELAY_PID_FILE")]
    pid_file: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Append log output to this file as well as the console.
    #[arg(long, env = "RELAY_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Message of the day sent to every client that joins a channel.
    #[arg(long, env = "RELAY_MOTD")]
    motd: Option<String>,

    /// Ask clients to show the MOTD even if they have seen it before.
    #[arg(
        long,
        env = "RELAY_MOTD_ALWAYS_DISPLAY",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    motd_always_display: Option<bool>,

    /// Add the sender's id as `origin` to every relayed message.
    #[arg(long, env = "RELAY_SEND_ORIGIN")]
    send_origin: Option<bool>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            addresses: self.addresses.clone(),
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
            pid_file: self.pid_file.clone(),
            motd: self.motd.clone(),
            motd_always_display: self.motd_always_display,
            send_origin: self.send_origin,
            cert_file: self.cert.clone(),
            key_file: self.key.clone(),
            gen_cert_file: self.gen_cert_file.clone(),
        }
    }

    /// Loads the config file, if any, and applies the command line over it.
    fn merged_config(&self) -> anyhow::Result<FileConfig> {
        let mut cfg = match discover_config_file(self.config.as_deref())? {
            Some(path) => load_config(&path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileConfig::default(),
        };
        cfg.apply(self.overrides());
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged over the config file.
/// 2. `tracing_subscriber` is initialised with `RUST_LOG` or the configured
///    level, logging to the console and, if configured, a log file.
/// 3. The TLS acceptor is prepared (loading or generating a certificate).
/// 4. Every listen address is bound; at least one must succeed.
/// 5. The PID file is written and the process waits for Ctrl+C or SIGTERM.
/// 6. Listeners stop, every connection is closed, and `main` returns once all
///    connection tasks have finished.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file_config = cli.merged_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&file_config.server.log_level));
    let (log_file, log_file_error) = match &file_config.server.log_file {
        Some(path) => match open_log_file(path) {
            Ok(file) => (Some(file), None),
            Err(e) => (None, Some((path, e))),
        },
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        }))
        .init();
    if let Some((path, e)) = log_file_error {
        warn!(
            "Could not open log file {}: {e}. Logging to the console only.",
            path.display()
        );
    }

    if let Some(path) = &cli.write_config {
        save_config(path, &file_config)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let config = file_config
        .into_relay_config()
        .context("invalid configuration")?;
    info!(
        "Relay server {} starting on {} address(es)",
        env!("CARGO_PKG_VERSION"),
        config.addresses.len()
    );

    let acceptor = acceptor_from_settings(&config.tls).context("failed to set up TLS")?;
    let registry = Arc::new(Registry::new(config.motd.clone()));
    let relay = Arc::new(Relay::new(registry, config.send_origin));

    let server = listener::start(&config.addresses, acceptor, relay, config.connection.clone())
        .await
        .context("failed to start listeners")?;

    let _pid_file = match &config.pid_file {
        Some(path) => Some(
            PidFile::create(path)
                .with_context(|| format!("failed to write PID file {}", path.display()))?,
        ),
        None => None,
    };

    shutdown_signal().await;
    info!("Shutting down; closing all connections.");
    server.shutdown();
    server.wait().await;

    info!("Relay server stopped");
    Ok(())
}

/// Opens `path` for appending, creating it and its parent directories.
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("failed to listen for Ctrl+C signal: {e}");
                        }
                    }
                    _ = term.recv() => info!("received SIGTERM"),
                }
                return;
            }
            Err(e) => error!("failed to listen for SIGTERM: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C signal: {e}");
        std::future::pending::<()>().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
