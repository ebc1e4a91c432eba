//! Relay configuration types.
//!
//! [`RelayConfig`] is the fully resolved set of runtime settings.  It is built
//! once at startup by merging the command line over the config file over
//! these defaults (see `infrastructure::storage::config`), then handed to the
//! listener and the registry.
//!
//! | Setting               | Default            |
//! |-----------------------|--------------------|
//! | addresses             | `0.0.0.0:6837`     |
//! | log_level             | `info`             |
//! | log_file              | none               |
//! | send_origin           | `true`             |
//! | motd                  | none               |
//! | keepalive             | 120 s              |
//! | write_timeout         | 8 s                |
//! | send_buffer           | 100 frames         |
//! | max_frame_size        | 1 MiB              |

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use relay_core::protocol::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_TERMINATOR};
use thiserror::Error;

/// Port the relay listens on when no address is configured.
pub const DEFAULT_PORT: u16 = 6837;

/// Errors produced while parsing a listen address.
#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    /// The text is not `ip:port`, `[ipv6]:port` or `:port`.
    #[error("invalid listen address '{address}': {source}")]
    Invalid {
        address: String,
        #[source]
        source: AddrParseError,
    },

    /// Port 0 would bind a random port nobody can find.
    #[error("listen address '{0}' must specify a non-zero port")]
    PortZero(String),
}

/// All runtime configuration for the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Resolved, de-duplicated listen addresses.
    pub addresses: Vec<SocketAddr>,
    /// `tracing` level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// File that receives a copy of the console log.
    pub log_file: Option<PathBuf>,
    /// Where to write the process id, if anywhere.
    pub pid_file: Option<PathBuf>,
    /// Message of the day shown to every joiner.
    pub motd: Motd,
    /// Whether relayed payloads get an `origin` field.
    pub send_origin: bool,
    /// Certificate sources.
    pub tls: TlsSettings,
    /// Per-connection limits and timers.
    pub connection: ConnectionSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addresses: vec![SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))],
            log_level: "info".to_string(),
            log_file: None,
            pid_file: None,
            motd: Motd::default(),
            send_origin: true,
            tls: TlsSettings::default(),
            connection: ConnectionSettings::default(),
        }
    }
}

/// The message of the day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Motd {
    /// Text sent in the `motd` frame after `channel_joined`.  Empty means none.
    pub text: String,
    /// Ask clients to display the text even if they have seen it before.
    pub always_display: bool,
}

impl Motd {
    /// Creates a MOTD.  `always_display` is dropped when there is no text.
    pub fn new(text: impl Into<String>, always_display: bool) -> Self {
        let text = text.into();
        let always_display = always_display && !text.is_empty();
        Self {
            text,
            always_display,
        }
    }

    /// Returns `true` when there is no text to send.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Where the TLS certificate comes from.
///
/// When `cert_file` or `key_file` is absent a self-signed certificate is
/// generated at startup; `gen_cert_file` then receives a copy of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// PEM certificate chain.
    pub cert_file: Option<PathBuf>,
    /// PEM private key.
    pub key_file: Option<PathBuf>,
    /// Destination for a generated key + certificate bundle.
    pub gen_cert_file: Option<PathBuf>,
}

/// Per-connection framing, queueing and timer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Byte that ends every frame.
    pub message_terminator: u8,
    /// Idle period after which a ping is queued.
    pub keepalive: Duration,
    /// Upper bound on a single socket write.
    pub write_timeout: Duration,
    /// Upper bound on the TLS handshake.
    pub handshake_timeout: Duration,
    /// Capacity of the outbound queue, in frames.
    pub send_buffer: usize,
    /// Largest inbound frame accepted, terminator excluded.
    pub max_frame_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            message_terminator: DEFAULT_TERMINATOR,
            keepalive: Duration::from_secs(120),
            write_timeout: Duration::from_secs(8),
            handshake_timeout: Duration::from_secs(10),
            send_buffer: 100,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ── Address parsing ───────────────────────────────────────────────────────────

/// Parses one listen address.
///
/// Accepts `ip:port`, `[ipv6]:port`, and `:port` (all IPv4 interfaces).
///
/// # Errors
///
/// Returns [`AddressError`] if the text does not parse or names port 0.
///
/// # Examples
///
/// ```rust
/// use relay_server::domain::parse_listen_address;
///
/// let addr = parse_listen_address(":6837").unwrap();
/// assert_eq!(addr.to_string(), "0.0.0.0:6837");
/// ```
pub fn parse_listen_address(text: &str) -> Result<SocketAddr, AddressError> {
    let trimmed = text.trim();
    let full = if trimmed.starts_with(':') {
        format!("0.0.0.0{trimmed}")
    } else {
        trimmed.to_string()
    };
    let addr: SocketAddr = full.parse().map_err(|source| AddressError::Invalid {
        address: text.to_string(),
        source,
    })?;
    if addr.port() == 0 {
        return Err(AddressError::PortZero(text.to_string()));
    }
    Ok(addr)
}

/// Removes repeated addresses, keeping the first occurrence of each.
pub fn dedup_addresses(addresses: Vec<SocketAddr>) -> Vec<SocketAddr> {
    let mut unique = Vec::with_capacity(addresses.len());
    for addr in addresses {
        if !unique.contains(&addr) {
            unique.push(addr);
        }
    }
    unique
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listens_on_all_interfaces_port_6837() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.addresses.len(), 1);
        assert_eq!(cfg.addresses[0].to_string(), "0.0.0.0:6837");
    }

    #[test]
    fn test_default_sends_origin() {
        assert!(RelayConfig::default().send_origin);
    }

    #[test]
    fn test_default_connection_timers() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.keepalive, Duration::from_secs(120));
        assert_eq!(settings.write_timeout, Duration::from_secs(8));
        assert_eq!(settings.send_buffer, 100);
        assert_eq!(settings.message_terminator, b'\n');
    }

    #[test]
    fn test_motd_without_text_never_forces_display() {
        let motd = Motd::new("", true);
        assert!(motd.is_empty());
        assert!(!motd.always_display);
    }

    #[test]
    fn test_motd_with_text_keeps_force_display() {
        let motd = Motd::new("welcome", true);
        assert!(motd.always_display);
    }

    #[test]
    fn test_parse_port_only_binds_all_ipv4() {
        let addr = parse_listen_address(":7000").unwrap();
        assert_eq!(addr, SocketAddr::from(([0, 0, 0, 0], 7000)));
    }

    #[test]
    fn test_parse_ipv4_and_ipv6() {
        assert_eq!(
            parse_listen_address("127.0.0.1:6837").unwrap().to_string(),
            "127.0.0.1:6837"
        );
        assert_eq!(
            parse_listen_address("[::1]:6837").unwrap().to_string(),
            "[::1]:6837"
        );
    }

    #[test]
    fn test_parse_rejects_port_zero() {
        assert_eq!(
            parse_listen_address("127.0.0.1:0"),
            Err(AddressError::PortZero("127.0.0.1:0".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_listen_address("not-an-address"),
            Err(AddressError::Invalid { .. })
        ));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let a = SocketAddr::from(([127, 0, 0, 1], 1));
        let b = SocketAddr::from(([127, 0, 0, 1], 2));
        assert_eq!(dedup_addresses(vec![b, a, b, a]), vec![b, a]);
    }
}
