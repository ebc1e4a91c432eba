//! TOML configuration file for the relay.
//!
//! The file is optional.  It is looked up in this order:
//!
//! 1. the path given with `--config` (which must exist),
//! 2. `relay.toml` in the working directory,
//! 3. `relay.toml` in the platform config directory:
//!    - Windows:  `%APPDATA%\RelayServer\relay.toml`
//!    - Linux:    `$XDG_CONFIG_HOME/relay-server/relay.toml` or `~/.config/relay-server/relay.toml`
//!    - macOS:    `~/Library/Application Support/RelayServer/relay.toml`
//!
//! Command-line values override file values, which override the defaults.
//!
//! # Example file
//!
//! ```toml
//! [server]
//! addresses = ["0.0.0.0:6837", "[::]:6837"]
//! log_level = "info"
//! log_file = "relay.log"
//! motd = "Welcome to the relay"
//! motd_always_display = false
//! send_origin = true
//!
//! [tls]
//! cert_file = "cert.pem"
//! key_file = "key.pem"
//!
//! [connection]
//! keepalive_secs = 120
//! send_buffer = 100
//! ```
//!
//! Relative paths inside the file are resolved against the file's directory.
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a file only needs the
//! keys it wants to change, and an empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::config::{
    dedup_addresses, parse_listen_address, AddressError, ConnectionSettings, Motd, RelayConfig,
    TlsSettings, DEFAULT_PORT,
};

/// File name looked up in the working and platform config directories.
pub const CONFIG_FILE_NAME: &str = "relay.toml";

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Longest accepted keepalive, write or handshake timer: one day.
pub const MAX_TIMER_SECS: u64 = 24 * 60 * 60;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// An explicitly requested config file does not exist.
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A listen address is malformed.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// A value is out of range.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level structure of `relay.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub tls: TlsSection,
    #[serde(default)]
    pub connection: ConnectionSection,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Listen addresses: `ip:port`, `[ipv6]:port` or `:port`.
    #[serde(default = "default_addresses")]
    pub addresses: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs here, in addition to the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub motd: String,
    #[serde(default)]
    pub motd_always_display: bool,
    #[serde(default = "default_true")]
    pub send_origin: bool,
}

/// `[tls]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_cert_file: Option<PathBuf>,
}

/// `[connection]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    /// Frame terminator as a byte value; 10 is `\n`.
    #[serde(default = "default_terminator")]
    pub message_terminator: u8,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_addresses() -> Vec<String> {
    vec![format!("0.0.0.0:{DEFAULT_PORT}")]
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_terminator() -> u8 {
    ConnectionSettings::default().message_terminator
}
fn default_keepalive_secs() -> u64 {
    ConnectionSettings::default().keepalive.as_secs()
}
fn default_write_timeout_secs() -> u64 {
    ConnectionSettings::default().write_timeout.as_secs()
}
fn default_handshake_timeout_secs() -> u64 {
    ConnectionSettings::default().handshake_timeout.as_secs()
}
fn default_send_buffer() -> usize {
    ConnectionSettings::default().send_buffer
}
fn default_max_frame_size() -> usize {
    ConnectionSettings::default().max_frame_size
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            addresses: default_addresses(),
            log_level: default_log_level(),
            log_file: None,
            pid_file: None,
            motd: String::new(),
            motd_always_display: false,
            send_origin: true,
        }
    }
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            message_terminator: default_terminator(),
            keepalive_secs: default_keepalive_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            send_buffer: default_send_buffer(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

// ── Command-line overrides ────────────────────────────────────────────────────

/// Values given on the command line.  `None` (or an empty list) leaves the
/// file value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub addresses: Vec<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub motd: Option<String>,
    pub motd_always_display: Option<bool>,
    pub send_origin: Option<bool>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub gen_cert_file: Option<PathBuf>,
}

impl FileConfig {
    /// Applies command-line values over the file values.
    pub fn apply(&mut self, overrides: Overrides) {
        if !overrides.addresses.is_empty() {
            self.server.addresses = overrides.addresses;
        }
        if let Some(level) = overrides.log_level {
            self.server.log_level = level;
        }
        if overrides.log_file.is_some() {
            self.server.log_file = overrides.log_file;
        }
        if overrides.pid_file.is_some() {
            self.server.pid_file = overrides.pid_file;
        }
        if let Some(motd) = overrides.motd {
            self.server.motd = motd;
        }
        if let Some(always) = overrides.motd_always_display {
            self.server.motd_always_display = always;
        }
        if let Some(send_origin) = overrides.send_origin {
            self.server.send_origin = send_origin;
        }
        if overrides.cert_file.is_some() {
            self.tls.cert_file = overrides.cert_file;
        }
        if overrides.key_file.is_some() {
            self.tls.key_file = overrides.key_file;
        }
        if overrides.gen_cert_file.is_some() {
            self.tls.gen_cert_file = overrides.gen_cert_file;
        }
    }

    /// Validates the merged values and converts them to runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Address`] for a malformed listen address and
    /// [`ConfigError::Invalid`] for an unknown log level or a zero limit.
    pub fn into_relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let log_level = self.server.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::Invalid {
                key: "server.log_level",
                reason: format!(
                    "'{}' is not one of {}",
                    self.server.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        if self.server.addresses.is_empty() {
            return Err(ConfigError::Invalid {
                key: "server.addresses",
                reason: "at least one listen address is required".to_string(),
            });
        }
        let addresses = self
            .server
            .addresses
            .iter()
            .map(|a| parse_listen_address(a))
            .collect::<Result<Vec<_>, _>>()?;

        if self.server.motd_always_display && self.server.motd.is_empty() {
            info!("motd_always_display is set but there is no MOTD; ignoring it.");
        }

        Ok(RelayConfig {
            addresses: dedup_addresses(addresses),
            log_level,
            log_file: self.server.log_file.clone(),
            pid_file: self.server.pid_file.clone(),
            motd: Motd::new(self.server.motd.clone(), self.server.motd_always_display),
            send_origin: self.server.send_origin,
            tls: TlsSettings {
                cert_file: self.tls.cert_file.clone(),
                key_file: self.tls.key_file.clone(),
                gen_cert_file: self.tls.gen_cert_file.clone(),
            },
            connection: self.connection.to_settings()?,
        })
    }
}

impl ConnectionSection {
    fn to_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        let positive = |key: &'static str, value: u64| {
            if value == 0 {
                Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                })
            } else {
                Ok(value)
            }
        };
        let timer = |key: &'static str, secs: u64| {
            if secs > MAX_TIMER_SECS {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("must be at most {MAX_TIMER_SECS} seconds"),
                });
            }
            positive(key, secs).map(Duration::from_secs)
        };

        if !is_valid_terminator(self.message_terminator) {
            return Err(ConfigError::Invalid {
                key: "connection.message_terminator",
                reason: format!(
                    "{} is not an ASCII control byte (0-31); it could occur inside a JSON frame",
                    self.message_terminator
                ),
            });
        }

        Ok(ConnectionSettings {
            message_terminator: self.message_terminator,
            keepalive: timer("connection.keepalive_secs", self.keepalive_secs)?,
            write_timeout: timer("connection.write_timeout_secs", self.write_timeout_secs)?,
            handshake_timeout: timer(
                "connection.handshake_timeout_secs",
                self.handshake_timeout_secs,
            )?,
            send_buffer: positive("connection.send_buffer", self.send_buffer as u64)? as usize,
            max_frame_size: positive("connection.max_frame_size", self.max_frame_size as u64)?
                as usize,
        })
    }
}

/// Compact JSON escapes every control byte, so only those can end a frame.
fn is_valid_terminator(byte: u8) -> bool {
    byte < 0x20
}

// ── File I/O ──────────────────────────────────────────────────────────────────

/// Finds the config file to load, if any.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if `explicit` is given but missing.
pub fn discover_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(Some(local));
    }

    Ok(platform_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file()))
}

/// Resolves the platform config directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory
/// cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads and parses `path`.  Relative paths inside the file are resolved
/// against the file's directory.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: FileConfig = toml::from_str(&content)?;

    if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        for field in [
            &mut cfg.server.log_file,
            &mut cfg.server.pid_file,
            &mut cfg.tls.cert_file,
            &mut cfg.tls.key_file,
            &mut cfg.tls.gen_cert_file,
        ] {
            if let Some(p) = field.as_mut().filter(|p| p.is_relative()) {
                *p = base.join(&*p);
            }
        }
    }
    Ok(cfg)
}

/// Writes `config` to `path` as TOML, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RelayServer"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("relay-server"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RelayServer")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("relay_config_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_file_yields_default_relay_config() {
        let cfg: FileConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, FileConfig::default());
        assert_eq!(cfg.into_relay_config().unwrap(), RelayConfig::default());
    }

    #[test]
    fn test_partial_connection_section_keeps_other_defaults() {
        // Arrange
        let text = "[connection]\nkeepalive_secs = 30\n";

        // Act
        let cfg: FileConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.connection.keepalive_secs, 30);
        assert_eq!(cfg.connection.send_buffer, 100);
        assert_eq!(cfg.connection.message_terminator, b'\n');
        assert_eq!(cfg.server, ServerSection::default());
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result = toml::from_str::<FileConfig>("[server\naddresses = 1");
        let err = ConfigError::from(result.unwrap_err());
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    // ── Merging and validation ────────────────────────────────────────────────

    #[test]
    fn test_overrides_win_over_file_values() {
        // Arrange
        let mut cfg: FileConfig = toml::from_str(
            "[server]\naddresses = [\"127.0.0.1:7000\"]\nlog_level = \"warn\"\nsend_origin = true\n",
        )
        .unwrap();

        // Act
        cfg.apply(Overrides {
            addresses: vec![":7001".to_string()],
            send_origin: Some(false),
            ..Overrides::default()
        });
        let relay = cfg.into_relay_config().unwrap();

        // Assert
        assert_eq!(relay.addresses, vec![SocketAddr::from(([0, 0, 0, 0], 7001))]);
        assert_eq!(relay.log_level, "warn");
        assert!(!relay.send_origin);
    }

    #[test]
    fn test_log_file_from_overrides_reaches_relay_config() {
        let mut cfg: FileConfig =
            toml::from_str("[server]\nlog_file = \"/var/log/from-file.log\"\n").unwrap();
        assert_eq!(
            cfg.into_relay_config().unwrap().log_file,
            Some(PathBuf::from("/var/log/from-file.log"))
        );

        cfg.apply(Overrides {
            log_file: Some(PathBuf::from("cli.log")),
            ..Overrides::default()
        });

        assert_eq!(cfg.into_relay_config().unwrap().log_file, Some(PathBuf::from("cli.log")));
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let mut cfg = FileConfig::default();
        cfg.server.motd = "hello".to_string();
        let before = cfg.clone();

        cfg.apply(Overrides::default());

        assert_eq!(cfg, before);
    }

    #[test]
    fn test_duplicate_addresses_are_removed() {
        let mut cfg = FileConfig::default();
        cfg.server.addresses = vec![
            ":6837".to_string(),
            "0.0.0.0:6837".to_string(),
            "127.0.0.1:6837".to_string(),
        ];

        let relay = cfg.into_relay_config().unwrap();

        assert_eq!(relay.addresses.len(), 2);
    }

    #[test]
    fn test_bad_address_is_reported() {
        let mut cfg = FileConfig::default();
        cfg.server.addresses = vec!["localhost".to_string()];
        assert!(matches!(
            cfg.into_relay_config(),
            Err(ConfigError::Address(AddressError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let mut cfg = FileConfig::default();
        cfg.server.log_level = "verbose".to_string();
        assert!(matches!(
            cfg.into_relay_config(),
            Err(ConfigError::Invalid { key: "server.log_level", .. })
        ));
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        let mut cfg = FileConfig::default();
        cfg.server.log_level = "DEBUG".to_string();
        assert_eq!(cfg.into_relay_config().unwrap().log_level, "debug");
    }

    #[test]
    fn test_zero_send_buffer_is_rejected() {
        let mut cfg = FileConfig::default();
        cfg.connection.send_buffer = 0;
        assert!(matches!(
            cfg.into_relay_config(),
            Err(ConfigError::Invalid { key: "connection.send_buffer", .. })
        ));
    }

    #[test]
    fn test_force_display_without_motd_is_reset() {
        let mut cfg = FileConfig::default();
        cfg.server.motd_always_display = true;
        let relay = cfg.into_relay_config().unwrap();
        assert!(!relay.motd.always_display);
    }

    #[test]
    fn test_huge_keepalive_is_rejected() {
        // Arrange
        let mut cfg: FileConfig = toml::from_str(&format!(
            "[connection]\nkeepalive_secs = {}\n",
            i64::MAX
        ))
        .unwrap();

        // Act
        let result = cfg.into_relay_config();

        // Assert
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "connection.keepalive_secs", .. })
        ));

        cfg.connection.keepalive_secs = MAX_TIMER_SECS;
        assert_eq!(
            cfg.into_relay_config().unwrap().connection.keepalive,
            Duration::from_secs(MAX_TIMER_SECS)
        );
    }

    #[test]
    fn test_write_and_handshake_timeouts_are_bounded() {
        let mut cfg = FileConfig::default();
        cfg.connection.write_timeout_secs = MAX_TIMER_SECS + 1;
        assert!(matches!(
            cfg.into_relay_config(),
            Err(ConfigError::Invalid { key: "connection.write_timeout_secs", .. })
        ));

        let mut cfg = FileConfig::default();
        cfg.connection.handshake_timeout_secs = u64::MAX;
        assert!(matches!(
            cfg.into_relay_config(),
            Err(ConfigError::Invalid { key: "connection.handshake_timeout_secs", .. })
        ));
    }

    #[test]
    fn test_terminator_that_occurs_in_json_is_rejected() {
        for byte in [b'"', b'{', b'}', b':', b',', b'a', b' ', 0x7f] {
            let mut cfg = FileConfig::default();
            cfg.connection.message_terminator = byte;
            assert!(
                matches!(
                    cfg.into_relay_config(),
                    Err(ConfigError::Invalid { key: "connection.message_terminator", .. })
                ),
                "terminator {byte} was accepted"
            );
        }
    }

    #[test]
    fn test_control_byte_terminators_are_accepted() {
        for byte in [b'\n', b'\r', 0u8, 0x1e] {
            let mut cfg = FileConfig::default();
            cfg.connection.message_terminator = byte;
            let relay = cfg.into_relay_config().unwrap();
            assert_eq!(relay.connection.message_terminator, byte);
        }
    }

    // ── File I/O ──────────────────────────────────────────────────────────────

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join(CONFIG_FILE_NAME);
        let mut cfg = FileConfig::default();
        cfg.server.motd = "Welcome".to_string();
        cfg.connection.keepalive_secs = 45;

        // Act
        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_relative_paths_resolve_against_file_directory() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[server]\npid_file = \"relay.pid\"\nlog_file = \"logs/relay.log\"\n[tls]\ncert_file = \"certs/cert.pem\"\nkey_file = \"/abs/key.pem\"\n",
        )
        .unwrap();

        // Act
        let cfg = load_config(&path).unwrap();

        // Assert
        assert_eq!(cfg.server.pid_file, Some(dir.join("relay.pid")));
        assert_eq!(cfg.server.log_file, Some(dir.join("logs/relay.log")));
        assert_eq!(cfg.tls.cert_file, Some(dir.join("certs/cert.pem")));
        assert_eq!(cfg.tls.key_file, Some(PathBuf::from("/abs/key.pem")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = load_config(Path::new("/nonexistent/path/that/cannot/exist/relay.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_explicit_missing_config_is_not_found() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/relay.toml");
        assert!(matches!(
            discover_config_file(Some(&path)),
            Err(ConfigError::NotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_explicit_existing_config_is_used() {
        let dir = temp_dir();
        let path = dir.join("custom.toml");
        std::fs::write(&path, "").unwrap();

        assert_eq!(discover_config_file(Some(&path)).unwrap(), Some(path.clone()));
        std::fs::remove_dir_all(&dir).ok();
    }
}
