//! Domain layer for relay-server.
//!
//! Only plain data lives here: the resolved runtime settings and the small
//! parsing rules for listen addresses.  Nothing in this module reads files,
//! environment variables, or sockets; the storage layer and `main.rs` fill
//! these types in.

pub mod config;

pub use config::{
    dedup_addresses, parse_listen_address, AddressError, ConnectionSettings, Motd, RelayConfig,
    TlsSettings,
};
