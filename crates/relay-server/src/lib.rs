//! relay-server library crate.
//!
//! A TLS relay that lets masters (controllers) and slaves (controlled
//! endpoints) find each other by a shared channel name and exchange JSON
//! messages without a direct network path between them.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Clients (line-delimited JSON over TLS)
//!         ↕
//! [relay-server]
//!   ├── domain/            Plain settings types: RelayConfig, Motd, ...
//!   ├── application/       Client, Channel, Registry, command table, Relay
//!   └── infrastructure/
//!         ├── connection/  Reader / writer / keepalive tasks per socket
//!         ├── listener/    TLS accept loops and coordinated shutdown
//!         ├── tls/         Certificate loading and self-signed generation
//!         └── storage/     TOML config file and PID file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` holds the shared state and the protocol rules.  It never
//!   touches a socket: clients are reached through their outbound queues.
//! - `infrastructure` owns sockets, files, and tasks, and drives the
//!   application layer.
//!
//! # Data flow (for beginners)
//!
//! ```text
//! accept ─► TLS handshake ─► Registry::add_client ─► reader task
//!                                                        │ frame
//!                                                        ▼
//!                                              Relay::message_received
//!                                    not joined ┌────────┴────────┐ joined
//!                                               ▼                 ▼
//!                                        CommandTable     Channel::send_others
//!                                   (join, protocol_version,  (opaque relay,
//!                                        generate_key)       origin stamped)
//! ```

/// Domain layer: plain configuration types.
pub mod domain;

/// Application layer: clients, channels, registry and message routing.
pub mod application;

/// Infrastructure layer: sockets, TLS, tasks and files.
pub mod infrastructure;
