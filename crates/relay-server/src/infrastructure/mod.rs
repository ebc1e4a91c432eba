//! Infrastructure layer for relay-server.
//!
//! Contains the OS-facing adapters: TCP listeners, TLS termination, the
//! per-connection read/write/keepalive driver, and file-system storage for
//! the config file and the PID file.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `relay_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod connection;
pub mod listener;
pub mod storage;
pub mod tls;
