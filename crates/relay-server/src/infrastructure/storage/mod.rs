//! Storage infrastructure: the config file and the PID file.
//!
//! - **`config`** – locates, reads and writes `relay.toml`, and merges
//!   command-line overrides over it into a [`crate::domain::RelayConfig`].
//! - **`pid`** – writes the process id on startup and removes it on exit.

pub mod config;
pub mod pid;
