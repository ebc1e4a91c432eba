//! Domain rules for the relay.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! The relay has a handful of rules that do not depend on sockets or locks:
//!
//! - what role a client plays once it declares a `connection_type`,
//! - how a requested channel name encodes a lock and a password,
//! - how a fresh, unused channel key is produced.
//!
//! Keeping them here means they can be tested without starting a server.
//! The stateful parts (clients, channels, the registry) are in the
//! `relay-server` crate's application layer and call into these rules.

/// Master / slave role of a channel member.
pub mod role;

/// Lock and password markers inside a requested channel name.
pub mod channel_spec;

/// Random channel key generation.
pub mod key;
