//! # relay-core
//!
//! Shared library for the relay server containing the line-delimited JSON
//! wire protocol, the framing codec, and the pure channel rules (roles,
//! channel-name parsing, key generation).
//!
//! This crate has no knowledge of sockets, TLS, or the process-wide
//! registry; those live in `relay-server`.
//!
//! # Architecture overview (for beginners)
//!
//! The relay server lets two kinds of remote clients find each other by a
//! shared channel name and exchange JSON messages through it:
//!
//! - a **master** (the controller), and
//! - a **slave** (the controlled endpoint).
//!
//! Neither side needs a direct network path to the other; both connect to
//! the relay and the relay forwards their messages.
//!
//! This crate (`relay-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Every frame is one
//!   JSON object followed by a terminator byte (`\n` by default).  The
//!   [`protocol::FrameCodec`] splits a byte stream into frames and the
//!   [`protocol::Envelope`] type models the control messages.
//!
//! - **`domain`** – Pure business rules with no I/O: the [`Role`] a client
//!   declares, how a requested channel name encodes a lock and password
//!   ([`ChannelSpec`]), and how fresh channel keys are generated.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::Envelope` instead of `relay_core::protocol::envelope::Envelope`.
pub use domain::channel_spec::ChannelSpec;
pub use domain::key::{generate_key, KeySource, RandomKeySource, KEY_ATTEMPTS};
pub use domain::role::Role;
pub use protocol::codec::{
    decode_envelope, encode_envelope, stamp_origin, CodecError, FrameCodec, ProtocolError,
};
pub use protocol::envelope::{ClientId, ClientInfo, Envelope};
