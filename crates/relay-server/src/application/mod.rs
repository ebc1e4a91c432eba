//! Application layer for relay-server.
//!
//! The application layer owns the shared relay state and the protocol rules.
//! It knows *what* to do with a frame, but never *how* bytes reach a socket:
//! every client is addressed through its bounded outbound queue, which the
//! connection driver in the infrastructure layer drains.
//!
//! # Lock ordering
//!
//! Three kinds of lock exist: the registry lock, one lock per channel, and one
//! lock per client.  They are only ever taken in this order:
//!
//! ```text
//! channel  ─►  registry  ─►  client
//! ```
//!
//! The registry never waits on a channel while holding its own lock, and a
//! client lock is never held across a call into anything else.

pub mod channel;
pub mod client;
pub mod commands;
pub mod registry;
pub mod relay;

pub use channel::{Channel, ChannelClosed};
pub use client::{Client, Lifecycle, Outbound};
pub use commands::{CommandContext, CommandHandler, CommandTable};
pub use registry::Registry;
pub use relay::Relay;
