//! Entry point for every inbound frame.
//!
//! ```text
//!  frame ──► registered? ──no──► close
//!               │ yes
//!               ▼
//!           in a channel? ──yes──► stamp origin ──► Channel::send_others
//!               │ no
//!               ▼
//!           decode JSON ──fail──► invalid_parameters, close after flush
//!               │
//!               ▼
//!           CommandTable lookup ──► handler
//! ```
//!
//! Once a client has joined, its frames are opaque: they are relayed without
//! being interpreted, apart from the optional `origin` stamp.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use relay_core::protocol::{decode_envelope, error_code, stamp_origin, Envelope};
use relay_core::{KeySource, RandomKeySource};
use tracing::{debug, error};

use crate::application::client::Client;
use crate::application::commands::{CommandContext, CommandTable};
use crate::application::registry::Registry;

/// Routes inbound frames to a channel or to a command handler.
pub struct Relay {
    registry: Arc<Registry>,
    commands: CommandTable,
    send_origin: bool,
    stopping: AtomicBool,
    keys: Mutex<Box<dyn KeySource>>,
}

impl Relay {
    /// Creates a relay over `registry` with the standard commands and random
    /// channel keys.
    pub fn new(registry: Arc<Registry>, send_origin: bool) -> Self {
        Self::with_key_source(registry, send_origin, Box::new(RandomKeySource))
    }

    /// Like [`Relay::new`] with a caller-supplied key source.
    pub fn with_key_source(
        registry: Arc<Registry>,
        send_origin: bool,
        keys: Box<dyn KeySource>,
    ) -> Self {
        Self {
            registry,
            commands: CommandTable::standard(),
            send_origin,
            stopping: AtomicBool::new(false),
            keys: Mutex::new(keys),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Whether shutdown has begun.  Transport errors are not logged after
    /// this point.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Raises the stopping flag.
    pub fn begin_stopping(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    /// Handles one complete, non-empty frame from `client`.
    pub fn message_received(&self, client: &Arc<Client>, frame: Bytes) {
        if !self.registry.contains_client(client) {
            error!(
                "Received a message from client {}, which is not registered. Closing it.",
                client.id()
            );
            client.close();
            return;
        }

        if let Some(channel) = client.channel() {
            let payload = if self.send_origin {
                match stamp_origin(&frame, client.id()) {
                    Ok(stamped) => stamped,
                    Err(e) => {
                        debug!(
                            "Could not add origin to message from client {}: {e}",
                            client.id()
                        );
                        frame
                    }
                }
            } else {
                frame
            };
            channel.send_others(payload, client);
            return;
        }

        let msg = match decode_envelope(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(
                    "Authorization failure for client {}: could not parse message: {e}",
                    client.id()
                );
                client.send_envelope(&Envelope::error(error_code::INVALID_PARAMETERS));
                client.close_after_flush();
                return;
            }
        };
        self.dispatch(client, &msg);
    }

    fn dispatch(&self, client: &Arc<Client>, msg: &Envelope) {
        if msg.is_untyped() {
            client.send_envelope(&Envelope::error(error_code::INVALID_PARAMETERS));
            return;
        }
        let Some(handler) = self.commands.get(&msg.kind) else {
            debug!("Client {} sent unknown command '{}'.", client.id(), msg.kind);
            client.send_envelope(&Envelope::error(error_code::UNKNOWN_COMMAND));
            return;
        };
        let ctx = CommandContext {
            registry: &self.registry,
            keys: &self.keys,
        };
        handler(&ctx, client, msg);
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("commands", &self.commands)
            .field("send_origin", &self.send_origin)
            .field("stopping", &self.is_stopping())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::client::Outbound;
    use crate::domain::config::Motd;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        relay: Relay,
    }

    impl Harness {
        fn new(send_origin: bool) -> Self {
            let registry = Arc::new(Registry::new(Motd::default()));
            Self {
                relay: Relay::new(registry, send_origin),
            }
        }

        fn connect(&self) -> (Arc<Client>, mpsc::Receiver<Outbound>) {
            let (tx, rx) = mpsc::channel(32);
            let client = self
                .relay
                .registry()
                .add_client("127.0.0.1".to_string(), tx, CancellationToken::new());
            (client, rx)
        }

        fn send(&self, client: &Arc<Client>, text: &str) {
            self.relay
                .message_received(client, Bytes::copy_from_slice(text.as_bytes()));
        }
    }

    fn frames(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(Outbound::Frame(bytes)) = rx.try_recv() {
            out.push(serde_json::from_slice(&bytes).expect("valid json"));
        }
        out
    }

    #[test]
    fn test_unregistered_client_is_closed() {
        // Arrange
        let h = Harness::new(true);
        let (tx, mut rx) = mpsc::channel(4);
        let stray = Arc::new(Client::new(99, String::new(), tx, CancellationToken::new()));

        // Act
        h.send(&stray, r#"{"type":"join","channel":"x"}"#);

        // Assert
        assert!(!stray.is_open());
        assert!(rx.try_recv().is_err());
        assert_eq!(h.relay.registry().channel_count(), 0);
    }

    #[test]
    fn test_unknown_command_reply() {
        let h = Harness::new(true);
        let (c, mut rx) = h.connect();

        h.send(&c, r#"{"type":"dance"}"#);

        assert_eq!(frames(&mut rx), vec![json!({"type":"error","error":"unknown_command"})]);
        assert!(c.is_open());
    }

    #[test]
    fn test_missing_type_is_invalid() {
        let h = Harness::new(true);
        let (c, mut rx) = h.connect();

        h.send(&c, r#"{"channel":"room"}"#);

        assert_eq!(
            frames(&mut rx),
            vec![json!({"type":"error","error":"invalid_parameters"})]
        );
        assert!(c.is_open());
    }

    #[test]
    fn test_malformed_json_before_join_closes_after_reply() {
        // Arrange
        let h = Harness::new(true);
        let (c, mut rx) = h.connect();

        // Act
        h.send(&c, "not json");

        // Assert
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Frame(Bytes::from_static(
                br#"{"type":"error","error":"invalid_parameters"}"#
            ))
        );
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(!c.is_open());
    }

    #[test]
    fn test_joined_frames_are_relayed_with_origin() {
        // Arrange
        let h = Harness::new(true);
        let (m, mut rx_m) = h.connect();
        let (s, mut rx_s) = h.connect();
        h.send(&m, r#"{"type":"join","channel":"room","connection_type":"master"}"#);
        h.send(&s, r#"{"type":"join","channel":"room","connection_type":"slave"}"#);
        frames(&mut rx_m);
        frames(&mut rx_s);

        // Act
        h.send(&m, r#"{"type":"key","vk_code":65}"#);

        // Assert
        assert_eq!(
            frames(&mut rx_s),
            vec![json!({"type":"key","vk_code":65,"origin":m.id()})]
        );
        assert!(frames(&mut rx_m).is_empty());
    }

    #[test]
    fn test_joined_frames_relay_unchanged_without_origin() {
        let h = Harness::new(false);
        let (m, mut rx_m) = h.connect();
        let (s, mut rx_s) = h.connect();
        h.send(&m, r#"{"type":"join","channel":"room","connection_type":"master"}"#);
        h.send(&s, r#"{"type":"join","channel":"room","connection_type":"slave"}"#);
        frames(&mut rx_m);
        frames(&mut rx_s);

        h.send(&s, r#"{"type":"speak","sequence":[]}"#);

        assert_eq!(
            rx_m.try_recv().unwrap(),
            Outbound::Frame(Bytes::from_static(br#"{"type":"speak","sequence":[]}"#))
        );
    }

    #[test]
    fn test_joined_non_json_is_relayed_verbatim() {
        let h = Harness::new(true);
        let (m, mut rx_m) = h.connect();
        let (s, mut rx_s) = h.connect();
        h.send(&m, r#"{"type":"join","channel":"room","connection_type":"master"}"#);
        h.send(&s, r#"{"type":"join","channel":"room","connection_type":"slave"}"#);
        frames(&mut rx_m);
        frames(&mut rx_s);

        h.send(&s, "plain text");

        assert_eq!(
            rx_m.try_recv().unwrap(),
            Outbound::Frame(Bytes::from_static(b"plain text"))
        );
    }

    #[test]
    fn test_master_alone_gets_nvda_not_connected() {
        let h = Harness::new(true);
        let (m, mut rx_m) = h.connect();
        h.send(&m, r#"{"type":"join","channel":"room","connection_type":"master"}"#);
        frames(&mut rx_m);

        h.send(&m, r#"{"type":"key"}"#);

        assert_eq!(frames(&mut rx_m), vec![json!({"type":"nvda_not_connected"})]);
    }

    #[test]
    fn test_stopping_flag() {
        let h = Harness::new(true);
        assert!(!h.relay.is_stopping());
        h.relay.begin_stopping();
        assert!(h.relay.is_stopping());
    }
}
