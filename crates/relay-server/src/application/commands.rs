//! Control commands a client may send before it joins a channel.
//!
//! The table is built once, when the [`Relay`](crate::application::Relay) is
//! created, and never changes afterwards.
//!
//! | `type`             | Effect                                            |
//! |--------------------|---------------------------------------------------|
//! | `join`             | Set role, enter (or create) a channel             |
//! | `protocol_version` | Record the client's protocol version              |
//! | `generate_key`     | Reply with an unused channel key, then disconnect |

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::protocol::{error_code, kind, Envelope};
use relay_core::{ChannelSpec, KeySource, Role};
use tracing::{debug, warn};

use crate::application::client::Client;
use crate::application::registry::Registry;

/// What a handler may reach besides the calling client.
pub struct CommandContext<'a> {
    /// Shared relay state.
    pub registry: &'a Registry,
    /// Source of `generate_key` candidates.
    pub keys: &'a Mutex<Box<dyn KeySource>>,
}

/// A command handler.  Errors are reported to the client, not returned.
pub type CommandHandler = fn(&CommandContext<'_>, &Arc<Client>, &Envelope);

/// Maps a message `type` to its handler.
pub struct CommandTable {
    handlers: HashMap<&'static str, CommandHandler>,
}

impl CommandTable {
    /// The three standard commands.
    pub fn standard() -> Self {
        let mut handlers: HashMap<&'static str, CommandHandler> = HashMap::new();
        handlers.insert(kind::JOIN, join);
        handlers.insert(kind::PROTOCOL_VERSION, protocol_version);
        handlers.insert(kind::GENERATE_KEY, generate_key);
        Self { handlers }
    }

    /// Looks up the handler for `kind`.
    pub fn get(&self, kind: &str) -> Option<CommandHandler> {
        self.handlers.get(kind).copied()
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("commands", &self.names())
            .finish()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

fn join(ctx: &CommandContext<'_>, client: &Arc<Client>, msg: &Envelope) {
    if client.channel().is_some() {
        client.send_envelope(&Envelope::error(error_code::ALREADY_JOINED));
        return;
    }

    let spec = ChannelSpec::parse(&msg.channel);
    if spec.name.is_empty() {
        client.send_envelope(&Envelope::error(error_code::INVALID_PARAMETERS));
        return;
    }

    client.set_role(Role::from_connection_type(&msg.connection_type));
    ctx.registry.join(client, spec);
}

fn protocol_version(_ctx: &CommandContext<'_>, client: &Arc<Client>, msg: &Envelope) {
    if msg.version <= 0 {
        debug!(
            "Client {} sent an invalid protocol version: {}",
            client.id(),
            msg.version
        );
        client.send_envelope(&Envelope::error(error_code::INVALID_PARAMETERS));
        return;
    }
    client.set_protocol_version(msg.version);
    debug!(
        "Client {} has set protocol version {}.",
        client.id(),
        msg.version
    );
}

fn generate_key(ctx: &CommandContext<'_>, client: &Arc<Client>, _msg: &Envelope) {
    let key = {
        let mut source = ctx.keys.lock();
        ctx.registry.generate_key(source.as_mut())
    };

    match key {
        Some(key) => {
            debug!("Generated key {key} for client {}.", client.id());
            client.send_envelope(&Envelope::generated_key(key));
        }
        None => {
            warn!(
                "Could not find an unused key for client {}; all candidates are taken.",
                client.id()
            );
            client.send_envelope(&Envelope::error(error_code::KEY_UNAVAILABLE));
        }
    }
    client.close_after_flush();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
