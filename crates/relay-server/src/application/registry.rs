//! Process-wide relay state: live clients, live channels, and the id counter.
//!
//! The registry is an explicit service object shared behind an `Arc`; there
//! is no global state.  One lock guards all three fields, and it is held only
//! for map lookups and mutations, never across a call into a channel.
//!
//! # Invariants
//!
//! - Client ids strictly increase and are never reused while the process runs.
//! - A channel name is registered exactly while that channel has members.
//! - A client is registered from TLS handshake until its teardown.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::protocol::ClientId;
use relay_core::{generate_key, ChannelSpec, KeySource};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::channel::{Channel, ChannelClosed};
use crate::application::client::{Client, Outbound};
use crate::domain::config::Motd;

#[derive(Debug, Default)]
struct RegistryState {
    clients: HashMap<ClientId, Arc<Client>>,
    channels: HashMap<String, Arc<Channel>>,
    last_id: ClientId,
}

/// Authoritative set of clients and channels.
#[derive(Debug)]
pub struct Registry {
    state: Mutex<RegistryState>,
    motd: Motd,
}

impl Registry {
    /// Creates an empty registry.  `motd` is sent to every joiner.
    pub fn new(motd: Motd) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            motd,
        }
    }

    /// The message of the day.
    pub fn motd(&self) -> &Motd {
        &self.motd
    }

    // ── Clients ──────────────────────────────────────────────────────────────

    /// Allocates the next id and registers a new client.
    ///
    /// `outbound` is the queue the client's writer drains and `cancel` the
    /// token that stops the client's tasks.
    pub fn add_client(
        &self,
        ip: String,
        outbound: mpsc::Sender<Outbound>,
        cancel: CancellationToken,
    ) -> Arc<Client> {
        let mut state = self.state.lock();
        state.last_id += 1;
        let id = state.last_id;
        let client = Arc::new(Client::new(id, ip, outbound, cancel));
        state.clients.insert(id, Arc::clone(&client));
        drop(state);

        info!("Client {id} has connected from {}", client.ip());
        client
    }

    /// Unregisters `client` and takes it out of its channel.
    ///
    /// A client that is no longer registered is left alone, so racing
    /// teardowns cannot unwind the same membership twice.
    pub fn remove_client(&self, client: &Arc<Client>) {
        let id = client.id();
        let remaining = {
            let mut state = self.state.lock();
            match state.clients.get(&id) {
                Some(existing) if Arc::ptr_eq(existing, client) => {
                    state.clients.remove(&id);
                    state.clients.len()
                }
                _ => {
                    drop(state);
                    debug!("Client {id} is already disconnected.");
                    return;
                }
            }
        };

        if let Some(channel) = client.channel() {
            channel.remove(client, self);
        }

        info!("Client {id} has disconnected.");
        if remaining == 0 {
            debug!("There are no clients connected to the server.");
        }
    }

    /// Returns `true` if this exact client is registered.
    pub fn contains_client(&self, client: &Arc<Client>) -> bool {
        self.state
            .lock()
            .clients
            .get(&client.id())
            .is_some_and(|existing| Arc::ptr_eq(existing, client))
    }

    /// Looks a client up by id.
    pub fn find_client(&self, id: ClientId) -> Option<Arc<Client>> {
        self.state.lock().clients.get(&id).cloned()
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    // ── Channels ─────────────────────────────────────────────────────────────

    /// Creates a channel with `first` as its only member.
    ///
    /// Does nothing and returns `None` if the name is already registered.
    pub fn add_channel(&self, spec: ChannelSpec, first: &Arc<Client>) -> Option<Arc<Channel>> {
        Channel::create(spec, first, &self.motd, |channel| {
            let mut state = self.state.lock();
            if state.channels.contains_key(channel.name()) {
                return false;
            }
            state
                .channels
                .insert(channel.name().to_string(), Arc::clone(channel));
            drop(state);

            let mut line = format!("Channel {} has been created.", channel.name());
            if channel.is_locked() {
                line.push_str(" This is a locked channel. ");
                match channel.password().filter(|p| !p.is_empty()) {
                    Some(p) => line.push_str(&format!(
                        "Clients can control a computer with the password {p}"
                    )),
                    None => line.push_str("No computers can be controlled on this channel."),
                }
            }
            info!("{line}");
            true
        })
    }

    /// Looks a channel up by name.
    pub fn find_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.state.lock().channels.get(name).cloned()
    }

    /// Unregisters `channel`.  Called by the channel itself once empty; a
    /// different channel registered under the same name is left alone.
    pub fn remove_channel(&self, channel: &Channel) {
        let remaining = {
            let mut state = self.state.lock();
            match state.channels.get(channel.name()) {
                Some(existing) if std::ptr::eq(Arc::as_ptr(existing), channel) => {
                    state.channels.remove(channel.name());
                    state.channels.len()
                }
                _ => return,
            }
        };

        info!("Channel {} has been removed.", channel.name());
        if remaining == 0 {
            debug!("There are no channels on the server.");
        }
    }

    /// Names of all registered channels, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// Adds `client` to the channel `spec` names, creating it if needed.
    ///
    /// Retries when the channel found is closing or another client created
    /// the same name first.
    pub fn join(&self, client: &Arc<Client>, spec: ChannelSpec) -> Arc<Channel> {
        loop {
            if let Some(channel) = self.find_channel(&spec.name) {
                match channel.add(client, spec.password.as_deref(), &self.motd) {
                    Ok(()) => return channel,
                    Err(ChannelClosed) => continue,
                }
            }
            if let Some(channel) = self.add_channel(spec.clone(), client) {
                return channel;
            }
        }
    }

    /// Produces a key that is not the name of any live channel, or `None`
    /// when every candidate collided.
    pub fn generate_key(&self, source: &mut dyn KeySource) -> Option<String> {
        generate_key(source, |candidate| self.find_channel(candidate).is_some())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
