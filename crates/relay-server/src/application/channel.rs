//! A named group of clients and the relay routing between them.
//!
//! A channel keeps three views of its membership: everyone, masters only,
//! and slaves only.  Masters and slaves are subsets of everyone, and a client
//! is in at most one of the two role maps.
//!
//! # Routing (for beginners)
//!
//! ```text
//!   sender role │ receives the payload
//!   ────────────┼──────────────────────────────────────────────
//!   master      │ every slave (only if the master is authorized)
//!   slave       │ every master
//!   unset       │ every other member
//! ```
//!
//! A master whose channel has no slave gets `nvda_not_connected` back.
//!
//! # Lifetime
//!
//! A channel is registered when its first member joins and unregistered,
//! under its own lock, the moment its last member leaves.  A closed channel
//! refuses new members with [`ChannelClosed`]; the registry then creates a
//! fresh one under the same name.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use relay_core::protocol::{ClientId, Envelope, NVDA_NOT_CONNECTED_FRAME};
use relay_core::{encode_envelope, ChannelSpec, Role};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::client::Client;
use crate::application::registry::Registry;
use crate::domain::config::Motd;

/// The channel was emptied and unregistered before the client got in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel was closed before the client could join")]
pub struct ChannelClosed;

/// Membership maps, guarded by the channel lock.
#[derive(Debug, Default)]
struct Members {
    all: BTreeMap<ClientId, Arc<Client>>,
    masters: BTreeMap<ClientId, Arc<Client>>,
    slaves: BTreeMap<ClientId, Arc<Client>>,
    closed: bool,
}

impl Members {
    fn role_map(&mut self, role: Role) -> Option<&mut BTreeMap<ClientId, Arc<Client>>> {
        match role {
            Role::Master => Some(&mut self.masters),
            Role::Slave => Some(&mut self.slaves),
            Role::Unset => None,
        }
    }

    /// Queues `frame` for every member except `exclude`.
    fn broadcast(&self, frame: &Bytes, exclude: Option<ClientId>) {
        for (id, member) in &self.all {
            if Some(*id) != exclude {
                member.send(frame.clone());
            }
        }
    }
}

/// A named multi-party group.
#[derive(Debug)]
pub struct Channel {
    spec: ChannelSpec,
    members: Mutex<Members>,
}

impl Channel {
    fn new(spec: ChannelSpec) -> Self {
        Self {
            spec,
            members: Mutex::new(Members::default()),
        }
    }

    /// Creates a channel, registers it, and admits its first member, all
    /// while holding the new channel's lock so nobody can observe it empty.
    ///
    /// `register` is called with the channel lock held and returns `false`
    /// if the name is already taken, in which case nothing happens and
    /// `None` is returned.
    pub(crate) fn create<F>(
        spec: ChannelSpec,
        first: &Arc<Client>,
        motd: &Motd,
        register: F,
    ) -> Option<Arc<Self>>
    where
        F: FnOnce(&Arc<Channel>) -> bool,
    {
        let supplied = spec.password.clone();
        let channel = Arc::new(Self::new(spec));
        let mut members = channel.members.lock();
        if !register(&channel) {
            return None;
        }
        channel.admit(&mut members, first, supplied.as_deref(), motd);
        drop(members);
        Some(channel)
    }

    /// Channel name (registry key).
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Whether masters need the password to be authorized.
    pub fn is_locked(&self) -> bool {
        self.spec.locked
    }

    /// The shared password, if the channel has one.
    pub fn password(&self) -> Option<&str> {
        self.spec.password.as_deref()
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.lock().all.len()
    }

    /// Ids of all members, ascending.
    pub fn member_ids(&self) -> Vec<ClientId> {
        self.members.lock().all.keys().copied().collect()
    }

    /// Ids of the master members, ascending.
    pub fn master_ids(&self) -> Vec<ClientId> {
        self.members.lock().masters.keys().copied().collect()
    }

    /// Ids of the slave members, ascending.
    pub fn slave_ids(&self) -> Vec<ClientId> {
        self.members.lock().slaves.keys().copied().collect()
    }

    /// Returns `true` once the last member has left.
    pub fn is_closed(&self) -> bool {
        self.members.lock().closed
    }

    // ── Join / leave ─────────────────────────────────────────────────────────

    /// Adds `client` to the channel.
    ///
    /// `supplied` is the password the client presented; it decides
    /// authorization in a locked channel.  The other members are told with
    /// `client_joined`, the joiner gets `channel_joined` followed by the MOTD.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelClosed`] if the channel emptied and was unregistered
    /// before the client got in.
    pub fn add(
        self: &Arc<Self>,
        client: &Arc<Client>,
        supplied: Option<&str>,
        motd: &Motd,
    ) -> Result<(), ChannelClosed> {
        let mut members = self.members.lock();
        if members.closed {
            return Err(ChannelClosed);
        }
        self.admit(&mut members, client, supplied, motd);
        Ok(())
    }

    fn admit(
        self: &Arc<Self>,
        members: &mut MutexGuard<'_, Members>,
        client: &Arc<Client>,
        supplied: Option<&str>,
        motd: &Motd,
    ) {
        let id = client.id();
        let role = client.role();
        let authorized = self.spec.authorizes(supplied);

        if let Some(map) = members.role_map(role) {
            map.entry(id).or_insert_with(|| Arc::clone(client));
        }
        if members.all.contains_key(&id) {
            return;
        }

        let others: Vec<_> = members.all.values().map(|m| m.info()).collect();
        members.all.insert(id, Arc::clone(client));
        client.enter_channel(self, authorized);

        if let Ok(frame) = encode_envelope(&Envelope::client_joined(self.name(), client.info())) {
            members.broadcast(&frame, Some(id));
        }
        client.send_envelope(&Envelope::channel_joined(self.name(), id, others));

        let notice = self.lock_notice(role, authorized);
        if !motd.is_empty() || !notice.is_empty() {
            let (text, force_display) = match (notice.is_empty(), motd.is_empty()) {
                (true, _) => (motd.text.clone(), motd.always_display),
                (false, true) => (notice, true),
                (false, false) => (format!("{notice}\n{}", motd.text), true),
            };
            client.send_envelope(&Envelope::motd(text, force_display));
        }

        let mut line = format!("Client {id} has joined channel {}", self.name());
        if role != Role::Unset {
            let outcome = if authorized { "is" } else { "is not" };
            line.push_str(&format!(
                " as a {role}. This client {outcome} authorized to control other computers"
            ));
        }
        info!("{line}.");
    }

    /// Removes `client` from the channel and tells the remaining members.
    ///
    /// Removing a client that is not a member only clears its channel
    /// reference.  When the last member leaves, the channel is unregistered
    /// from `registry` before the lock is released.
    pub fn remove(&self, client: &Arc<Client>, registry: &Registry) {
        let mut members = self.members.lock();
        let id = client.id();

        members.masters.remove(&id);
        members.slaves.remove(&id);
        let was_member = members.all.remove(&id).is_some();
        client.leave_channel(self);
        if !was_member {
            return;
        }

        if let Ok(frame) = encode_envelope(&Envelope::client_left(client.info())) {
            members.broadcast(&frame, Some(id));
        }
        info!("Client {id} has left channel {}", self.name());

        if members.all.is_empty() && !members.closed {
            members.closed = true;
            registry.remove_channel(self);
        }
    }

    // ── Routing ──────────────────────────────────────────────────────────────

    /// Forwards a relay payload according to the sender's role.
    pub fn send_others(&self, payload: Bytes, sender: &Arc<Client>) {
        let role = sender.role();
        let authorized = sender.is_authorized();

        let targets: Vec<Arc<Client>> = {
            let members = self.members.lock();
            let pool = match role {
                Role::Master => &members.slaves,
                Role::Slave => &members.masters,
                Role::Unset => &members.all,
            };
            pool.values().cloned().collect()
        };

        if targets.is_empty() {
            if role == Role::Master {
                sender.send(Bytes::from_static(NVDA_NOT_CONNECTED_FRAME));
            }
            return;
        }
        if role == Role::Master && !authorized {
            debug!(
                "Dropped message from unauthorized master {} in channel {}",
                sender.id(),
                self.name()
            );
            return;
        }

        for target in targets {
            if !Arc::ptr_eq(&target, sender) {
                target.send(payload.clone());
            }
        }
    }

    /// Queues `payload` for every member except `exclude`.
    pub fn send_all(&self, payload: Bytes, exclude: Option<ClientId>) {
        self.members.lock().broadcast(&payload, exclude);
    }

    /// Explanation sent to joiners of a locked channel; empty when unlocked.
    fn lock_notice(&self, role: Role, authorized: bool) -> String {
        if !self.spec.locked {
            return String::new();
        }
        let mut notice = format!("This is a locked channel. Name: {}\n", self.name());
        let password = self.password().filter(|p| !p.is_empty());
        match role {
            Role::Slave => {
                notice.push_str("No one will be able to control your computer");
                match password {
                    Some(p) => notice.push_str(&format!(
                        " unless they authenticate with the password {p}"
                    )),
                    None => notice.push('.'),
                }
            }
            Role::Master => match password {
                Some(p) if authorized => notice.push_str(&format!(
                    "You are authorized to control any computer connected to this channel. Authorized with password {p}"
                )),
                _ => notice.push_str(
                    "You won't be able to control any computers connected to this channel.",
                ),
            },
            Role::Unset => {}
        }
        notice
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
