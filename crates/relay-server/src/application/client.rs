//! A connected protocol participant.
//!
//! A [`Client`] is created by the registry the moment a TLS session is
//! established and lives until the connection driver tears it down.  It holds
//! the client's identity, its mutable protocol state behind a per-client lock,
//! and the sending end of its outbound queue.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!            close() / close_after_flush()
//!   Open ─────────────────────────────────►  Closing ───────────► Closed
//!                                              │   teardown done
//!                   (any number of callers, one transition)
//! ```
//!
//! The reader, writer, keepalive and shutdown paths may all ask for a close at
//! the same time.  Only the first compare-and-set from `Open` wins; every
//! caller also fires the cancellation token so the other tasks stop.  The
//! registry removal and channel leave happen exactly once, in the connection
//! driver, after all tasks have stopped.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use relay_core::protocol::{encode_envelope, ClientId, ClientInfo, Envelope};
use relay_core::Role;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::channel::Channel;

/// An item on a client's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A frame body; the writer appends the terminator.
    Frame(Bytes),
    /// Stop after everything queued before this marker has been written.
    Close,
}

/// Connection state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// Accepting frames in both directions.
    Open = 0,
    /// A close was requested; no new frames are queued.
    Closing = 1,
    /// Teardown finished; the client is no longer registered.
    Closed = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Open,
            1 => Lifecycle::Closing,
            _ => Lifecycle::Closed,
        }
    }
}

/// Mutable protocol state guarded by the per-client lock.
#[derive(Debug, Default)]
struct ClientState {
    role: Role,
    protocol_version: i64,
    authorized: bool,
    /// Non-owning; the channel owns its members, not the other way round.
    channel: Weak<Channel>,
}

/// One connected client.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    ip: String,
    state: Mutex<ClientState>,
    outbound: mpsc::Sender<Outbound>,
    lifecycle: AtomicU8,
    cancel: CancellationToken,
}

impl Client {
    /// Creates a client.  Use [`crate::application::Registry::add_client`]
    /// rather than calling this directly, so the id is allocated properly.
    pub(crate) fn new(
        id: ClientId,
        ip: String,
        outbound: mpsc::Sender<Outbound>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            ip,
            state: Mutex::new(ClientState::default()),
            outbound,
            lifecycle: AtomicU8::new(Lifecycle::Open as u8),
            cancel,
        }
    }

    /// Relay-assigned id, unique for the life of the process.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Remote peer address captured at accept time.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    // ── Protocol state ───────────────────────────────────────────────────────

    /// Role declared by the last `join`.
    pub fn role(&self) -> Role {
        self.state.lock().role
    }

    /// Sets the role.  Only meaningful before the client joins a channel.
    pub fn set_role(&self, role: Role) {
        self.state.lock().role = role;
    }

    /// Protocol version declared by `protocol_version`, 0 if never declared.
    pub fn protocol_version(&self) -> i64 {
        self.state.lock().protocol_version
    }

    /// Records the declared protocol version.
    pub fn set_protocol_version(&self, version: i64) {
        self.state.lock().protocol_version = version;
    }

    /// Whether the client may control slaves in its channel.
    pub fn is_authorized(&self) -> bool {
        self.state.lock().authorized
    }

    /// The channel the client belongs to, if it has joined one that still
    /// exists.
    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.state.lock().channel.upgrade()
    }

    /// `{id, connection_type}` as reported to other members.
    pub fn info(&self) -> ClientInfo {
        ClientInfo::new(self.id, self.role().as_str())
    }

    /// Called by [`Channel`] when the client becomes a member.
    pub(crate) fn enter_channel(&self, channel: &Arc<Channel>, authorized: bool) {
        let mut state = self.state.lock();
        state.channel = Arc::downgrade(channel);
        state.authorized = authorized;
    }

    /// Called by [`Channel`] when the client stops being a member.  Leaves the
    /// reference alone if it already points elsewhere.
    pub(crate) fn leave_channel(&self, channel: &Channel) {
        let mut state = self.state.lock();
        if std::ptr::eq(state.channel.as_ptr(), channel) {
            state.channel = Weak::new();
        }
    }

    // ── Outbound queue ───────────────────────────────────────────────────────

    /// Queues a frame for the writer.
    ///
    /// Returns `false` if the frame was not queued: the client is closing, or
    /// its queue is full.  A full queue means the peer is not reading fast
    /// enough, and the client is closed.
    pub fn send(&self, frame: Bytes) -> bool {
        if self.lifecycle() != Lifecycle::Open || frame.is_empty() {
            return false;
        }
        match self.outbound.try_send(Outbound::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Client {} is not reading fast enough; send buffer full. Closing connection.",
                    self.id
                );
                self.close();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.close();
                false
            }
        }
    }

    /// Encodes and queues a control message.
    pub fn send_envelope(&self, envelope: &Envelope) -> bool {
        match encode_envelope(envelope) {
            Ok(frame) => self.send(frame),
            Err(e) => {
                debug!("JSON encoding error for client {}: {e}", self.id);
                false
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    /// Returns `true` while the client accepts frames.
    pub fn is_open(&self) -> bool {
        self.lifecycle() == Lifecycle::Open
    }

    /// Requests an immediate close.
    ///
    /// Idempotent.  Returns `true` for the call that moved the client out of
    /// [`Lifecycle::Open`].
    pub fn close(&self) -> bool {
        let first = self.begin_closing();
        self.cancel.cancel();
        first
    }

    /// Requests a close once everything already queued has been written.
    ///
    /// Used after one-shot replies such as `generate_key`.  Falls back to an
    /// immediate close if the queue cannot take the marker.
    pub fn close_after_flush(&self) {
        if !self.begin_closing() {
            return;
        }
        if self.outbound.try_send(Outbound::Close).is_err() {
            self.cancel.cancel();
        }
    }

    /// Records that teardown has finished.
    pub(crate) fn mark_closed(&self) {
        self.lifecycle
            .store(Lifecycle::Closed as u8, Ordering::Release);
    }

    /// Token cancelled when the client should stop all its tasks.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn begin_closing(&self) -> bool {
        self.lifecycle
            .compare_exchange(
                Lifecycle::Open as u8,
                Lifecycle::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client(capacity: usize) -> (Client, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        let client = Client::new(1, "127.0.0.1".to_string(), tx, CancellationToken::new());
        (client, rx)
    }

    #[test]
    fn test_new_client_is_open_and_unjoined() {
        let (client, _rx) = make_client(4);
        assert!(client.is_open());
        assert_eq!(client.role(), Role::Unset);
        assert_eq!(client.protocol_version(), 0);
        assert!(client.channel().is_none());
    }

    #[test]
    fn test_send_queues_frame() {
        // Arrange
        let (client, mut rx) = make_client(4);

        // Act
        let queued = client.send(Bytes::from_static(b"{}"));

        // Assert
        assert!(queued);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Frame(Bytes::from_static(b"{}"))
        );
    }

    #[test]
    fn test_empty_frames_are_not_queued() {
        let (client, mut rx) = make_client(4);
        assert!(!client.send(Bytes::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_close_is_idempotent_and_cancels() {
        let (client, _rx) = make_client(4);

        assert!(client.close());
        assert!(!client.close());
        assert!(client.cancellation().is_cancelled());
        assert_eq!(client.lifecycle(), Lifecycle::Closing);
    }

    #[test]
    fn test_send_after_close_is_rejected() {
        let (client, mut rx) = make_client(4);
        client.close();
        assert!(!client.send(Bytes::from_static(b"{}")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_closes_client() {
        // Arrange
        let (client, _rx) = make_client(1);
        assert!(client.send(Bytes::from_static(b"{\"n\":1}")));

        // Act
        let queued = client.send(Bytes::from_static(b"{\"n\":2}"));

        // Assert
        assert!(!queued);
        assert!(!client.is_open());
        assert!(client.cancellation().is_cancelled());
    }

    #[test]
    fn test_close_after_flush_queues_marker_without_cancelling() {
        // Arrange
        let (client, mut rx) = make_client(4);
        client.send(Bytes::from_static(b"{\"type\":\"generate_key\"}"));

        // Act
        client.close_after_flush();

        // Assert
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Frame(_)));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(!client.cancellation().is_cancelled());
        assert!(!client.send(Bytes::from_static(b"{}")));
    }

    #[test]
    fn test_close_after_flush_with_full_queue_cancels() {
        let (client, _rx) = make_client(1);
        client.send(Bytes::from_static(b"{}"));
        client.close_after_flush();
        assert!(client.cancellation().is_cancelled());
    }

    #[test]
    fn test_mark_closed_is_terminal() {
        let (client, _rx) = make_client(1);
        client.close();
        client.mark_closed();
        assert_eq!(client.lifecycle(), Lifecycle::Closed);
        assert!(!client.close());
    }

    #[test]
    fn test_info_reports_role_name() {
        let (client, _rx) = make_client(1);
        client.set_role(Role::Slave);
        assert_eq!(client.info(), ClientInfo::new(1, "slave"));
    }
}
