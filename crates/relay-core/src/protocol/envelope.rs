//! JSON message envelope exchanged between the relay and its clients.
//!
//! Every control message is a JSON object discriminated by its `type` field.
//! All other fields are optional and only serialized when they carry a
//! non-default value, so a `ping` is exactly `{"type":"ping"}` on the wire.
//!
//! # Which messages go where (for beginners)
//!
//! ```text
//!  client ──► relay                      relay ──► client
//!  ───────────────                      ────────────────
//!  join {channel, connection_type}      channel_joined   (reply to joiner)
//!  protocol_version {version}           client_joined    (to other members)
//!  generate_key {}                      client_left      (to other members)
//!                                       motd             (after channel_joined)
//!                                       generate_key {key}
//!                                       error {error}
//!                                       nvda_not_connected
//!                                       ping
//! ```
//!
//! Once a client has joined a channel the relay stops interpreting its
//! frames: they are forwarded byte-for-byte (optionally with an `origin`
//! field added), so relay payloads never pass through this type.

use serde::{Deserialize, Serialize};

/// Identifier the relay assigns to a connected client.
///
/// Ids start at 1 and increase monotonically for the life of the process.
pub type ClientId = u64;

// ── Message kinds ─────────────────────────────────────────────────────────────

/// Value of the `type` field for each system message.
pub mod kind {
    /// Keepalive sent by the relay after an idle period.
    pub const PING: &str = "ping";
    /// Client request to join (or create) a channel.
    pub const JOIN: &str = "join";
    /// Client declaration of the protocol version it speaks.
    pub const PROTOCOL_VERSION: &str = "protocol_version";
    /// Client request for a fresh, unused channel key (and the reply to it).
    pub const GENERATE_KEY: &str = "generate_key";
    /// Broadcast to existing members when someone joins.
    pub const CLIENT_JOINED: &str = "client_joined";
    /// Unicast reply to the joiner listing the current members.
    pub const CHANNEL_JOINED: &str = "channel_joined";
    /// Broadcast to remaining members when someone leaves.
    pub const CLIENT_LEFT: &str = "client_left";
    /// Message of the day, sent right after `channel_joined`.
    pub const MOTD: &str = "motd";
    /// Protocol error report.
    pub const ERROR: &str = "error";
    /// Sent to a master whose channel has no slave to receive its message.
    pub const NVDA_NOT_CONNECTED: &str = "nvda_not_connected";
}

/// Machine-readable codes carried in the `error` field of an error message.
pub mod error_code {
    /// The client sent `join` while already a member of a channel.
    pub const ALREADY_JOINED: &str = "already_joined";
    /// A required field was missing, empty, or out of range.
    pub const INVALID_PARAMETERS: &str = "invalid_parameters";
    /// The `type` field named a command the relay does not know.
    pub const UNKNOWN_COMMAND: &str = "unknown_command";
    /// No unused channel key could be found within the retry budget.
    pub const KEY_UNAVAILABLE: &str = "key_unavailable";
}

/// Exact keepalive frame body (without the terminator).
pub const PING_FRAME: &[u8] = br#"{"type":"ping"}"#;

/// Exact body of the reply sent to a master with no slave peers.
pub const NVDA_NOT_CONNECTED_FRAME: &[u8] = br#"{"type":"nvda_not_connected"}"#;

// ── Envelope ──────────────────────────────────────────────────────────────────

/// A channel member as described in `clients` / `client` fields.
///
/// Unlike the envelope fields, both members are always serialized, so a
/// client that joined without a role shows up as `"connection_type":""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// The member's relay-assigned id.
    pub id: ClientId,
    /// The role the member declared when joining (`master`, `slave`, or empty).
    #[serde(default)]
    pub connection_type: String,
}

impl ClientInfo {
    /// Creates a member description.
    pub fn new(id: ClientId, connection_type: impl Into<String>) -> Self {
        Self {
            id,
            connection_type: connection_type.into(),
        }
    }
}

/// One control message.
///
/// Decoding is lenient about unknown fields (they are ignored) and about
/// missing fields (they take their default).  A missing `type` decodes to an
/// empty `kind`, which the command dispatcher rejects explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message discriminator (`type` on the wire).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Channel name, for `join` and membership notifications.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,

    /// Role the sender declares on `join`: `master` or `slave`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connection_type: String,

    /// Protocol version declared by `protocol_version`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: i64,

    /// Id of the client a message originates from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ClientId>,

    /// Generated channel key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    /// Id of the client a membership notification is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ClientId>,

    /// Ids of the other members, ascending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<ClientId>,

    /// The other members with their roles, ascending by id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clients: Vec<ClientInfo>,

    /// The member a `client_joined` / `client_left` is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientInfo>,

    /// Error code, see [`error_code`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// Message of the day text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub motd: String,

    /// Whether the client must show the MOTD even if it has seen it before.
    #[serde(default, skip_serializing_if = "is_false")]
    pub force_display: bool,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Envelope {
    /// Creates an envelope carrying only a `type`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// `{"type":"error","error":<code>}`
    pub fn error(code: &str) -> Self {
        Self {
            error: code.to_string(),
            ..Self::new(kind::ERROR)
        }
    }

    /// `{"type":"generate_key","key":<key>}`
    pub fn generated_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::new(kind::GENERATE_KEY)
        }
    }

    /// Notification to existing members that `member` joined `channel`.
    pub fn client_joined(channel: &str, member: ClientInfo) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: Some(member.id),
            client: Some(member),
            ..Self::new(kind::CLIENT_JOINED)
        }
    }

    /// Reply to a joiner describing the members already present.
    ///
    /// `others` must not contain the joiner; it is sorted here so callers can
    /// pass members in map order.
    pub fn channel_joined(channel: &str, joiner: ClientId, mut others: Vec<ClientInfo>) -> Self {
        others.sort_by_key(|c| c.id);
        Self {
            channel: channel.to_string(),
            origin: Some(joiner),
            user_ids: others.iter().map(|c| c.id).collect(),
            clients: others,
            ..Self::new(kind::CHANNEL_JOINED)
        }
    }

    /// Notification to remaining members that `member` left.
    pub fn client_left(member: ClientInfo) -> Self {
        Self {
            user_id: Some(member.id),
            origin: Some(member.id),
            client: Some(member),
            ..Self::new(kind::CLIENT_LEFT)
        }
    }

    /// Message of the day frame.
    pub fn motd(text: impl Into<String>, force_display: bool) -> Self {
        Self {
            motd: text.into(),
            force_display,
            ..Self::new(kind::MOTD)
        }
    }

    /// Returns `true` if the `type` field was absent or empty.
    pub fn is_untyped(&self) -> bool {
        self.kind.is_empty()
    }
}
