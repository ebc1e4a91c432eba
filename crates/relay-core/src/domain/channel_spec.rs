//! Parsing of the channel name a client asks to join.
//!
//! A requested name can carry two markers:
//!
//! ```text
//!  lock_room              → name "room", locked, no password
//!  room__password__s3cr  → name "room", locked, password "s3cr"
//!  lock_room__password__p → name "room", locked, password "p"
//!  room                   → name "room", unlocked
//! ```
//!
//! The lock prefix only counts at the very start of the name.  The password
//! marker only counts when something precedes it, otherwise the name would
//! be empty.

/// Prefix that forces a channel to be locked.
pub const LOCK_PREFIX: &str = "lock_";

/// Separator between the channel name and its password.
pub const PASSWORD_MARKER: &str = "__password__";

/// The effective channel parameters encoded in a requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Registry key of the channel.
    pub name: String,
    /// Shared password; `None` when the name carried no password marker.
    pub password: Option<String>,
    /// Whether masters need the password to be authorized.
    pub locked: bool,
}

impl ChannelSpec {
    /// Applies the lock prefix and then the password marker to `requested`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relay_core::ChannelSpec;
    ///
    /// let spec = ChannelSpec::parse("lock_room__password__p");
    /// assert_eq!(spec.name, "room");
    /// assert_eq!(spec.password.as_deref(), Some("p"));
    /// assert!(spec.locked);
    /// ```
    pub fn parse(requested: &str) -> Self {
        let mut name = requested;
        let mut locked = false;
        let mut password = None;

        if let Some(rest) = name.strip_prefix(LOCK_PREFIX) {
            name = rest;
            locked = true;
        }

        if let Some(pos) = name.find(PASSWORD_MARKER) {
            if pos > 0 {
                password = Some(name[pos + PASSWORD_MARKER.len()..].to_string());
                name = &name[..pos];
                locked = true;
            }
        }

        Self {
            name: name.to_string(),
            password,
            locked,
        }
    }

    /// Whether `supplied` authorizes a client in a channel with these
    /// parameters.
    ///
    /// Unlocked channels authorize everyone.  Locked channels authorize only
    /// a non-empty password equal to the channel's.
    pub fn authorizes(&self, supplied: Option<&str>) -> bool {
        if !self.locked {
            return true;
        }
        match (self.password.as_deref(), supplied) {
            (Some(expected), Some(given)) => !expected.is_empty() && expected == given,
            _ => false,
        }
    }
}
