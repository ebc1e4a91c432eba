//! The role a client plays inside a channel.

use std::fmt;

/// Role declared through the `connection_type` field of `join`.
///
/// Routing depends on it: masters talk to slaves, slaves talk to masters, and
/// a client with no role talks to everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// No (or an unrecognized) `connection_type` was given.
    #[default]
    Unset,
    /// The controlling side.
    Master,
    /// The controlled side.
    Slave,
}

impl Role {
    /// Wire name for masters.
    pub const MASTER: &'static str = "master";
    /// Wire name for slaves.
    pub const SLAVE: &'static str = "slave";

    /// Parses a `connection_type` value.  Anything other than the two known
    /// names maps to [`Role::Unset`].
    pub fn from_connection_type(value: &str) -> Self {
        match value {
            Self::MASTER => Role::Master,
            Self::SLAVE => Role::Slave,
            _ => Role::Unset,
        }
    }

    /// The `connection_type` string reported to other members.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unset => "",
            Role::Master => Self::MASTER,
            Role::Slave => Self::SLAVE,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_connection_types_parse() {
        assert_eq!(Role::from_connection_type("master"), Role::Master);
        assert_eq!(Role::from_connection_type("slave"), Role::Slave);
    }

    #[test]
    fn test_unknown_connection_types_are_unset() {
        assert_eq!(Role::from_connection_type(""), Role::Unset);
        assert_eq!(Role::from_connection_type("Master"), Role::Unset);
        assert_eq!(Role::from_connection_type("observer"), Role::Unset);
    }

    #[test]
    fn test_as_str_matches_wire_names() {
        for role in [Role::Unset, Role::Master, Role::Slave] {
            assert_eq!(Role::from_connection_type(role.as_str()), role);
        }
    }
}
