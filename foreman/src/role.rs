//! Caller roles and tool access levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Privilege level of an authenticated caller.
///
/// The role scopes the visible tools, the history cap of private sessions
/// and the model variant used for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Team lead; may use every tool.
    Owner,
    /// Operator; may use privileged tools.
    Admin,
    /// Restricted caller; open tools only.
    Tester,
}

impl Role {
    /// All roles, most privileged first.
    pub const ALL: [Self; 3] = [Self::Owner, Self::Admin, Self::Tester];

    /// Get the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Tester => "tester",
        }
    }

    /// Whether this role satisfies the given access level.
    #[must_use]
    pub const fn allows(self, access: Access) -> bool {
        match access {
            Access::Open => true,
            Access::Privileged => matches!(self, Self::Owner | Self::Admin),
            Access::OwnerOnly => matches!(self, Self::Owner),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "tester" => Ok(Self::Tester),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Static permission classification of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Anyone may call it.
    Open,
    /// Admins and the owner.
    Privileged,
    /// The owner only.
    OwnerOnly,
}

impl Access {
    /// Fixed error message returned when a caller lacks this level.
    #[must_use]
    pub const fn denial_message(self) -> &'static str {
        match self {
            Self::Open | Self::Privileged => "Insufficient permissions",
            Self::OwnerOnly => "Only the owner can do this",
        }
    }
}
