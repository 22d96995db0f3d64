//! # Permission Gate
//!
//! Client-side role check run before any billing mutation.
//!
//! The server enforces authorization too; this gate exists so that a waiter
//! pressing "Close & Print" gets a clear message without a wasted round trip
//! and without half a saga running before the server says no.
//!
//! ```text
//! authorize(Waiter, [Owner, Admin, Manager, Cashier])
//!      │
//!      ▼
//! Denied { role: Waiter } ──► "requires one of Owner, Admin, Manager, Cashier; current role is Waiter"
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Staff roles known to the back office.
///
/// Unknown role names coming from the session are preserved in
/// [`Role::Other`] so that error messages can name them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Cashier,
    Waiter,
    Chef,
    Other(String),
}

/// Roles allowed to close a table and take payment.
pub const BILLING_ROLES: [Role; 4] = [Role::Owner, Role::Admin, Role::Manager, Role::Cashier];

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Owner => "Owner",
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Cashier => "Cashier",
            Role::Waiter => "Waiter",
            Role::Chef => "Chef",
            Role::Other(name) => name,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_lowercase().as_str() {
            "owner" => Role::Owner,
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "cashier" => Role::Cashier,
            "waiter" => Role::Waiter,
            "chef" => Role::Chef,
            _ => Role::Other(trimmed.to_string()),
        })
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|never: Infallible| match never {}))
    }
}

/// The staff member performing the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Actor {
            user_id: user_id.into(),
            name: String::new(),
            role,
        }
    }
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied { role: Role },
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

/// Checks `acting` against the allow-list. `Other` roles never match.
pub fn authorize(acting: &Role, required: &[Role]) -> Authorization {
    let allowed = !matches!(acting, Role::Other(_)) && required.contains(acting);
    if allowed {
        Authorization::Allowed
    } else {
        Authorization::Denied {
            role: acting.clone(),
        }
    }
}

/// Renders a role list for error messages: `Owner, Admin, Manager, Cashier`.
pub fn describe_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Unit Tests
// =============================================================================
