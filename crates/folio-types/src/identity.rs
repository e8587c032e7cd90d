//! Authenticated user identity carried through a chat session.
//!
//! The role is resolved once at authentication time and travels with the
//! identity, so downstream code never re-derives "is this an admin" from
//! scattered flags.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Role of an authenticated user.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('regular', 'admin'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Regular,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Regular => write!(f, "regular"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regular" => Ok(Role::Regular),
            "admin" => Ok(Role::Admin),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Regular
    }
}

/// An authenticated user: stable id, display name, resolved role.
///
/// Produced by the auth layer when a bearer token is verified. Connections
/// without a resolvable identity are rejected before any channel join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl UserIdentity {
    pub fn new(id: i64, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Regular, Role::Admin] {
            let s = role.to_string();
            let parsed: Role = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let parsed: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Role::Admin);
    }

    #[test]
    fn test_invalid_role_rejected() {
        assert!("staff".parse::<Role>().is_err());
    }

    #[test]
    fn test_is_admin() {
        assert!(UserIdentity::new(1, "ops", Role::Admin).is_admin());
        assert!(!UserIdentity::new(2, "alice", Role::Regular).is_admin());
    }
}
