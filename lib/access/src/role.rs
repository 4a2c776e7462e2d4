//! Role types for resource access and delegation.
//!
//! Roles form a closed set. They carry no implicit hierarchy when rules are
//! matched: holding `root` does not imply holding `admin`. Only grant
//! delegation ranks `root` above `admin`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseRoleError;

/// A role a principal may hold on a resource group or user group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control, including granting `root` to others.
    Root,
    /// May grant any role except `root`.
    Admin,
    /// May modify content.
    Editor,
    /// May read content.
    Reader,
}

impl Role {
    /// Every role, strongest first.
    pub const ALL: [Role; 4] = [Role::Root, Role::Admin, Role::Editor, Role::Reader];

    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Reader => "reader",
        }
    }

    /// Returns true if this role may grant roles to others.
    #[must_use]
    pub fn can_delegate(&self) -> bool {
        matches!(self, Self::Root | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Self::Root),
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "reader" => Ok(Self::Reader),
            other => Err(ParseRoleError {
                value: other.to_string(),
            }),
        }
    }
}

/// An ordered set of roles without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet {
    roles: BTreeSet<Role>,
}

impl RoleSet {
    /// Creates an empty role set (no capability).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a role set holding every role.
    #[must_use]
    pub fn all() -> Self {
        Role::ALL.into_iter().collect()
    }

    /// Parses each value as a role, failing on the first unknown one.
    ///
    /// # Errors
    ///
    /// Returns `ParseRoleError` naming the first value outside the closed set.
    pub fn parse<I, S>(values: I) -> Result<Self, ParseRoleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| value.as_ref().parse::<Role>())
            .collect()
    }

    /// Adds a role, returning true if it was not already present.
    pub fn insert(&mut self, role: Role) -> bool {
        self.roles.insert(role)
    }

    /// Returns true if the set holds `role`.
    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns true if the set holds at least one of `roles`.
    #[must_use]
    pub fn contains_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.contains(*role))
    }

    /// Returns the union of both sets.
    #[must_use]
    pub fn union(&self, other: &RoleSet) -> RoleSet {
        self.roles.union(&other.roles).copied().collect()
    }

    /// Returns true if the set holds no role.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Returns the number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Iterates roles in declaration order (`root` first).
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self {
            roles: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.roles.iter().map(Role::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
