//! Who may grant what to whom.
//!
//! An actor grants roles group by group, and only within groups where they
//! hold `admin` or `root` themselves. `root` is never delegable by a
//! non-root actor, so no grant can raise anyone above the actor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::GrantError;
use crate::role::{Role, RoleSet};

/// Roles held (or requested) per group, keyed by group name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupGrants {
    groups: BTreeMap<String, RoleSet>,
}

impl GroupGrants {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the roles for a group, replacing previous ones.
    pub fn insert(&mut self, group: impl Into<String>, roles: RoleSet) {
        self.groups.insert(group.into(), roles);
    }

    /// Returns the roles held in `group`, if the group is present.
    #[must_use]
    pub fn get(&self, group: &str) -> Option<&RoleSet> {
        self.groups.get(group)
    }

    /// Returns true if no group is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Iterates groups in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleSet)> {
        self.groups.iter().map(|(group, roles)| (group.as_str(), roles))
    }

    /// Iterates group names in order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

impl<G: Into<String>> FromIterator<(G, RoleSet)> for GroupGrants {
    fn from_iter<T: IntoIterator<Item = (G, RoleSet)>>(iter: T) -> Self {
        Self {
            groups: iter
                .into_iter()
                .map(|(group, roles)| (group.into(), roles))
                .collect(),
        }
    }
}

impl IntoIterator for GroupGrants {
    type Item = (String, RoleSet);
    type IntoIter = std::collections::btree_map::IntoIter<String, RoleSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Decides whether an actor holding `actor` may assign `requested`.
///
/// Groups are checked in name order and the first offending group is
/// reported. The check is pure: callers run it before any mutation.
///
/// # Errors
///
/// - `NoAdminAccess` if the actor holds no entry in any group
/// - `UnknownGroup` if a requested group is absent from the actor's map
/// - `InsufficientPrivilege` if the actor lacks `admin`/`root` in a
///   requested group, or requests `root` without holding it there
pub fn may_grant(actor: &GroupGrants, requested: &GroupGrants) -> Result<(), GrantError> {
    if actor.is_empty() {
        return Err(GrantError::NoAdminAccess);
    }

    for (group, roles) in requested.iter() {
        let held = actor.get(group).ok_or_else(|| GrantError::UnknownGroup {
            group: group.to_string(),
        })?;

        if !held.iter().any(|role| role.can_delegate()) {
            return Err(GrantError::InsufficientPrivilege {
                group: group.to_string(),
                reason: "needs admin or root",
            });
        }

        if roles.contains(Role::Root) && !held.contains(Role::Root) {
            return Err(GrantError::InsufficientPrivilege {
                group: group.to_string(),
                reason: "only root may grant root",
            });
        }
    }

    Ok(())
}
