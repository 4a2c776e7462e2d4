//! Per-request authorization state of the caller.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::role::RoleSet;

/// Who is calling and what they hold, for the lifetime of one request.
///
/// Global roles come from the rule engine's decision for the request
/// path. Local roles are per user group and are filled in lazily, the
/// first time a processor asks about a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    login: String,
    global_roles: RoleSet,
    #[serde(skip)]
    local_roles: BTreeMap<String, RoleSet>,
}

impl Principal {
    /// Creates an authenticated principal with no roles yet.
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            global_roles: RoleSet::none(),
            local_roles: BTreeMap::new(),
        }
    }

    /// Returns the authenticated login.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Returns the roles granted for the current request path.
    #[must_use]
    pub fn global_roles(&self) -> &RoleSet {
        &self.global_roles
    }

    /// Replaces the global roles.
    pub fn set_global_roles(&mut self, roles: RoleSet) {
        self.global_roles = roles;
    }

    /// Returns the cached local roles in `group`, if already looked up.
    #[must_use]
    pub fn local_roles(&self, group: &str) -> Option<&RoleSet> {
        self.local_roles.get(group)
    }

    /// Caches the local roles held in `group`.
    pub fn set_local_roles(&mut self, group: impl Into<String>, roles: RoleSet) {
        self.local_roles.insert(group.into(), roles);
    }

    /// Returns global roles merged with cached local roles in `group`.
    #[must_use]
    pub fn effective_roles(&self, group: &str) -> RoleSet {
        match self.local_roles.get(group) {
            Some(local) => self.global_roles.union(local),
            None => self.global_roles.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    #[test]
    fn starts_without_roles() {
        let principal = Principal::new("alice");
        assert_eq!(principal.login(), "alice");
        assert!(principal.global_roles().is_empty());
        assert!(principal.local_roles("team").is_none());
    }

    #[test]
    fn effective_roles_merge_global_and_local() {
        let mut principal = Principal::new("alice");
        principal.set_global_roles(RoleSet::from([Role::Reader]));
        principal.set_local_roles("team", RoleSet::from([Role::Admin]));

        assert_eq!(
            principal.effective_roles("team"),
            RoleSet::from([Role::Admin, Role::Reader])
        );
        assert_eq!(principal.effective_roles("other"), RoleSet::from([Role::Reader]));
    }

    #[test]
    fn local_roles_are_scoped_per_group() {
        let mut principal = Principal::new("alice");
        principal.set_local_roles("a", RoleSet::from([Role::Editor]));
        principal.set_local_roles("b", RoleSet::none());

        assert_eq!(principal.local_roles("a"), Some(&RoleSet::from([Role::Editor])));
        assert_eq!(principal.local_roles("b"), Some(&RoleSet::none()));
    }

    #[test]
    fn serializes_login_and_global_roles_only() {
        let mut principal = Principal::new("alice");
        principal.set_global_roles(RoleSet::from([Role::Reader]));
        principal.set_local_roles("team", RoleSet::from([Role::Admin]));

        let json = serde_json::to_string(&principal).expect("serialize");
        assert_eq!(json, r#"{"login":"alice","global_roles":["reader"]}"#);
    }
}
