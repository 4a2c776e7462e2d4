//! In-memory data access, for running without a database and for tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use warden_access::{AccessRule, GroupGrants, PathPattern, RoleSet};
use warden_core::AuditEventId;

use super::password::{hash_password_async, verify_password_async};
use super::{AuditEvent, DataAccess, NewAuditEvent, audit_window, default_resource_groups};
use crate::error::DataAccessError;

#[derive(Default)]
struct Inner {
    /// login -> argon2 PHC hash
    users: BTreeMap<String, String>,
    /// resource group -> ordered patterns
    resource_groups: BTreeMap<String, Vec<PathPattern>>,
    /// login -> resource group -> roles
    resource_grants: BTreeMap<String, BTreeMap<String, RoleSet>>,
    /// user group -> login -> local roles
    user_groups: BTreeMap<String, BTreeMap<String, RoleSet>>,
    audit: Vec<AuditEvent>,
}

impl Inner {
    fn require_user(&self, login: &str) -> Result<(), DataAccessError> {
        if self.users.contains_key(login) {
            Ok(())
        } else {
            Err(DataAccessError::NotFound {
                login: login.to_string(),
            })
        }
    }
}

/// Data access over process memory. Contents are lost on exit.
pub struct MemoryDataAccess {
    inner: RwLock<Inner>,
}

impl MemoryDataAccess {
    /// Creates a store holding the default resource groups and nothing else.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for (name, patterns) in default_resource_groups() {
            inner.resource_groups.insert(name.to_string(), patterns);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Adds (or replaces) a resource group.
    #[must_use]
    pub fn with_resource_group(mut self, name: impl Into<String>, patterns: Vec<PathPattern>) -> Self {
        self.inner
            .get_mut()
            .resource_groups
            .insert(name.into(), patterns);
        self
    }
}

impl Default for MemoryDataAccess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAccess for MemoryDataAccess {
    async fn validate_user(&self, login: &str, password: &str) -> Result<bool, DataAccessError> {
        // Verify without holding the lock.
        let hash = self.inner.read().await.users.get(login).cloned();
        match hash {
            Some(hash) => verify_password_async(hash, password).await,
            None => Ok(false),
        }
    }

    async fn upsert_user(&self, login: &str, password: &str) -> Result<(), DataAccessError> {
        let hash = hash_password_async(password).await?;
        self.inner.write().await.users.insert(login.to_string(), hash);
        Ok(())
    }

    async fn delete_user(&self, login: &str) -> Result<(), DataAccessError> {
        let mut inner = self.inner.write().await;
        inner.require_user(login)?;

        inner.users.remove(login);
        inner.resource_grants.remove(login);
        for members in inner.user_groups.values_mut() {
            members.remove(login);
        }
        Ok(())
    }

    async fn user_exists(&self, login: &str) -> Result<bool, DataAccessError> {
        Ok(self.inner.read().await.users.contains_key(login))
    }

    async fn resource_groups(&self) -> Result<Vec<String>, DataAccessError> {
        Ok(self.inner.read().await.resource_groups.keys().cloned().collect())
    }

    async fn access_rules_for(&self, login: &str) -> Result<Vec<AccessRule>, DataAccessError> {
        let inner = self.inner.read().await;
        let Some(grants) = inner.resource_grants.get(login) else {
            return Ok(Vec::new());
        };

        let rules = grants
            .iter()
            .filter_map(|(group, roles)| {
                inner
                    .resource_groups
                    .get(group)
                    .map(|patterns| (patterns, roles))
            })
            .flat_map(|(patterns, roles)| {
                patterns
                    .iter()
                    .map(move |pattern| pattern.clone().with_roles(roles.clone()))
            })
            .collect();
        Ok(rules)
    }

    async fn resource_grants_for(&self, login: &str) -> Result<GroupGrants, DataAccessError> {
        let inner = self.inner.read().await;
        inner.require_user(login)?;

        Ok(inner
            .resource_grants
            .get(login)
            .map(|grants| {
                grants
                    .iter()
                    .map(|(group, roles)| (group.clone(), roles.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn grant_resource_access(
        &self,
        login: &str,
        grants: &GroupGrants,
    ) -> Result<(), DataAccessError> {
        let mut inner = self.inner.write().await;
        inner.require_user(login)?;

        // Validate the whole batch before touching anything.
        if let Some(group) = grants
            .groups()
            .find(|group| !inner.resource_groups.contains_key(*group))
        {
            return Err(DataAccessError::UnknownGroup {
                group: group.to_string(),
            });
        }

        let held = inner.resource_grants.entry(login.to_string()).or_default();
        for (group, roles) in grants.iter() {
            if roles.is_empty() {
                held.remove(group);
            } else {
                held.insert(group.to_string(), roles.clone());
            }
        }
        Ok(())
    }

    async fn create_user_group(
        &self,
        creator: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError> {
        let mut inner = self.inner.write().await;
        inner.require_user(creator)?;
        if inner.user_groups.contains_key(group) {
            return Err(DataAccessError::Conflict {
                what: format!("group '{group}'"),
            });
        }

        let members = BTreeMap::from([(creator.to_string(), roles.clone())]);
        inner.user_groups.insert(group.to_string(), members);
        Ok(())
    }

    async fn user_groups_for(&self, login: &str) -> Result<GroupGrants, DataAccessError> {
        let inner = self.inner.read().await;
        Ok(inner
            .user_groups
            .iter()
            .filter_map(|(group, members)| {
                members
                    .get(login)
                    .map(|roles| (group.clone(), roles.clone()))
            })
            .collect())
    }

    async fn group_roles_for(&self, login: &str, group: &str) -> Result<RoleSet, DataAccessError> {
        let inner = self.inner.read().await;
        Ok(inner
            .user_groups
            .get(group)
            .and_then(|members| members.get(login))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_group_roles(
        &self,
        _granted_by: &str,
        login: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError> {
        let mut inner = self.inner.write().await;
        inner.require_user(login)?;
        let members = inner
            .user_groups
            .get_mut(group)
            .ok_or_else(|| DataAccessError::UnknownGroup {
                group: group.to_string(),
            })?;
        members.insert(login.to_string(), roles.clone());
        Ok(())
    }

    async fn revoke_group_member(&self, login: &str, group: &str) -> Result<(), DataAccessError> {
        let mut inner = self.inner.write().await;
        let members = inner
            .user_groups
            .get_mut(group)
            .ok_or_else(|| DataAccessError::UnknownGroup {
                group: group.to_string(),
            })?;
        members
            .remove(login)
            .map(|_| ())
            .ok_or_else(|| DataAccessError::NotFound {
                login: login.to_string(),
            })
    }

    async fn delete_user_group(&self, group: &str) -> Result<(), DataAccessError> {
        self.inner
            .write()
            .await
            .user_groups
            .remove(group)
            .map(|_| ())
            .ok_or_else(|| DataAccessError::UnknownGroup {
                group: group.to_string(),
            })
    }

    async fn log_event(&self, event: NewAuditEvent) -> Result<(), DataAccessError> {
        let record = AuditEvent {
            id: AuditEventId::new(),
            date: Utc::now(),
            initiator: event.initiator,
            kind: event.kind,
            description: event.description,
            parameters: event.parameters,
        };
        self.inner.write().await.audit.push(record);
        Ok(())
    }

    async fn audit_events(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AuditEvent>, DataAccessError> {
        let (start, end) = audit_window(from, to);
        let inner = self.inner.read().await;
        Ok(inner
            .audit
            .iter()
            .filter(|event| event.date >= start && event.date < end)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_access::{Operator, Role};

    fn pattern(operator: Operator, template: &str) -> PathPattern {
        PathPattern::new(operator, template).expect("pattern")
    }

    fn grants(entries: &[(&str, &[Role])]) -> GroupGrants {
        entries
            .iter()
            .map(|(group, roles)| (*group, roles.iter().copied().collect::<RoleSet>()))
            .collect()
    }

    async fn store_with_user(login: &str) -> MemoryDataAccess {
        let store = MemoryDataAccess::new()
            .with_resource_group("docs", vec![pattern(Operator::StartsWith, "/docs")]);
        store.upsert_user(login, "password1").await.expect("upsert");
        store
    }

    #[tokio::test]
    async fn validates_only_matching_password() {
        let store = store_with_user("alice").await;
        assert!(store.validate_user("alice", "password1").await.expect("validate"));
        assert!(!store.validate_user("alice", "password2").await.expect("validate"));
        assert!(!store.validate_user("nobody", "password1").await.expect("validate"));
    }

    #[tokio::test]
    async fn upsert_replaces_password() {
        let store = store_with_user("alice").await;
        store.upsert_user("alice", "changed1").await.expect("upsert");
        assert!(store.validate_user("alice", "changed1").await.expect("validate"));
        assert!(!store.validate_user("alice", "password1").await.expect("validate"));
    }

    #[tokio::test]
    async fn access_rules_carry_group_roles_in_group_order() {
        let store = store_with_user("alice").await;
        store
            .grant_resource_access(
                "alice",
                &grants(&[("docs", &[Role::Reader]), ("admin", &[Role::Admin])]),
            )
            .await
            .expect("grant");

        let rules = store.access_rules_for("alice").await.expect("rules");
        let templates: Vec<&str> = rules.iter().map(AccessRule::template).collect();
        assert_eq!(templates, vec!["/admin/", "/docs"]);
        assert_eq!(rules[1].roles(), &RoleSet::from([Role::Reader]));
    }

    #[tokio::test]
    async fn grant_batch_is_all_or_nothing() {
        let store = store_with_user("alice").await;
        let err = store
            .grant_resource_access(
                "alice",
                &grants(&[("docs", &[Role::Reader]), ("missing", &[Role::Reader])]),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DataAccessError::UnknownGroup {
                group: "missing".to_string()
            }
        );
        assert!(store.resource_grants_for("alice").await.expect("grants").is_empty());
    }

    #[tokio::test]
    async fn empty_roles_remove_a_grant() {
        let store = store_with_user("alice").await;
        store
            .grant_resource_access("alice", &grants(&[("docs", &[Role::Reader])]))
            .await
            .expect("grant");
        store
            .grant_resource_access("alice", &grants(&[("docs", &[])]))
            .await
            .expect("grant");

        assert!(store.access_rules_for("alice").await.expect("rules").is_empty());
    }

    #[tokio::test]
    async fn grants_for_unknown_user_are_not_found() {
        let store = MemoryDataAccess::new();
        assert!(matches!(
            store.resource_grants_for("ghost").await,
            Err(DataAccessError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn deleting_user_drops_grants_and_memberships() {
        let store = store_with_user("alice").await;
        store.upsert_user("bobby", "password1").await.expect("upsert");
        store
            .grant_resource_access("alice", &grants(&[("docs", &[Role::Reader])]))
            .await
            .expect("grant");
        store
            .create_user_group("bobby", "team", &RoleSet::from([Role::Admin]))
            .await
            .expect("create");
        store
            .set_group_roles("bobby", "alice", "team", &RoleSet::from([Role::Reader]))
            .await
            .expect("set");

        store.delete_user("alice").await.expect("delete");

        assert!(!store.user_exists("alice").await.expect("exists"));
        assert!(store.access_rules_for("alice").await.expect("rules").is_empty());
        assert!(store.group_roles_for("alice", "team").await.expect("roles").is_empty());
        assert!(matches!(
            store.delete_user("alice").await,
            Err(DataAccessError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn user_group_lifecycle() {
        let store = store_with_user("alice").await;
        store.upsert_user("bobby", "password1").await.expect("upsert");

        store
            .create_user_group("alice", "team", &RoleSet::from([Role::Admin, Role::Reader]))
            .await
            .expect("create");
        assert!(matches!(
            store
                .create_user_group("alice", "team", &RoleSet::none())
                .await,
            Err(DataAccessError::Conflict { .. })
        ));

        store
            .set_group_roles("alice", "bobby", "team", &RoleSet::from([Role::Editor]))
            .await
            .expect("set");
        assert_eq!(
            store.group_roles_for("bobby", "team").await.expect("roles"),
            RoleSet::from([Role::Editor])
        );
        assert_eq!(store.user_groups_for("bobby").await.expect("groups").len(), 1);

        store.revoke_group_member("bobby", "team").await.expect("revoke");
        assert!(store.user_groups_for("bobby").await.expect("groups").is_empty());

        store.delete_user_group("team").await.expect("delete");
        assert!(matches!(
            store.delete_user_group("team").await,
            Err(DataAccessError::UnknownGroup { .. })
        ));
    }

    #[tokio::test]
    async fn set_group_roles_requires_existing_group_and_user() {
        let store = store_with_user("alice").await;
        assert!(matches!(
            store
                .set_group_roles("alice", "alice", "nope", &RoleSet::none())
                .await,
            Err(DataAccessError::UnknownGroup { .. })
        ));

        store
            .create_user_group("alice", "team", &RoleSet::none())
            .await
            .expect("create");
        assert!(matches!(
            store
                .set_group_roles("alice", "ghost", "team", &RoleSet::none())
                .await,
            Err(DataAccessError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn audit_events_are_filtered_by_day() {
        let store = MemoryDataAccess::new();
        let today = Utc::now().date_naive();
        store
            .log_event(
                NewAuditEvent::new("alice", "groups", "user alice creates group team")
                    .with_parameters(vec!["team".to_string()]),
            )
            .await
            .expect("log");

        let tomorrow = today.succ_opt().expect("date");
        let events = store.audit_events(today, tomorrow).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].initiator, "alice");
        assert_eq!(events[0].parameters, vec!["team".to_string()]);

        let yesterday = today.pred_opt().expect("date");
        assert!(store
            .audit_events(yesterday, yesterday)
            .await
            .expect("events")
            .is_empty());
    }
}
