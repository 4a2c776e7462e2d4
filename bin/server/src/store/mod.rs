//! Storage collaborators: users, grants, groups, audit log and sessions.
//!
//! Processors only ever see the [`DataAccess`] and [`SessionStore`]
//! traits. Both have an in-memory implementation, used when no database
//! is configured and in tests, and a PostgreSQL implementation.

pub mod memory;
pub mod password;
pub mod postgres;
pub mod session;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use warden_access::{AccessRule, GroupGrants, Operator, PathPattern, RoleSet};
use warden_core::AuditEventId;

use crate::error::DataAccessError;

pub use memory::MemoryDataAccess;
pub use postgres::PgDataAccess;
pub use session::{MemorySessionStore, PgSessionStore, SessionStore};

/// An audit record to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEvent {
    pub initiator: String,
    pub kind: String,
    pub description: String,
    pub parameters: Vec<String>,
}

impl NewAuditEvent {
    /// Creates an event without parameters.
    #[must_use]
    pub fn new(
        initiator: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            initiator: initiator.into(),
            kind: kind.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Attaches parameters to the event.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A stored audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub date: DateTime<Utc>,
    pub initiator: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub parameters: Vec<String>,
}

/// Users, grants, groups and the audit log.
///
/// Implementations are shared by every request and must tolerate
/// concurrent reads and writes.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Returns true if `login` exists and `password` is theirs.
    async fn validate_user(&self, login: &str, password: &str) -> Result<bool, DataAccessError>;

    /// Creates `login` with `password`, or replaces the password.
    async fn upsert_user(&self, login: &str, password: &str) -> Result<(), DataAccessError>;

    /// Deletes `login` with every grant and membership they hold.
    async fn delete_user(&self, login: &str) -> Result<(), DataAccessError>;

    /// Returns true if `login` exists.
    async fn user_exists(&self, login: &str) -> Result<bool, DataAccessError>;

    /// Returns the names of all resource groups, in name order.
    async fn resource_groups(&self) -> Result<Vec<String>, DataAccessError>;

    /// Returns the access rules of `login`: every pattern of every resource
    /// group they hold roles in, in group name order then pattern order.
    async fn access_rules_for(&self, login: &str) -> Result<Vec<AccessRule>, DataAccessError>;

    /// Returns the roles `login` holds per resource group.
    async fn resource_grants_for(&self, login: &str) -> Result<GroupGrants, DataAccessError>;

    /// Sets the roles of `login` in each named resource group, atomically.
    /// An empty role set removes the grant for that group.
    async fn grant_resource_access(
        &self,
        login: &str,
        grants: &GroupGrants,
    ) -> Result<(), DataAccessError>;

    /// Creates user group `group` with `creator` as its first member.
    async fn create_user_group(
        &self,
        creator: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError>;

    /// Returns the user groups of `login` with their local roles.
    async fn user_groups_for(&self, login: &str) -> Result<GroupGrants, DataAccessError>;

    /// Returns the local roles of `login` in `group`, empty if not a member.
    async fn group_roles_for(&self, login: &str, group: &str) -> Result<RoleSet, DataAccessError>;

    /// Adds `login` to `group` or replaces their local roles.
    async fn set_group_roles(
        &self,
        granted_by: &str,
        login: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError>;

    /// Removes `login` from `group`.
    async fn revoke_group_member(&self, login: &str, group: &str) -> Result<(), DataAccessError>;

    /// Deletes user group `group` and its memberships.
    async fn delete_user_group(&self, group: &str) -> Result<(), DataAccessError>;

    /// Appends an audit record.
    async fn log_event(&self, event: NewAuditEvent) -> Result<(), DataAccessError>;

    /// Returns audit records dated from `from` through `to`, oldest first.
    async fn audit_events(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AuditEvent>, DataAccessError>;
}

/// Resource groups every fresh store starts with, covering the built-in
/// endpoints.
#[must_use]
pub fn default_resource_groups() -> Vec<(&'static str, Vec<PathPattern>)> {
    let pattern = |operator, template: &str| PathPattern::new(operator, template).ok();
    let groups = [
        ("admin", vec![pattern(Operator::StartsWith, "/admin/")]),
        (
            "groups",
            vec![
                pattern(Operator::Equals, "/groups"),
                pattern(Operator::StartsWith, "/groups/"),
            ],
        ),
        ("root", vec![pattern(Operator::StartsWith, "/root/")]),
        ("self", vec![pattern(Operator::StartsWith, "/self/")]),
    ];

    groups
        .into_iter()
        .map(|(name, patterns)| (name, patterns.into_iter().flatten().collect()))
        .collect()
}

/// Returns the window `[from 00:00, to + 1 day 00:00)` in UTC.
pub(crate) fn audit_window(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = from.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = to
        .succ_opt()
        .unwrap_or(NaiveDate::MAX)
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    (start, end)
}
