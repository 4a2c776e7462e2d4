//! PostgreSQL data access.
//!
//! Roles are stored as `TEXT[]` of lowercase role names. Passwords are
//! hashed in-process and only the PHC string reaches the database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use warden_access::{AccessRule, GroupGrants, Operator, RoleSet};
use warden_core::AuditEventId;

use super::password::{hash_password_async, verify_password_async};
use super::{AuditEvent, DataAccess, NewAuditEvent, audit_window};
use crate::error::DataAccessError;

fn decode_roles(values: Vec<String>) -> Result<RoleSet, DataAccessError> {
    RoleSet::parse(values).map_err(|e| DataAccessError::Backend {
        details: format!("invalid stored role: {e}"),
    })
}

fn encode_roles(roles: &RoleSet) -> Vec<String> {
    roles.iter().map(|role| role.as_str().to_string()).collect()
}

/// Row type for access rule queries.
#[derive(FromRow)]
struct RuleRow {
    operator: String,
    template: String,
    roles: Vec<String>,
}

impl RuleRow {
    fn try_into_rule(self) -> Result<AccessRule, DataAccessError> {
        let operator = Operator::from_str(&self.operator).map_err(|e| DataAccessError::Backend {
            details: format!("invalid stored operator: {e}"),
        })?;
        let roles = decode_roles(self.roles)?;
        AccessRule::new(operator, self.template, roles).map_err(|e| DataAccessError::Backend {
            details: format!("invalid stored pattern: {e}"),
        })
    }
}

/// Row type for per-group role queries.
#[derive(FromRow)]
struct GrantRow {
    group_name: String,
    roles: Vec<String>,
}

fn collect_grants(rows: Vec<GrantRow>) -> Result<GroupGrants, DataAccessError> {
    rows.into_iter()
        .map(|row| Ok((row.group_name, decode_roles(row.roles)?)))
        .collect()
}

/// Row type for audit queries.
#[derive(FromRow)]
struct AuditRow {
    id: String,
    event_date: DateTime<Utc>,
    initiator: String,
    kind: String,
    description: String,
    parameters: Vec<String>,
}

impl AuditRow {
    fn try_into_event(self) -> Result<AuditEvent, DataAccessError> {
        let id = AuditEventId::from_str(&self.id).map_err(|e| DataAccessError::Backend {
            details: format!("invalid audit event id '{}': {}", self.id, e),
        })?;

        Ok(AuditEvent {
            id,
            date: self.event_date,
            initiator: self.initiator,
            kind: self.kind,
            description: self.description,
            parameters: self.parameters,
        })
    }
}

async fn require_user(
    tx: &mut Transaction<'_, Postgres>,
    login: &str,
) -> Result<(), DataAccessError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE login = $1)")
        .bind(login)
        .fetch_one(&mut **tx)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(DataAccessError::NotFound {
            login: login.to_string(),
        })
    }
}

/// Data access backed by PostgreSQL.
#[derive(Clone)]
pub struct PgDataAccess {
    pool: PgPool,
}

impl PgDataAccess {
    /// Creates a data access over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataAccess for PgDataAccess {
    async fn validate_user(&self, login: &str, password: &str) -> Result<bool, DataAccessError> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE login = $1")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;

        match hash {
            Some(hash) => verify_password_async(hash, password).await,
            None => Ok(false),
        }
    }

    async fn upsert_user(&self, login: &str, password: &str) -> Result<(), DataAccessError> {
        let hash = hash_password_async(password).await?;

        sqlx::query(
            r#"
            INSERT INTO users (login, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (login) DO UPDATE
            SET password_hash = EXCLUDED.password_hash, updated_at = NOW()
            "#,
        )
        .bind(login)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_user(&self, login: &str) -> Result<(), DataAccessError> {
        let result = sqlx::query("DELETE FROM users WHERE login = $1")
            .bind(login)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataAccessError::NotFound {
                login: login.to_string(),
            });
        }
        Ok(())
    }

    async fn user_exists(&self, login: &str) -> Result<bool, DataAccessError> {
        let exists = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE login = $1)")
            .bind(login)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn resource_groups(&self) -> Result<Vec<String>, DataAccessError> {
        let names = sqlx::query_scalar("SELECT name FROM resource_groups ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn access_rules_for(&self, login: &str) -> Result<Vec<AccessRule>, DataAccessError> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            r#"
            SELECT p.operator, p.template, g.roles
            FROM resource_grants g
            JOIN resource_patterns p ON p.group_name = g.group_name
            WHERE g.login = $1
            ORDER BY g.group_name, p.position
            "#,
        )
        .bind(login)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RuleRow::try_into_rule).collect()
    }

    async fn resource_grants_for(&self, login: &str) -> Result<GroupGrants, DataAccessError> {
        let mut tx = self.pool.begin().await?;
        require_user(&mut tx, login).await?;

        let rows: Vec<GrantRow> = sqlx::query_as(
            r#"
            SELECT group_name, roles
            FROM resource_grants
            WHERE login = $1
            ORDER BY group_name
            "#,
        )
        .bind(login)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        collect_grants(rows)
    }

    async fn grant_resource_access(
        &self,
        login: &str,
        grants: &GroupGrants,
    ) -> Result<(), DataAccessError> {
        // Dropping the transaction on an early return rolls back the batch.
        let mut tx = self.pool.begin().await?;
        require_user(&mut tx, login).await?;

        for (group, roles) in grants.iter() {
            let known: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM resource_groups WHERE name = $1)",
            )
            .bind(group)
            .fetch_one(&mut *tx)
            .await?;
            if !known {
                return Err(DataAccessError::UnknownGroup {
                    group: group.to_string(),
                });
            }

            if roles.is_empty() {
                sqlx::query("DELETE FROM resource_grants WHERE login = $1 AND group_name = $2")
                    .bind(login)
                    .bind(group)
                    .execute(&mut *tx)
                    .await?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO resource_grants (login, group_name, roles)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (login, group_name) DO UPDATE
                    SET roles = EXCLUDED.roles
                    "#,
                )
                .bind(login)
                .bind(group)
                .bind(encode_roles(roles))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_user_group(
        &self,
        creator: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError> {
        let mut tx = self.pool.begin().await?;
        require_user(&mut tx, creator).await?;

        let created = sqlx::query(
            r#"
            INSERT INTO user_groups (name, created_by)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(group)
        .bind(creator)
        .execute(&mut *tx)
        .await?;
        if created.rows_affected() == 0 {
            return Err(DataAccessError::Conflict {
                what: format!("group '{group}'"),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO user_group_members (group_name, login, roles, granted_by)
            VALUES ($1, $2, $3, $2)
            "#,
        )
        .bind(group)
        .bind(creator)
        .bind(encode_roles(roles))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn user_groups_for(&self, login: &str) -> Result<GroupGrants, DataAccessError> {
        let rows: Vec<GrantRow> = sqlx::query_as(
            r#"
            SELECT group_name, roles
            FROM user_group_members
            WHERE login = $1
            ORDER BY group_name
            "#,
        )
        .bind(login)
        .fetch_all(&self.pool)
        .await?;

        collect_grants(rows)
    }

    async fn group_roles_for(&self, login: &str, group: &str) -> Result<RoleSet, DataAccessError> {
        let roles: Option<Vec<String>> = sqlx::query_scalar(
            r#"
            SELECT roles
            FROM user_group_members
            WHERE login = $1 AND group_name = $2
            "#,
        )
        .bind(login)
        .bind(group)
        .fetch_optional(&self.pool)
        .await?;

        roles.map_or_else(|| Ok(RoleSet::none()), decode_roles)
    }

    async fn set_group_roles(
        &self,
        granted_by: &str,
        login: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError> {
        let mut tx = self.pool.begin().await?;
        require_user(&mut tx, login).await?;

        let known: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_groups WHERE name = $1)")
                .bind(group)
                .fetch_one(&mut *tx)
                .await?;
        if !known {
            return Err(DataAccessError::UnknownGroup {
                group: group.to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO user_group_members (group_name, login, roles, granted_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_name, login) DO UPDATE
            SET roles = EXCLUDED.roles, granted_by = EXCLUDED.granted_by, updated_at = NOW()
            "#,
        )
        .bind(group)
        .bind(login)
        .bind(encode_roles(roles))
        .bind(granted_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn revoke_group_member(&self, login: &str, group: &str) -> Result<(), DataAccessError> {
        let mut tx = self.pool.begin().await?;

        let known: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_groups WHERE name = $1)")
                .bind(group)
                .fetch_one(&mut *tx)
                .await?;
        if !known {
            return Err(DataAccessError::UnknownGroup {
                group: group.to_string(),
            });
        }

        let removed =
            sqlx::query("DELETE FROM user_group_members WHERE group_name = $1 AND login = $2")
                .bind(group)
                .bind(login)
                .execute(&mut *tx)
                .await?;
        if removed.rows_affected() == 0 {
            return Err(DataAccessError::NotFound {
                login: login.to_string(),
            });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_user_group(&self, group: &str) -> Result<(), DataAccessError> {
        let result = sqlx::query("DELETE FROM user_groups WHERE name = $1")
            .bind(group)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataAccessError::UnknownGroup {
                group: group.to_string(),
            });
        }
        Ok(())
    }

    async fn log_event(&self, event: NewAuditEvent) -> Result<(), DataAccessError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (id, event_date, initiator, kind, description, parameters)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(AuditEventId::new().to_string())
        .bind(Utc::now())
        .bind(event.initiator)
        .bind(event.kind)
        .bind(event.description)
        .bind(event.parameters)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn audit_events(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AuditEvent>, DataAccessError> {
        let (start, end) = audit_window(from, to);

        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, event_date, initiator, kind, description, parameters
            FROM audit_events
            WHERE event_date >= $1 AND event_date < $2
            ORDER BY event_date ASC, id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRow::try_into_event).collect()
    }
}
