//! Session record storage keyed by server-issued session ids.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;
use warden_access::SessionRecord;
use warden_core::SessionId;

use crate::error::SessionStoreError;

/// Key-value store for session records with a time-to-live.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `record` under `id` for `ttl`.
    async fn put(
        &self,
        id: &SessionId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionStoreError>;

    /// Returns the live record under `id`.
    ///
    /// Expired records are reported as `NotFound`.
    async fn get(&self, id: &SessionId) -> Result<SessionRecord, SessionStoreError>;

    /// Removes the record under `id`, if any.
    async fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError>;

    /// Removes every expired record, returning how many were removed.
    async fn delete_expired(&self) -> Result<u64, SessionStoreError>;
}

/// Session store over process memory.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, (SessionRecord, DateTime<Utc>)>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        id: &SessionId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let expires_at = Utc::now() + ttl;
        self.sessions
            .write()
            .await
            .insert(id.clone(), (record.clone(), expires_at));
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<SessionRecord, SessionStoreError> {
        let sessions = self.sessions.read().await;
        match sessions.get(id) {
            Some((record, expires_at)) if *expires_at > Utc::now() => Ok(record.clone()),
            _ => Err(SessionStoreError::NotFound),
        }
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    record: serde_json::Value,
}

/// Session store backed by the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a store over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn put(
        &self,
        id: &SessionId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let record = serde_json::to_value(record).map_err(|e| SessionStoreError::Backend {
            details: e.to_string(),
        })?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sessions (id, record, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET record = EXCLUDED.record, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(id.as_str())
        .bind(record)
        .bind(now)
        .bind(now + ttl)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<SessionRecord, SessionStoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT record
            FROM sessions
            WHERE id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(SessionStoreError::NotFound)?;
        serde_json::from_value(row.record).map_err(|e| SessionStoreError::Backend {
            details: format!("invalid session record: {e}"),
        })
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
