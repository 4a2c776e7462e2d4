//! Endpoints under `/root`: user deletion and the audit log.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use warden_access::validate::{is_audit_date, is_username};

use super::{audit, refuse, required_param};
use crate::error::{ApiError, PipelineError};
use crate::pipeline::{HandlerContext, Processor};
use crate::store::NewAuditEvent;

/// Deletes the user named in the path. Callers cannot delete themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteUser;

#[async_trait]
impl Processor for DeleteUser {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(username) = required_param(ctx, "username") else {
            return Ok(());
        };
        if !is_username(&username) {
            ctx.reject(ApiError::InvalidFormat { field: "username" });
            return Ok(());
        }

        let actor = ctx.login()?;
        if actor == username {
            ctx.reject(ApiError::BadRequest {
                reason: "cannot delete your own account".to_string(),
            });
            return Ok(());
        }

        if let Err(err) = ctx.data().delete_user(&username).await {
            return refuse(ctx, err);
        }

        tracing::info!(actor = %actor, login = %username, "user deleted");
        audit(
            ctx,
            NewAuditEvent::new(&actor, "root", format!("user {actor} deletes user {username}")),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "delete-user"
    }
}

/// Inclusive date range of an audit query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AuditRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl AuditRange {
    /// Reads `from` and `to` (`YYYYMMDD`) from query pairs.
    ///
    /// Absent bounds default to the epoch and today. Any other parameter,
    /// a repeated one, a badly shaped date or `from > to` is refused.
    fn parse(pairs: &[(String, String)], today: NaiveDate) -> Result<Self, String> {
        let mut from = None;
        let mut to = None;

        for (name, value) in pairs {
            let slot = match name.as_str() {
                "from" => &mut from,
                "to" => &mut to,
                other => return Err(format!("unexpected parameter {other}")),
            };
            if slot.is_some() {
                return Err(format!("parameter {name} given more than once"));
            }
            *slot = Some(parse_date(value).ok_or_else(|| format!("invalid date for {name}"))?);
        }

        let range = Self {
            from: from.unwrap_or(DateTime::UNIX_EPOCH.date_naive()),
            to: to.unwrap_or(today),
        };
        if range.from > range.to {
            return Err("from is after to".to_string());
        }
        Ok(range)
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if !is_audit_date(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").ok()
}

/// Answers the audit records of a date range as a JSON list.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLog;

#[async_trait]
impl Processor for AuditLog {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let range = ctx
            .request()
            .query_pairs()
            .map_err(|err| err.body_text())
            .and_then(|pairs| AuditRange::parse(&pairs, Utc::now().date_naive()));
        let range = match range {
            Ok(range) => range,
            Err(reason) => {
                ctx.reject(ApiError::BadRequest { reason });
                return Ok(());
            }
        };

        match ctx.data().audit_events(range.from, range.to).await {
            Ok(events) => ctx.respond_json(StatusCode::OK, &events)?,
            Err(err) => refuse(ctx, err)?,
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "audit-log"
    }
}
