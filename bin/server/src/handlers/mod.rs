//! Endpoint processors.
//!
//! Each processor runs last in its pipeline, after authentication and
//! authorization, and always leaves a response behind. Refusals go
//! through [`ApiError`]; only collaborator faults escape as errors.

pub mod admin;
pub mod groups;
pub mod root;
pub mod user;

pub use admin::{CreateUser, DecodeGrantRequest, EditRoles, ListRoles};
pub use groups::{CreateGroup, DeleteGroup, ListGroups, RevokeMember, UpsertMember};
pub use root::{AuditLog, DeleteUser};
pub use user::{ChangePassword, WhoAmI};

use crate::error::{ApiError, DataAccessError, PipelineError};
use crate::pipeline::HandlerContext;
use crate::store::NewAuditEvent;

/// Writes an audit record. A failed write is logged and otherwise ignored.
pub(crate) async fn audit(ctx: &HandlerContext, event: NewAuditEvent) {
    let kind = event.kind.clone();
    if let Err(err) = ctx.data().log_event(event).await {
        tracing::warn!(error = %err, kind = %kind, "failed to write audit record");
    }
}

/// Answers a refused data access call, or fails on a backend fault.
pub(crate) fn refuse(
    ctx: &mut HandlerContext,
    err: DataAccessError,
) -> warden_core::Result<(), PipelineError> {
    ctx.reject(ApiError::try_from(err)?);
    Ok(())
}

/// Returns the named path parameter, answering `400` when it is absent.
pub(crate) fn required_param(ctx: &mut HandlerContext, name: &'static str) -> Option<String> {
    let value = ctx.request().param(name).map(str::to_string);
    if value.is_none() {
        ctx.reject(ApiError::BadRequest {
            reason: format!("missing {name} parameter"),
        });
    }
    value
}
