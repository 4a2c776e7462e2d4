//! Endpoints under `/admin`: user creation and resource grants.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Deserialize;
use warden_access::validate::{is_password, is_username};
use warden_access::{GrantRequest, may_grant};

use super::{audit, refuse, required_param};
use crate::error::{ApiError, PipelineError};
use crate::pipeline::{HandlerContext, Processor};
use crate::store::NewAuditEvent;

/// Body of a user creation request.
#[derive(Debug, Deserialize)]
struct NewUser {
    #[serde(alias = "login")]
    name: String,
    password: String,
}

/// Creates a user holding no role.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateUser;

#[async_trait]
impl Processor for CreateUser {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let actor = ctx.login()?;
        let Ok(user) = ctx.request().json::<NewUser>() else {
            ctx.reject(ApiError::BadRequest {
                reason: "expecting name and password".to_string(),
            });
            return Ok(());
        };

        if !is_username(&user.name) {
            ctx.reject(ApiError::InvalidFormat { field: "username" });
            return Ok(());
        }
        if !is_password(&user.password) {
            ctx.reject(ApiError::InvalidFormat { field: "password" });
            return Ok(());
        }

        match ctx.data().user_exists(&user.name).await {
            Ok(false) => {}
            Ok(true) => {
                ctx.reject(ApiError::Conflict {
                    what: format!("user '{}'", user.name),
                });
                return Ok(());
            }
            Err(err) => return refuse(ctx, err),
        }

        if let Err(err) = ctx.data().upsert_user(&user.name, &user.password).await {
            return refuse(ctx, err);
        }

        tracing::info!(actor = %actor, login = %user.name, "user created");
        audit(
            ctx,
            NewAuditEvent::new(&actor, "admin", format!("user {actor} creates user {}", user.name)),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "create-user"
    }
}

/// Answers the resource groups and roles of the user named in the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListRoles;

#[async_trait]
impl Processor for ListRoles {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(username) = required_param(ctx, "username") else {
            return Ok(());
        };
        if !is_username(&username) {
            ctx.reject(ApiError::InvalidFormat { field: "username" });
            return Ok(());
        }

        match ctx.data().resource_grants_for(&username).await {
            Ok(grants) => ctx.respond_json(StatusCode::OK, &grants)?,
            Err(err) => refuse(ctx, err)?,
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "list-roles"
    }
}

/// Decodes the body as a [`GrantRequest`] and stores it for
/// [`EditRoles`]. An undecodable body answers `400`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeGrantRequest;

#[async_trait]
impl Processor for DecodeGrantRequest {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        match GrantRequest::from_json(ctx.request().body()) {
            Ok(request) => {
                ctx.insert_value(request);
            }
            Err(err) => ctx.reject(ApiError::from(err)),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "decode-grant-request"
    }
}

/// Replaces the roles of the user named in the path, group by group.
///
/// The caller must be allowed to grant every requested role in every
/// requested group; otherwise nothing changes. The batch is applied
/// atomically.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditRoles;

#[async_trait]
impl Processor for EditRoles {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(grants) = ctx
            .take_value::<GrantRequest>()
            .map(GrantRequest::into_grants)
        else {
            return Err(PipelineError::MissingValue {
                what: "grant request",
            }
            .into());
        };
        let Some(username) = required_param(ctx, "username") else {
            return Ok(());
        };
        if !is_username(&username) {
            ctx.reject(ApiError::InvalidFormat { field: "username" });
            return Ok(());
        }

        let actor = ctx.login()?;
        let held = match ctx.data().resource_grants_for(&actor).await {
            Ok(held) => held,
            Err(err) => return refuse(ctx, err),
        };
        if let Err(err) = may_grant(&held, &grants) {
            tracing::debug!(actor = %actor, login = %username, error = %err, "grant refused");
            ctx.reject(ApiError::from(err));
            return Ok(());
        }

        if let Err(err) = ctx
            .data()
            .grant_resource_access(&username, &grants)
            .await
        {
            return refuse(ctx, err);
        }

        let parameters = grants
            .iter()
            .map(|(group, roles)| format!("{group}={roles}"))
            .collect();
        audit(
            ctx,
            NewAuditEvent::new(&actor, "admin", format!("user {actor} sets roles of {username}"))
                .with_parameters(parameters),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "edit-roles"
    }
}
