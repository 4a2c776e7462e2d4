//! Processors for status, login and logout.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Deserialize;

use super::Authenticated;
use crate::error::{ApiError, PipelineError};
use crate::pipeline::{HandlerContext, Processor};

/// Ping: always `200 OK`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Status;

#[async_trait]
impl Processor for Status {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        ctx.respond(StatusCode::OK, "OK");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "status"
    }
}

/// Login request body.
#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(alias = "login")]
    name: String,
    password: String,
}

/// Checks a login and password and hands out fresh credentials.
///
/// Answers `202 Accepted` with the credential headers, or `401` with an
/// empty body whether the user is unknown or the password wrong.
#[derive(Debug, Clone, Copy, Default)]
pub struct Login;

#[async_trait]
impl Processor for Login {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let credentials: Credentials = match ctx.request().json() {
            Ok(credentials) => credentials,
            Err(_) => {
                ctx.reject(ApiError::BadRequest {
                    reason: "expecting name and password".to_string(),
                });
                return Ok(());
            }
        };

        let valid = ctx
            .data()
            .validate_user(&credentials.name, &credentials.password)
            .await
            .map_err(PipelineError::from)?;
        if !valid {
            tracing::debug!(login = %credentials.name, "login refused");
            ctx.reject(ApiError::InvalidCredentials);
            return Ok(());
        }

        let authenticator = ctx.state().authenticator.clone();
        let headers = match authenticator.establish(&credentials.name).await {
            Ok(headers) => headers,
            Err(err) => {
                ctx.reject(ApiError::try_from(err)?);
                return Ok(());
            }
        };

        tracing::info!(login = %credentials.name, "user logged in");
        ctx.response_mut()
            .mark_ready(StatusCode::ACCEPTED, Vec::new(), headers);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "login"
    }
}

/// Ends the caller's session. Runs after [`super::Authenticate`].
///
/// The renewed token set by authentication is dropped from the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logout;

#[async_trait]
impl Processor for Logout {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(caller) = ctx.take_value::<Authenticated>() else {
            return Err(PipelineError::MissingPrincipal.into());
        };

        let authenticator = ctx.state().authenticator.clone();
        if let Err(err) = authenticator.end(&caller).await {
            ctx.reject(ApiError::try_from(err)?);
            return Ok(());
        }

        tracing::info!(login = %caller.login, "user logged out");
        ctx.response_mut().clear();
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "logout"
    }
}
