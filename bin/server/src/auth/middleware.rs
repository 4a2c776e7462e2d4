//! Authentication and authorization processors.
//!
//! `Authenticate` establishes who is calling; `Authorize` decides whether
//! they may reach the request path and with which roles. Every protected
//! route runs both, in that order, ahead of its own processor.

use async_trait::async_trait;
use warden_access::{AccessDecision, Principal, RuleEngine};

use super::Authenticated;
use crate::error::{ApiError, PipelineError};
use crate::pipeline::{HandlerContext, Processor};

/// Verifies the caller with the configured strategy.
///
/// On success the renewed credentials are set on the response, the
/// caller becomes the context's principal and the [`Authenticated`]
/// record is stored for later processors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticate;

#[async_trait]
impl Processor for Authenticate {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let authenticator = ctx.state().authenticator.clone();
        let caller = match authenticator.authenticate(ctx.request().headers()).await {
            Ok(caller) => caller,
            Err(err) => {
                ctx.reject(ApiError::try_from(err)?);
                return Ok(());
            }
        };

        for (name, value) in caller.headers.iter() {
            ctx.response_mut().set_header(name.clone(), value.clone());
        }
        ctx.set_principal(Principal::new(caller.login.clone()));
        ctx.insert_value::<Authenticated>(caller);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "authenticate"
    }
}

/// Admits the caller only if one of their access rules matches the path.
///
/// Rules are loaded fresh on every request. The roles of the matching
/// rule become the principal's global roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorize;

#[async_trait]
impl Processor for Authorize {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let login = ctx.login()?;
        let rules = ctx
            .data()
            .access_rules_for(&login)
            .await
            .map_err(PipelineError::from)?;

        let engine = RuleEngine::new(rules);
        let decision = engine.can_access(ctx.request().path());
        match decision {
            AccessDecision::Granted(roles) => {
                ctx.principal_mut()?.set_global_roles(roles);
            }
            AccessDecision::Denied => {
                tracing::debug!(
                    login = %login,
                    path = ctx.request().path(),
                    rules = engine.rules().len(),
                    "no access rule matched"
                );
                ctx.reject(ApiError::NoMatchingRule);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "authorize"
    }
}
