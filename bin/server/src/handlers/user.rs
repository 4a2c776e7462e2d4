//! Endpoints under `/self`: the caller's own account.

use async_trait::async_trait;
use axum::http::StatusCode;
use warden_access::validate::is_password;

use super::{audit, refuse};
use crate::error::{ApiError, PipelineError};
use crate::pipeline::{HandlerContext, Processor};
use crate::store::NewAuditEvent;

/// Answers the caller's login as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhoAmI;

#[async_trait]
impl Processor for WhoAmI {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let login = ctx.login()?;
        ctx.respond(StatusCode::OK, login);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "whoami"
    }
}

/// Replaces the caller's password with the raw request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangePassword;

#[async_trait]
impl Processor for ChangePassword {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let login = ctx.login()?;
        let Ok(password) = ctx.request().body_text().map(str::to_string) else {
            ctx.reject(ApiError::BadRequest {
                reason: "password must be text".to_string(),
            });
            return Ok(());
        };

        if !is_password(&password) {
            ctx.reject(ApiError::InvalidFormat { field: "password" });
            return Ok(());
        }

        if let Err(err) = ctx.data().upsert_user(&login, &password).await {
            return refuse(ctx, err);
        }

        audit(
            ctx,
            NewAuditEvent::new(&login, "self", format!("user {login} changes password")),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "change-password"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataAccess;
    use crate::testing;
    use axum::http::Method;
    use warden_access::Principal;

    #[tokio::test]
    async fn whoami_answers_login() {
        let mut ctx = testing::context("/self/user/whoami");
        ctx.set_principal(Principal::new("alice"));
        WhoAmI.process(&mut ctx).await.expect("process");
        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert_eq!(ctx.response().body(), Some(b"alice".as_slice()));
    }

    #[tokio::test]
    async fn change_password_replaces_password() {
        let app = testing::TestApp::new();
        app.user("alice").await;

        let mut ctx = app.context_with_body(Method::POST, "/self/user/password", "n3w-secret");
        ctx.set_principal(Principal::new("alice"));
        ChangePassword.process(&mut ctx).await.expect("process");

        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert!(app.data.validate_user("alice", "n3w-secret").await.expect("validate"));
        assert!(!app.data.validate_user("alice", testing::PASSWORD).await.expect("validate"));
    }

    #[tokio::test]
    async fn badly_shaped_password_is_forbidden() {
        let app = testing::TestApp::new();
        app.user("alice").await;

        let mut ctx = app.context_with_body(Method::POST, "/self/user/password", "a b");
        ctx.set_principal(Principal::new("alice"));
        ChangePassword.process(&mut ctx).await.expect("process");

        assert_eq!(ctx.response().status(), Some(StatusCode::FORBIDDEN));
        assert!(app.data.validate_user("alice", testing::PASSWORD).await.expect("validate"));
    }
}
