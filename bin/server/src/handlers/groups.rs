//! Endpoints under `/groups`: user groups and their members.
//!
//! A caller's rights over a user group are their global roles (from the
//! `/groups` access rule) merged with their local roles in that group.

use async_trait::async_trait;
use axum::http::StatusCode;
use warden_access::validate::{is_group_name, is_username};
use warden_access::{GroupGrants, Role, RoleSet, may_grant};

use super::{audit, refuse, required_param};
use crate::error::{ApiError, PipelineError};
use crate::pipeline::{HandlerContext, Processor};
use crate::store::NewAuditEvent;

const GROUPS: &str = "groups";

/// Reads the `group` path parameter, refusing badly shaped names.
fn group_param(ctx: &mut HandlerContext) -> Option<String> {
    let group = required_param(ctx, "group")?;
    if !is_group_name(&group) {
        ctx.reject(ApiError::InvalidFormat {
            field: "group name",
        });
        return None;
    }
    Some(group)
}

/// Reads the `user` path parameter, refusing badly shaped names.
fn user_param(ctx: &mut HandlerContext) -> Option<String> {
    let user = required_param(ctx, "user")?;
    if !is_username(&user) {
        ctx.reject(ApiError::InvalidFormat { field: "username" });
        return None;
    }
    Some(user)
}

/// Answers the caller's user groups and local roles, or `204` if none.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListGroups;

#[async_trait]
impl Processor for ListGroups {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let login = ctx.login()?;
        match ctx.data().user_groups_for(&login).await {
            Ok(groups) if groups.is_empty() => ctx.respond(StatusCode::NO_CONTENT, ""),
            Ok(groups) => ctx.respond_json(StatusCode::OK, &groups)?,
            Err(err) => refuse(ctx, err)?,
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "list-groups"
    }
}

/// Creates a user group with the caller as its first member.
///
/// The creator holds `reader` and `editor` plus their global roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateGroup;

#[async_trait]
impl Processor for CreateGroup {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(group) = group_param(ctx) else {
            return Ok(());
        };

        let login = ctx.login()?;
        let roles =
            RoleSet::from([Role::Reader, Role::Editor]).union(ctx.principal()?.global_roles());
        if let Err(err) = ctx.data().create_user_group(&login, &group, &roles).await {
            return refuse(ctx, err);
        }

        audit(
            ctx,
            NewAuditEvent::new(&login, GROUPS, format!("user {login} creates group {group}")),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "create-group"
    }
}

/// Deletes a user group. Needs `admin` or `root`, globally or locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteGroup;

#[async_trait]
impl Processor for DeleteGroup {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(group) = group_param(ctx) else {
            return Ok(());
        };

        let login = ctx.login()?;
        let roles = ctx.effective_roles(&group).await?;
        if !roles.contains_any(&[Role::Admin, Role::Root]) {
            ctx.reject(ApiError::InsufficientRoles {
                operation: "delete group",
            });
            return Ok(());
        }

        if let Err(err) = ctx.data().delete_user_group(&group).await {
            return refuse(ctx, err);
        }

        audit(
            ctx,
            NewAuditEvent::new(&login, GROUPS, format!("user {login} deletes group {group}")),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "delete-group"
    }
}

/// Decodes a member's roles: a JSON array of role names, nulls skipped.
fn decode_member_roles(body: &[u8]) -> Result<RoleSet, String> {
    let values: Vec<Option<String>> =
        serde_json::from_slice(body).map_err(|_| "expecting a list of roles".to_string())?;
    let roles = RoleSet::parse(values.into_iter().flatten()).map_err(|err| err.to_string())?;
    if roles.is_empty() {
        return Err("empty auth, need at least one role".to_string());
    }
    Ok(roles)
}

/// Adds a user to a group or replaces their local roles.
///
/// The caller may only hand out roles they could grant with their local
/// roles in the group. Global roles give no standing in someone else's
/// group.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertMember;

#[async_trait]
impl Processor for UpsertMember {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(group) = group_param(ctx) else {
            return Ok(());
        };
        let Some(user) = user_param(ctx) else {
            return Ok(());
        };
        let roles = match decode_member_roles(ctx.request().body()) {
            Ok(roles) => roles,
            Err(reason) => {
                ctx.reject(ApiError::BadRequest { reason });
                return Ok(());
            }
        };

        let login = ctx.login()?;
        let held = ctx.local_roles(&group).await?;
        let actor: GroupGrants = if held.is_empty() {
            GroupGrants::new()
        } else {
            [(group.as_str(), held)].into_iter().collect()
        };
        let requested: GroupGrants = [(group.as_str(), roles.clone())].into_iter().collect();
        if let Err(err) = may_grant(&actor, &requested) {
            tracing::debug!(
                actor = %login,
                login = %user,
                group = %group,
                error = %err,
                "membership refused"
            );
            ctx.reject(ApiError::from(err));
            return Ok(());
        }

        if let Err(err) = ctx.data().set_group_roles(&login, &user, &group, &roles).await {
            return refuse(ctx, err);
        }

        let parameters = roles.iter().map(|role| role.to_string()).collect();
        audit(
            ctx,
            NewAuditEvent::new(
                &login,
                GROUPS,
                format!("user {login} upserts user {user} within group {group}"),
            )
            .with_parameters(parameters),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "upsert-member"
    }
}

/// Removes a user from a group. Needs `admin`, `editor` or `root`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevokeMember;

#[async_trait]
impl Processor for RevokeMember {
    async fn process(&self, ctx: &mut HandlerContext) -> warden_core::Result<(), PipelineError> {
        let Some(group) = group_param(ctx) else {
            return Ok(());
        };
        let Some(user) = user_param(ctx) else {
            return Ok(());
        };

        let login = ctx.login()?;
        let roles = ctx.effective_roles(&group).await?;
        if !roles.contains_any(&[Role::Admin, Role::Editor, Role::Root]) {
            ctx.reject(ApiError::InsufficientRoles {
                operation: "revoke member",
            });
            return Ok(());
        }

        if let Err(err) = ctx.data().revoke_group_member(&user, &group).await {
            return refuse(ctx, err);
        }

        audit(
            ctx,
            NewAuditEvent::new(
                &login,
                GROUPS,
                format!("user {login} removes user {user} from group {group}"),
            ),
        )
        .await;
        ctx.respond(StatusCode::OK, "");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "revoke-member"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataAccess;
    use crate::testing::TestApp;
    use axum::http::Method;
    use warden_access::Principal;

    fn caller(login: &str, global: &[Role]) -> Principal {
        let mut principal = Principal::new(login);
        principal.set_global_roles(global.iter().copied().collect());
        principal
    }

    async fn run(
        app: &TestApp,
        processor: &dyn Processor,
        principal: Principal,
        method: Method,
        params: &[(&str, &str)],
        body: &'static str,
    ) -> HandlerContext {
        let mut ctx = app.context_with_params(method, "/groups", params, body);
        ctx.set_principal(principal);
        processor.process(&mut ctx).await.expect("process");
        ctx
    }

    #[test]
    fn member_roles_skip_nulls_and_refuse_unknowns() {
        assert_eq!(
            decode_member_roles(br#"["reader", null, "editor"]"#),
            Ok(RoleSet::from([Role::Reader, Role::Editor]))
        );
        assert!(decode_member_roles(b"[]").is_err());
        assert!(decode_member_roles(b"[null]").is_err());
        assert!(decode_member_roles(br#"["owner"]"#).is_err());
        assert!(decode_member_roles(b"[1]").is_err());
        assert!(decode_member_roles(b"   ").is_err());
    }

    #[tokio::test]
    async fn list_groups_without_membership_is_no_content() {
        let app = TestApp::new();
        app.user("alice").await;
        let ctx = run(&app, &ListGroups, caller("alice", &[]), Method::GET, &[], "").await;
        assert_eq!(ctx.response().status(), Some(StatusCode::NO_CONTENT));
    }

    #[tokio::test]
    async fn creator_gets_reader_editor_and_global_roles() {
        let app = TestApp::new();
        app.user("alice").await;
        let ctx = run(
            &app,
            &CreateGroup,
            caller("alice", &[Role::Admin]),
            Method::POST,
            &[("group", "team")],
            "",
        )
        .await;

        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert_eq!(
            app.data.group_roles_for("alice", "team").await.expect("roles"),
            RoleSet::from([Role::Admin, Role::Editor, Role::Reader])
        );

        let listed = run(&app, &ListGroups, caller("alice", &[]), Method::GET, &[], "").await;
        assert_eq!(listed.response().status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn creating_existing_group_conflicts() {
        let app = TestApp::new();
        app.user("alice").await;
        for expected in [StatusCode::OK, StatusCode::CONFLICT] {
            let ctx = run(
                &app,
                &CreateGroup,
                caller("alice", &[]),
                Method::POST,
                &[("group", "team")],
                "",
            )
            .await;
            assert_eq!(ctx.response().status(), Some(expected));
        }
    }

    #[tokio::test]
    async fn badly_shaped_group_name_is_forbidden() {
        let app = TestApp::new();
        let ctx = run(
            &app,
            &CreateGroup,
            caller("alice", &[]),
            Method::POST,
            &[("group", "team-1")],
            "",
        )
        .await;
        assert_eq!(ctx.response().status(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn local_admin_adds_member() {
        let app = TestApp::new();
        app.user("alice").await;
        app.user("bobby").await;
        app.data
            .create_user_group("alice", "team", &RoleSet::from([Role::Admin]))
            .await
            .expect("create");

        let ctx = run(
            &app,
            &UpsertMember,
            caller("alice", &[]),
            Method::PUT,
            &[("group", "team"), ("user", "bobby")],
            r#"["reader"]"#,
        )
        .await;

        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert_eq!(
            app.data.group_roles_for("bobby", "team").await.expect("roles"),
            RoleSet::from([Role::Reader])
        );
    }

    #[tokio::test]
    async fn editor_cannot_add_member_and_admin_cannot_grant_root() {
        let app = TestApp::new();
        app.user("alice").await;
        app.user("bobby").await;
        app.data
            .create_user_group("alice", "team", &RoleSet::from([Role::Editor]))
            .await
            .expect("create");

        let editor = run(
            &app,
            &UpsertMember,
            caller("alice", &[]),
            Method::PUT,
            &[("group", "team"), ("user", "bobby")],
            r#"["reader"]"#,
        )
        .await;
        assert_eq!(editor.response().status(), Some(StatusCode::FORBIDDEN));

        let admin = run(
            &app,
            &UpsertMember,
            caller("alice", &[Role::Admin]),
            Method::PUT,
            &[("group", "team"), ("user", "bobby")],
            r#"["root"]"#,
        )
        .await;
        assert_eq!(admin.response().status(), Some(StatusCode::FORBIDDEN));
        assert!(
            app.data
                .group_roles_for("bobby", "team")
                .await
                .expect("roles")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn outsider_is_refused_membership_changes() {
        let app = TestApp::new();
        app.user("alice").await;
        app.user("bobby").await;
        app.data
            .create_user_group("bobby", "team", &RoleSet::from([Role::Admin]))
            .await
            .expect("create");

        let ctx = run(
            &app,
            &UpsertMember,
            caller("alice", &[]),
            Method::PUT,
            &[("group", "team"), ("user", "alice")],
            r#"["admin"]"#,
        )
        .await;
        assert_eq!(ctx.response().status(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn global_admin_without_membership_cannot_add_members() {
        let app = TestApp::new();
        app.user("alice").await;
        app.user("bobby").await;
        app.data
            .create_user_group("bobby", "team", &RoleSet::from([Role::Reader]))
            .await
            .expect("create");

        let ctx = run(
            &app,
            &UpsertMember,
            caller("alice", &[Role::Admin]),
            Method::PUT,
            &[("group", "team"), ("user", "alice")],
            r#"["admin"]"#,
        )
        .await;

        assert_eq!(ctx.response().status(), Some(StatusCode::FORBIDDEN));
        assert!(
            app.data
                .group_roles_for("alice", "team")
                .await
                .expect("roles")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn editor_revokes_member() {
        let app = TestApp::new();
        app.user("alice").await;
        app.user("bobby").await;
        app.data
            .create_user_group("alice", "team", &RoleSet::from([Role::Editor]))
            .await
            .expect("create");
        app.data
            .set_group_roles("alice", "bobby", "team", &RoleSet::from([Role::Reader]))
            .await
            .expect("add");

        let ctx = run(
            &app,
            &RevokeMember,
            caller("alice", &[]),
            Method::DELETE,
            &[("group", "team"), ("user", "bobby")],
            "",
        )
        .await;

        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert!(
            app.data
                .user_groups_for("bobby")
                .await
                .expect("groups")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn reader_cannot_revoke_or_delete() {
        let app = TestApp::new();
        app.user("alice").await;
        app.data
            .create_user_group("alice", "team", &RoleSet::from([Role::Reader]))
            .await
            .expect("create");

        let revoke = run(
            &app,
            &RevokeMember,
            caller("alice", &[]),
            Method::DELETE,
            &[("group", "team"), ("user", "alice")],
            "",
        )
        .await;
        assert_eq!(revoke.response().status(), Some(StatusCode::FORBIDDEN));

        let delete = run(
            &app,
            &DeleteGroup,
            caller("alice", &[]),
            Method::DELETE,
            &[("group", "team")],
            "",
        )
        .await;
        assert_eq!(delete.response().status(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn global_admin_deletes_group() {
        let app = TestApp::new();
        app.user("alice").await;
        app.user("bobby").await;
        app.data
            .create_user_group("bobby", "team", &RoleSet::from([Role::Reader]))
            .await
            .expect("create");

        let ctx = run(
            &app,
            &DeleteGroup,
            caller("alice", &[Role::Admin]),
            Method::DELETE,
            &[("group", "team")],
            "",
        )
        .await;

        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert!(
            app.data
                .user_groups_for("bobby")
                .await
                .expect("groups")
                .is_empty()
        );
    }
}
