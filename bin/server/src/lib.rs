//! warden access-control server.
//!
//! Every endpoint is a [`pipeline::Pipeline`] of processors sharing one
//! [`pipeline::HandlerContext`]. Protected endpoints authenticate the
//! caller, authorize the request path against the caller's access rules
//! and then run the endpoint processor.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use axum::Router;
use axum::http::Method;

use crate::auth::{Authenticate, Login, Logout, Status};
use crate::engine::ProcessingEngine;
use crate::handlers::{
    AuditLog, ChangePassword, CreateGroup, CreateUser, DecodeGrantRequest, DeleteGroup,
    DeleteUser, EditRoles, ListGroups, ListRoles, RevokeMember, UpsertMember, WhoAmI,
};
use crate::pipeline::processor;
use crate::state::AppState;

/// Registers the built-in endpoints on `engine`.
#[must_use]
pub fn register_endpoints(engine: ProcessingEngine) -> ProcessingEngine {
    engine
        .add_processors(Method::GET, "/status", vec![processor(Status)])
        .add_processors(Method::POST, "/login", vec![processor(Login)])
        .add_processors(
            Method::POST,
            "/logout",
            vec![processor(Authenticate), processor(Logout)],
        )
        .add_protected(Method::GET, "/self/user/whoami", vec![processor(WhoAmI)])
        .add_protected(
            Method::POST,
            "/self/user/password",
            vec![processor(ChangePassword)],
        )
        .add_protected(Method::POST, "/admin/user/create", vec![processor(CreateUser)])
        .add_protected(
            Method::GET,
            "/admin/user/{username}/roles",
            vec![processor(ListRoles)],
        )
        .add_protected(
            Method::PUT,
            "/admin/user/{username}/roles",
            vec![processor(DecodeGrantRequest), processor(EditRoles)],
        )
        .add_protected(
            Method::DELETE,
            "/root/user/{username}",
            vec![processor(DeleteUser)],
        )
        .add_protected(Method::GET, "/root/audit", vec![processor(AuditLog)])
        .add_protected(Method::GET, "/groups", vec![processor(ListGroups)])
        .add_protected(Method::POST, "/groups/{group}", vec![processor(CreateGroup)])
        .add_protected(Method::DELETE, "/groups/{group}", vec![processor(DeleteGroup)])
        .add_protected(
            Method::PUT,
            "/groups/{group}/users/{user}",
            vec![processor(UpsertMember)],
        )
        .add_protected(
            Method::DELETE,
            "/groups/{group}/users/{user}",
            vec![processor(RevokeMember)],
        )
}

/// Builds the router serving every built-in endpoint.
pub fn router(state: AppState) -> Router {
    register_endpoints(ProcessingEngine::new(state)).into_router()
}
