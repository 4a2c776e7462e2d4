//! Helpers shared by the unit tests.

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use warden_access::{AccessRule, GroupGrants, Role, RoleSet, TokenManager};

use crate::auth::TokenAuthenticator;
use crate::error::DataAccessError;
use crate::pipeline::{HandlerContext, InboundRequest};
use crate::state::AppState;
use crate::store::{AuditEvent, DataAccess, MemoryDataAccess, NewAuditEvent};

pub const PASSWORD: &str = "password1";

pub fn request(path: &str) -> InboundRequest {
    InboundRequest::new(
        Method::GET,
        path.parse().expect("uri"),
        HeaderMap::new(),
        HashMap::new(),
        Bytes::new(),
    )
}

pub fn memory_state() -> (AppState, Arc<MemoryDataAccess>) {
    let app = TestApp::new();
    (app.state.clone(), app.data)
}

pub fn context(path: &str) -> HandlerContext {
    HandlerContext::new(memory_state().0, request(path))
}

/// In-memory application with token authentication.
pub struct TestApp {
    pub state: AppState,
    pub data: Arc<MemoryDataAccess>,
    pub tokens: Arc<TokenManager>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_data(MemoryDataAccess::new())
    }

    pub fn with_data(data: MemoryDataAccess) -> Self {
        let data = Arc::new(data);
        Self::serving(data.clone(), data)
    }

    /// An application whose `failing` data access calls report a backend
    /// fault. `data` still reaches the underlying store for setup.
    pub fn with_failing(failing: &'static [&'static str]) -> Self {
        let data = Arc::new(MemoryDataAccess::new());
        let served = Arc::new(FailingDataAccess {
            inner: Arc::clone(&data),
            failing,
        });
        Self::serving(served, data)
    }

    fn serving(served: Arc<dyn DataAccess>, data: Arc<MemoryDataAccess>) -> Self {
        let tokens = Arc::new(TokenManager::new(
            b"unit-test-secret".to_vec(),
            Duration::minutes(5),
        ));
        let state = AppState::new(
            served,
            Arc::new(TokenAuthenticator::new(Arc::clone(&tokens))),
        );
        Self {
            state,
            data,
            tokens,
        }
    }

    pub fn router(&self) -> Router {
        crate::router(self.state.clone())
    }

    /// Creates `login` with [`PASSWORD`].
    pub async fn user(&self, login: &str) {
        self.data.upsert_user(login, PASSWORD).await.expect("upsert user");
    }

    /// Creates `login` if needed and sets their roles in resource group `group`.
    pub async fn grant(&self, login: &str, group: &str, roles: &[Role]) {
        if !self.data.user_exists(login).await.expect("user exists") {
            self.user(login).await;
        }
        let grants: GroupGrants = [(group, roles.iter().copied().collect::<RoleSet>())]
            .into_iter()
            .collect();
        self.data
            .grant_resource_access(login, &grants)
            .await
            .expect("grant");
    }

    pub fn bearer(&self, login: &str) -> HeaderValue {
        let token = self.tokens.issue(login).expect("issue token");
        HeaderValue::try_from(format!("Bearer {token}")).expect("header value")
    }

    pub fn context_with_body(&self, method: Method, path: &str, body: &'static str) -> HandlerContext {
        self.context_with_params(method, path, &[], body)
    }

    /// A request carrying the path parameters a route would have matched.
    pub fn context_with_params(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: &'static str,
    ) -> HandlerContext {
        let params = params
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        let request = InboundRequest::new(
            method,
            path.parse().expect("uri"),
            HeaderMap::new(),
            params,
            Bytes::from_static(body.as_bytes()),
        );
        HandlerContext::new(self.state.clone(), request)
    }

    /// A GET request to `path` carrying a valid token for `login`.
    pub fn context_as(&self, login: &str, path: &str) -> HandlerContext {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.bearer(login));
        let request = InboundRequest::new(
            Method::GET,
            path.parse().expect("uri"),
            headers,
            HashMap::new(),
            Bytes::new(),
        );
        HandlerContext::new(self.state.clone(), request)
    }
}

/// Message carried by every injected backend fault.
pub const BACKEND_DETAILS: &str = "connection reset by peer";

/// Delegates to a memory store, except that the named operations fail.
struct FailingDataAccess {
    inner: Arc<MemoryDataAccess>,
    failing: &'static [&'static str],
}

impl FailingDataAccess {
    fn check(&self, operation: &str) -> Result<(), DataAccessError> {
        if self.failing.iter().any(|failing| *failing == operation) {
            Err(DataAccessError::Backend {
                details: BACKEND_DETAILS.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataAccess for FailingDataAccess {
    async fn validate_user(&self, login: &str, password: &str) -> Result<bool, DataAccessError> {
        self.check("validate_user")?;
        self.inner.validate_user(login, password).await
    }

    async fn upsert_user(&self, login: &str, password: &str) -> Result<(), DataAccessError> {
        self.check("upsert_user")?;
        self.inner.upsert_user(login, password).await
    }

    async fn delete_user(&self, login: &str) -> Result<(), DataAccessError> {
        self.check("delete_user")?;
        self.inner.delete_user(login).await
    }

    async fn user_exists(&self, login: &str) -> Result<bool, DataAccessError> {
        self.check("user_exists")?;
        self.inner.user_exists(login).await
    }

    async fn resource_groups(&self) -> Result<Vec<String>, DataAccessError> {
        self.check("resource_groups")?;
        self.inner.resource_groups().await
    }

    async fn access_rules_for(&self, login: &str) -> Result<Vec<AccessRule>, DataAccessError> {
        self.check("access_rules_for")?;
        self.inner.access_rules_for(login).await
    }

    async fn resource_grants_for(&self, login: &str) -> Result<GroupGrants, DataAccessError> {
        self.check("resource_grants_for")?;
        self.inner.resource_grants_for(login).await
    }

    async fn grant_resource_access(
        &self,
        login: &str,
        grants: &GroupGrants,
    ) -> Result<(), DataAccessError> {
        self.check("grant_resource_access")?;
        self.inner.grant_resource_access(login, grants).await
    }

    async fn create_user_group(
        &self,
        creator: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError> {
        self.check("create_user_group")?;
        self.inner.create_user_group(creator, group, roles).await
    }

    async fn user_groups_for(&self, login: &str) -> Result<GroupGrants, DataAccessError> {
        self.check("user_groups_for")?;
        self.inner.user_groups_for(login).await
    }

    async fn group_roles_for(&self, login: &str, group: &str) -> Result<RoleSet, DataAccessError> {
        self.check("group_roles_for")?;
        self.inner.group_roles_for(login, group).await
    }

    async fn set_group_roles(
        &self,
        granted_by: &str,
        login: &str,
        group: &str,
        roles: &RoleSet,
    ) -> Result<(), DataAccessError> {
        self.check("set_group_roles")?;
        self.inner.set_group_roles(granted_by, login, group, roles).await
    }

    async fn revoke_group_member(&self, login: &str, group: &str) -> Result<(), DataAccessError> {
        self.check("revoke_group_member")?;
        self.inner.revoke_group_member(login, group).await
    }

    async fn delete_user_group(&self, group: &str) -> Result<(), DataAccessError> {
        self.check("delete_user_group")?;
        self.inner.delete_user_group(group).await
    }

    async fn log_event(&self, event: NewAuditEvent) -> Result<(), DataAccessError> {
        self.check("log_event")?;
        self.inner.log_event(event).await
    }

    async fn audit_events(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AuditEvent>, DataAccessError> {
        self.check("audit_events")?;
        self.inner.audit_events(from, to).await
    }
}
