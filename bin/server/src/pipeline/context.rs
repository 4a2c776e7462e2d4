//! Per-request handler context.

use axum::http::Extensions;
use axum::http::StatusCode;
use serde::Serialize;
use warden_access::{Principal, RoleSet};

use super::request::InboundRequest;
use super::response::ResponseBuilder;
use crate::error::{ApiError, PipelineError};
use crate::state::AppState;
use crate::store::DataAccess;

/// Everything a processor may read or change while handling one request.
///
/// The authenticated caller is a typed field. Anything else a processor
/// hands to a later one goes through the value store, keyed by type.
pub struct HandlerContext {
    request: InboundRequest,
    response: ResponseBuilder,
    principal: Option<Principal>,
    values: Extensions,
    state: AppState,
}

impl HandlerContext {
    /// Creates the context for `request`.
    #[must_use]
    pub fn new(state: AppState, request: InboundRequest) -> Self {
        Self {
            request,
            response: ResponseBuilder::new(),
            principal: None,
            values: Extensions::new(),
            state,
        }
    }

    #[must_use]
    pub fn request(&self) -> &InboundRequest {
        &self.request
    }

    #[must_use]
    pub fn response(&self) -> &ResponseBuilder {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseBuilder {
        &mut self.response
    }

    /// Consumes the context, returning the response built so far.
    #[must_use]
    pub fn into_response(self) -> ResponseBuilder {
        self.response
    }

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Returns the data access collaborator.
    #[must_use]
    pub fn data(&self) -> &dyn DataAccess {
        self.state.data.as_ref()
    }

    /// Records the authenticated caller.
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Returns the authenticated caller.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MissingPrincipal` if no authentication
    /// processor ran before this one.
    pub fn principal(&self) -> Result<&Principal, PipelineError> {
        self.principal.as_ref().ok_or(PipelineError::MissingPrincipal)
    }

    /// Returns the authenticated caller for update.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MissingPrincipal` if no authentication
    /// processor ran before this one.
    pub fn principal_mut(&mut self) -> Result<&mut Principal, PipelineError> {
        self.principal.as_mut().ok_or(PipelineError::MissingPrincipal)
    }

    /// Returns the caller's login.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MissingPrincipal` if nobody is authenticated.
    pub fn login(&self) -> Result<String, PipelineError> {
        Ok(self.principal()?.login().to_string())
    }

    /// Returns the caller's local roles in user group `group`, loading
    /// them on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is authenticated or the lookup fails.
    pub async fn local_roles(&mut self, group: &str) -> Result<RoleSet, PipelineError> {
        if let Some(roles) = self.principal()?.local_roles(group) {
            return Ok(roles.clone());
        }

        let login = self.login()?;
        let roles = self.state.data.group_roles_for(&login, group).await?;
        self.principal_mut()?.set_local_roles(group, roles.clone());
        Ok(roles)
    }

    /// Returns the caller's global roles merged with their local roles in
    /// `group`.
    ///
    /// # Errors
    ///
    /// Returns an error if nobody is authenticated or the lookup fails.
    pub async fn effective_roles(&mut self, group: &str) -> Result<RoleSet, PipelineError> {
        self.local_roles(group).await?;
        Ok(self.principal()?.effective_roles(group))
    }

    /// Stores a value for later processors, returning the one it replaces.
    pub fn insert_value<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    /// Returns the stored value of type `T`.
    #[must_use]
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    /// Removes and returns the stored value of type `T`.
    pub fn take_value<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.values.remove::<T>()
    }

    /// Marks the response ready with a plain body.
    pub fn respond(&mut self, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.response.respond(status, body);
    }

    /// Marks the response ready with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Encoding` if `value` cannot be encoded.
    pub fn respond_json<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        value: &T,
    ) -> Result<(), PipelineError> {
        self.response.respond_json(status, value)?;
        Ok(())
    }

    /// Marks the response ready with the status and message of `err`.
    pub fn reject(&mut self, err: ApiError) {
        tracing::debug!(status = %err.status(), error = %err, "request refused");
        self.response.reject(&err);
    }
}
