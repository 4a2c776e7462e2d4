//! Shared application state.

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::store::DataAccess;

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Users, grants, groups and the audit log.
    pub data: Arc<dyn DataAccess>,
    /// Strategy proving the caller's identity.
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(data: Arc<dyn DataAccess>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            data,
            authenticator,
        }
    }
}
