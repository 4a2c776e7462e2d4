//! Error types for server operations.
//!
//! - `DataAccessError`, `SessionStoreError`: failures of the storage
//!   collaborators
//! - `AuthenticatorError`: an authentication strategy refused the caller
//!   or could not reach its collaborators
//! - `PipelineError`: a processor gave up; the request answers 500
//! - `ApiError`: an expected refusal, mapped to a status and a user-safe
//!   message in one place

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use warden_access::{AuthenticationError, GrantError, GrantRequestError, TokenError};

/// Errors from the data access collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataAccessError {
    /// The named user does not exist.
    NotFound { login: String },
    /// The named resource group or user group does not exist.
    UnknownGroup { group: String },
    /// The entity being created already exists.
    Conflict { what: String },
    /// The backing store failed.
    Backend { details: String },
}

impl fmt::Display for DataAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { login } => write!(f, "user '{login}' not found"),
            Self::UnknownGroup { group } => write!(f, "group '{group}' not found"),
            Self::Conflict { what } => write!(f, "{what} already exists"),
            Self::Backend { details } => write!(f, "data access error: {details}"),
        }
    }
}

impl std::error::Error for DataAccessError {}

impl From<sqlx::Error> for DataAccessError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend {
            details: err.to_string(),
        }
    }
}

/// Errors from the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// No live session has this id.
    NotFound,
    /// The backing store failed.
    Backend { details: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "session not found"),
            Self::Backend { details } => write!(f, "session store error: {details}"),
        }
    }
}

impl std::error::Error for SessionStoreError {}

impl From<sqlx::Error> for SessionStoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend {
            details: err.to_string(),
        }
    }
}

/// Errors from an authentication strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatorError {
    /// The caller's credentials were refused.
    Rejected(AuthenticationError),
    /// The session store failed.
    Store(SessionStoreError),
    /// A token could not be issued.
    Signing(TokenError),
}

impl fmt::Display for AuthenticatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "authentication rejected: {err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Signing(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AuthenticatorError {}

impl From<AuthenticationError> for AuthenticatorError {
    fn from(err: AuthenticationError) -> Self {
        Self::Rejected(err)
    }
}

impl From<SessionStoreError> for AuthenticatorError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::NotFound => Self::Rejected(AuthenticationError::SessionNotFound),
            other => Self::Store(other),
        }
    }
}

/// A processor could not complete and did not produce a response.
#[derive(Debug)]
pub enum PipelineError {
    /// A data access call failed.
    DataAccess(DataAccessError),
    /// A session store call failed.
    SessionStore(SessionStoreError),
    /// A token could not be issued.
    Token(TokenError),
    /// A response body could not be encoded.
    Encoding { details: String },
    /// A processor needing the caller ran before authentication.
    MissingPrincipal,
    /// A processor needing a value ran before the processor providing it.
    MissingValue { what: &'static str },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataAccess(err) => write!(f, "{err}"),
            Self::SessionStore(err) => write!(f, "{err}"),
            Self::Token(err) => write!(f, "{err}"),
            Self::Encoding { details } => write!(f, "failed to encode response: {details}"),
            Self::MissingPrincipal => write!(f, "no authenticated principal in context"),
            Self::MissingValue { what } => write!(f, "no {what} in context"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<DataAccessError> for PipelineError {
    fn from(err: DataAccessError) -> Self {
        Self::DataAccess(err)
    }
}

impl From<SessionStoreError> for PipelineError {
    fn from(err: SessionStoreError) -> Self {
        Self::SessionStore(err)
    }
}

impl From<TokenError> for PipelineError {
    fn from(err: TokenError) -> Self {
        Self::Token(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding {
            details: err.to_string(),
        }
    }
}

/// An expected refusal of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The caller could not be identified.
    Authentication(AuthenticationError),
    /// Login with wrong credentials.
    InvalidCredentials,
    /// No access rule admits the request path.
    NoMatchingRule,
    /// The caller may not grant or change these roles.
    Delegation(GrantError),
    /// The caller's roles do not allow the operation.
    InsufficientRoles { operation: &'static str },
    /// A username, password or group name has the wrong shape.
    InvalidFormat { field: &'static str },
    /// The request is malformed.
    BadRequest { reason: String },
    /// The named subject does not exist.
    NotFound { what: String },
    /// The entity being created already exists.
    Conflict { what: String },
    /// The route exists but not for this method.
    MethodNotAllowed,
    /// A fault the client cannot act on.
    Internal,
}

impl ApiError {
    /// Returns the status answered for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authentication(_) | Self::InvalidCredentials | Self::NoMatchingRule => {
                StatusCode::UNAUTHORIZED
            }
            Self::Delegation(_) | Self::InsufficientRoles { .. } | Self::InvalidFormat { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the body sent to the client.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Authentication(err) => err.to_string(),
            Self::InvalidCredentials => String::new(),
            Self::NoMatchingRule => "cannot access resource due to missing permissions".to_string(),
            Self::Delegation(err) => err.to_string(),
            Self::InsufficientRoles { operation } => format!("insufficient privilege to {operation}"),
            Self::InvalidFormat { field } => format!("invalid {field} format"),
            Self::BadRequest { reason } => reason.clone(),
            Self::NotFound { what } => format!("{what} not found"),
            Self::Conflict { what } => format!("{what} already exists"),
            Self::MethodNotAllowed => String::new(),
            Self::Internal => "internal server error".to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl TryFrom<DataAccessError> for ApiError {
    type Error = PipelineError;

    /// Maps refusals from the data access collaborator to a response.
    /// Backend failures are not refusals and stay errors.
    fn try_from(err: DataAccessError) -> Result<Self, Self::Error> {
        match err {
            DataAccessError::NotFound { login } => Ok(Self::NotFound {
                what: format!("user '{login}'"),
            }),
            DataAccessError::UnknownGroup { group } => Ok(Self::NotFound {
                what: format!("group '{group}'"),
            }),
            DataAccessError::Conflict { what } => Ok(Self::Conflict { what }),
            backend @ DataAccessError::Backend { .. } => Err(PipelineError::DataAccess(backend)),
        }
    }
}

impl TryFrom<AuthenticatorError> for ApiError {
    type Error = PipelineError;

    fn try_from(err: AuthenticatorError) -> Result<Self, Self::Error> {
        match err {
            AuthenticatorError::Rejected(err) => Ok(Self::Authentication(err)),
            AuthenticatorError::Store(err) => Err(PipelineError::SessionStore(err)),
            AuthenticatorError::Signing(err) => Err(PipelineError::Token(err)),
        }
    }
}

impl From<AuthenticationError> for ApiError {
    fn from(err: AuthenticationError) -> Self {
        Self::Authentication(err)
    }
}

impl From<GrantError> for ApiError {
    fn from(err: GrantError) -> Self {
        Self::Delegation(err)
    }
}

impl From<GrantRequestError> for ApiError {
    fn from(err: GrantRequestError) -> Self {
        Self::BadRequest {
            reason: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}
