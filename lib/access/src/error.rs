//! Error types for the access crate.
//!
//! Errors are plain enums meant to be wrapped with rootcause context by
//! callers:
//! - `ParseRoleError`, `ParseOperatorError`, `InvalidRuleError`: malformed
//!   grant or rule data
//! - `TokenError`: token signing and verification failures
//! - `GrantError`: delegation refusals
//! - `GrantRequestError`: undecodable grant bodies
//! - `AuthenticationError`: credential failures at the request edge

use std::fmt;

/// A role name outside the closed role set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    pub value: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.value)
    }
}

impl std::error::Error for ParseRoleError {}

/// An operator name outside `EQUALS`, `STARTS_WITH`, `MATCHES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOperatorError {
    pub value: String,
}

impl fmt::Display for ParseOperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown operator: {}", self.value)
    }
}

impl std::error::Error for ParseOperatorError {}

/// A rule that can never be evaluated meaningfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRuleError {
    /// The template is empty.
    EmptyTemplate,
}

impl fmt::Display for InvalidRuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTemplate => write!(f, "rule template must not be empty"),
        }
    }
}

impl std::error::Error for InvalidRuleError {}

/// Errors from issuing or verifying tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token could not be produced.
    SigningFailed { reason: String },
    /// The token is not signed by the current secret, or is not a token.
    InvalidSignature,
    /// The token's expiry has passed.
    Expired,
    /// A correctly signed token carries unusable claims.
    MalformedClaims { reason: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SigningFailed { reason } => write!(f, "failed to sign token: {reason}"),
            Self::InvalidSignature => write!(f, "token signature is invalid"),
            Self::Expired => write!(f, "token has expired"),
            Self::MalformedClaims { reason } => write!(f, "token claims are malformed: {reason}"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Why a grant request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    /// The actor holds no role in any group.
    NoAdminAccess,
    /// A requested group is not among the actor's groups.
    UnknownGroup { group: String },
    /// The actor's roles in the group do not allow the request.
    InsufficientPrivilege { group: String, reason: &'static str },
}

impl fmt::Display for GrantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdminAccess => write!(f, "actor has no administrative access"),
            Self::UnknownGroup { group } => write!(f, "actor has no access to group '{group}'"),
            Self::InsufficientPrivilege { group, reason } => {
                write!(f, "insufficient privilege in group '{group}': {reason}")
            }
        }
    }
}

impl std::error::Error for GrantError {}

/// A grant request body that cannot be turned into group grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantRequestError {
    /// The body is not a JSON object of string arrays.
    Malformed { reason: String },
    /// The body names no group.
    Empty,
    /// A group name has the wrong shape.
    InvalidGroupName { group: String },
    /// A role is outside the closed set.
    UnknownRole(ParseRoleError),
}

impl fmt::Display for GrantRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed grant request: {reason}"),
            Self::Empty => write!(f, "grant request names no group"),
            Self::InvalidGroupName { group } => write!(f, "invalid group name: '{group}'"),
            Self::UnknownRole(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GrantRequestError {}

impl From<ParseRoleError> for GrantRequestError {
    fn from(err: ParseRoleError) -> Self {
        Self::UnknownRole(err)
    }
}

/// Errors from establishing who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No credential was presented.
    MissingCredentials,
    /// The `Authorization` header is not a bearer credential.
    MalformedHeader,
    /// The bearer token failed verification.
    InvalidToken(TokenError),
    /// The session header names no live session.
    SessionNotFound,
    /// The session belongs to a different identity than the token.
    SessionMismatch,
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "no credentials presented"),
            Self::MalformedHeader => write!(f, "authorization header is not a bearer token"),
            Self::InvalidToken(err) => write!(f, "invalid token: {err}"),
            Self::SessionNotFound => write!(f, "session not found"),
            Self::SessionMismatch => write!(f, "session does not belong to the token subject"),
        }
    }
}

impl std::error::Error for AuthenticationError {}

impl From<TokenError> for AuthenticationError {
    fn from(err: TokenError) -> Self {
        Self::InvalidToken(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_role_error_names_value() {
        let err = ParseRoleError {
            value: "owner".to_string(),
        };
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn grant_error_display_names_group() {
        let err = GrantError::InsufficientPrivilege {
            group: "team1".to_string(),
            reason: "needs admin or root",
        };
        assert!(err.to_string().contains("team1"));
        assert!(err.to_string().contains("needs admin or root"));
    }

    #[test]
    fn token_error_converts_into_authentication_error() {
        let err: AuthenticationError = TokenError::Expired.into();
        assert_eq!(err, AuthenticationError::InvalidToken(TokenError::Expired));
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn grant_request_error_wraps_unknown_role() {
        let err: GrantRequestError = ParseRoleError {
            value: "boss".to_string(),
        }
        .into();
        assert!(err.to_string().contains("boss"));
    }
}
