//! Authentication for the warden server.
//!
//! This module provides:
//! - The [`Authenticator`] strategy, selected by configuration
//! - Pipeline processors that authenticate and authorize a request
//! - The login and logout processors
//!
//! # Strategies
//!
//! - [`TokenAuthenticator`]: a signed bearer token alone proves identity.
//! - [`SessionBoundAuthenticator`]: the bearer token must also match the
//!   user bound to a server-issued session id, so a stolen token cannot be
//!   replayed against another session.
//!
//! Either way the token is re-issued on every authenticated request, which
//! keeps active callers logged in while idle ones expire.

pub mod middleware;
pub mod routes;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use chrono::Duration;
use std::sync::Arc;
use warden_access::{AuthenticationError, SessionRecord, TokenError, TokenManager};
use warden_core::SessionId;

pub use middleware::{Authenticate, Authorize};
pub use routes::{Login, Logout, Status};

use crate::config::AuthStrategy;
use crate::error::AuthenticatorError;
use crate::store::SessionStore;

/// Header carrying the session id.
pub const SESSION_ID_HEADER: &str = "session-id";

/// Bearer scheme prefix of the `Authorization` header.
const BEARER_PREFIX: &str = "Bearer ";

/// A caller whose credentials were accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    /// The verified login.
    pub login: String,
    /// The session the caller is bound to, if the strategy uses sessions.
    pub session: Option<SessionId>,
    /// Headers to send back: the renewed token and the echoed session id.
    pub headers: HeaderMap,
}

/// Proves who is calling.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verifies the credentials carried by `headers`.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Authenticated, AuthenticatorError>;

    /// Starts a session for `login` after a successful password check,
    /// returning the headers that carry the new credentials.
    async fn establish(&self, login: &str) -> Result<HeaderMap, AuthenticatorError>;

    /// Ends the session of an authenticated caller, if any.
    async fn end(&self, caller: &Authenticated) -> Result<(), AuthenticatorError>;
}

/// Builds the authenticator for `strategy`.
pub fn authenticator_for(
    strategy: AuthStrategy,
    tokens: Arc<TokenManager>,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
) -> Arc<dyn Authenticator> {
    match strategy {
        AuthStrategy::Token => Arc::new(TokenAuthenticator::new(tokens)),
        AuthStrategy::SessionBound => {
            Arc::new(SessionBoundAuthenticator::new(tokens, sessions, session_ttl))
        }
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthenticationError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthenticationError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthenticationError::MalformedHeader)?;

    value
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
        .ok_or(AuthenticationError::MalformedHeader)
}

fn bearer_header(token: &str) -> Result<HeaderValue, AuthenticatorError> {
    HeaderValue::try_from(format!("{BEARER_PREFIX}{token}")).map_err(|e| {
        AuthenticatorError::Signing(TokenError::SigningFailed {
            reason: e.to_string(),
        })
    })
}

fn session_header(id: &SessionId) -> Result<HeaderValue, AuthenticatorError> {
    HeaderValue::try_from(id.as_str()).map_err(|_| {
        AuthenticatorError::Rejected(AuthenticationError::MalformedHeader)
    })
}

/// Verifies the bearer token and issues its replacement.
fn verify_and_renew(
    tokens: &TokenManager,
    headers: &HeaderMap,
) -> Result<(String, HeaderMap), AuthenticatorError> {
    let token = bearer_token(headers)?;
    let claims = tokens.verify(token).map_err(AuthenticationError::from)?;
    let renewed = tokens.renew(&claims).map_err(AuthenticatorError::Signing)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(AUTHORIZATION, bearer_header(&renewed)?);
    Ok((claims.subject().to_string(), response_headers))
}

/// Bearer token only.
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    tokens: Arc<TokenManager>,
}

impl TokenAuthenticator {
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Authenticated, AuthenticatorError> {
        let (login, headers) = verify_and_renew(&self.tokens, headers)?;
        Ok(Authenticated {
            login,
            session: None,
            headers,
        })
    }

    async fn establish(&self, login: &str) -> Result<HeaderMap, AuthenticatorError> {
        let token = self.tokens.issue(login).map_err(AuthenticatorError::Signing)?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer_header(&token)?);
        Ok(headers)
    }

    async fn end(&self, _caller: &Authenticated) -> Result<(), AuthenticatorError> {
        Ok(())
    }
}

/// Bearer token bound to a server-issued session.
pub struct SessionBoundAuthenticator {
    tokens: Arc<TokenManager>,
    sessions: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionBoundAuthenticator {
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>, sessions: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self {
            tokens,
            sessions,
            ttl,
        }
    }
}

#[async_trait]
impl Authenticator for SessionBoundAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Authenticated, AuthenticatorError> {
        let (login, mut response_headers) = verify_and_renew(&self.tokens, headers)?;

        let session = headers
            .get(SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(SessionId::from)
            .ok_or(AuthenticationError::MissingCredentials)?;

        let record = self.sessions.get(&session).await?;
        if !record.is_bound_to(&login) {
            tracing::debug!(
                login = %login,
                session_user = record.current_user(),
                "session belongs to another user"
            );
            return Err(AuthenticationError::SessionMismatch.into());
        }

        // Activity extends the session along with the token.
        self.sessions.put(&session, &record, self.ttl).await?;

        response_headers.insert(SESSION_ID_HEADER, session_header(&session)?);
        Ok(Authenticated {
            login,
            session: Some(session),
            headers: response_headers,
        })
    }

    async fn establish(&self, login: &str) -> Result<HeaderMap, AuthenticatorError> {
        let token = self.tokens.issue(login).map_err(AuthenticatorError::Signing)?;
        let session = SessionId::generate();
        self.sessions
            .put(&session, &SessionRecord::new(login), self.ttl)
            .await?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer_header(&token)?);
        headers.insert(SESSION_ID_HEADER, session_header(&session)?);
        Ok(headers)
    }

    async fn end(&self, caller: &Authenticated) -> Result<(), AuthenticatorError> {
        if let Some(session) = &caller.session {
            self.sessions.delete(session).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionStoreError;
    use crate::store::MemorySessionStore;

    fn tokens() -> Arc<TokenManager> {
        Arc::new(TokenManager::new(b"test-secret".to_vec(), Duration::minutes(5)))
    }

    fn bearer(headers: &mut HeaderMap, token: &str) {
        headers.insert(AUTHORIZATION, bearer_header(token).expect("header"));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            bearer_token(&headers),
            Err(AuthenticationError::MissingCredentials)
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), Err(AuthenticationError::MalformedHeader));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), Err(AuthenticationError::MalformedHeader));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Ok("abc"));
    }

    #[tokio::test]
    async fn token_strategy_renews_token() {
        let tokens = tokens();
        let authenticator = TokenAuthenticator::new(Arc::clone(&tokens));

        let issued = authenticator.establish("alice").await.expect("establish");
        let caller = authenticator.authenticate(&issued).await.expect("authenticate");

        assert_eq!(caller.login, "alice");
        assert!(caller.session.is_none());
        let renewed = caller.headers.get(AUTHORIZATION).expect("renewed token");
        assert!(renewed.to_str().expect("ascii").starts_with(BEARER_PREFIX));
    }

    #[tokio::test]
    async fn token_strategy_rejects_foreign_token() {
        let authenticator = TokenAuthenticator::new(tokens());
        let foreign = TokenManager::new(b"other-secret".to_vec(), Duration::minutes(5))
            .issue("alice")
            .expect("issue");

        let mut headers = HeaderMap::new();
        bearer(&mut headers, &foreign);
        let err = authenticator.authenticate(&headers).await.expect_err("rejected");
        assert_eq!(
            err,
            AuthenticatorError::Rejected(AuthenticationError::InvalidToken(
                TokenError::InvalidSignature
            ))
        );
    }

    #[tokio::test]
    async fn session_strategy_binds_token_to_session() {
        let tokens = tokens();
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let authenticator =
            SessionBoundAuthenticator::new(Arc::clone(&tokens), sessions, Duration::minutes(5));

        let issued = authenticator.establish("alice").await.expect("establish");
        assert!(issued.contains_key(SESSION_ID_HEADER));

        let caller = authenticator.authenticate(&issued).await.expect("authenticate");
        assert_eq!(caller.login, "alice");
        assert_eq!(
            caller.headers.get(SESSION_ID_HEADER),
            issued.get(SESSION_ID_HEADER)
        );
    }

    #[tokio::test]
    async fn session_strategy_rejects_token_of_another_user() {
        let tokens = tokens();
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let authenticator =
            SessionBoundAuthenticator::new(Arc::clone(&tokens), sessions, Duration::minutes(5));

        let alice = authenticator.establish("alice").await.expect("establish");
        let mallory_token = tokens.issue("mallory").expect("issue");

        let mut replay = alice.clone();
        bearer(&mut replay, &mallory_token);
        let err = authenticator.authenticate(&replay).await.expect_err("mismatch");
        assert_eq!(
            err,
            AuthenticatorError::Rejected(AuthenticationError::SessionMismatch)
        );
    }

    #[tokio::test]
    async fn session_strategy_requires_session_header() {
        let tokens = tokens();
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let authenticator =
            SessionBoundAuthenticator::new(Arc::clone(&tokens), sessions, Duration::minutes(5));

        let mut headers = HeaderMap::new();
        bearer(&mut headers, &tokens.issue("alice").expect("issue"));
        let err = authenticator.authenticate(&headers).await.expect_err("missing");
        assert_eq!(
            err,
            AuthenticatorError::Rejected(AuthenticationError::MissingCredentials)
        );

        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("unknown"));
        let err = authenticator.authenticate(&headers).await.expect_err("unknown");
        assert_eq!(
            err,
            AuthenticatorError::Rejected(AuthenticationError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn ending_a_session_deletes_it() {
        let tokens = tokens();
        let sessions = Arc::new(MemorySessionStore::new());
        let authenticator = SessionBoundAuthenticator::new(
            Arc::clone(&tokens),
            sessions.clone(),
            Duration::minutes(5),
        );

        let issued = authenticator.establish("alice").await.expect("establish");
        let caller = authenticator.authenticate(&issued).await.expect("authenticate");
        authenticator.end(&caller).await.expect("end");

        let session = caller.session.expect("session");
        assert_eq!(
            sessions.get(&session).await,
            Err(SessionStoreError::NotFound)
        );
    }
}
