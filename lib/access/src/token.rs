//! Signed, time-limited bearer tokens.
//!
//! Tokens use the compact `header.claims.signature` layout of an HS256 JWT:
//! each part is unpadded URL-safe base64 and the signature is
//! HMAC-SHA256 over `header.claims`. The signature is checked before any
//! part is decoded, so a tampered token never reaches claim parsing.
//!
//! A token proves identity only. Capabilities are always re-derived from
//! stored grants.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Serialize, Deserialize)]
struct WireClaims {
    username: String,
    exp: i64,
}

/// Verified content of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    subject: String,
    expires_at: DateTime<Utc>,
}

impl TokenClaims {
    /// Returns the identity the token was issued for.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the absolute expiry, to the second.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Issues a token for `subject` that expires `ttl` from now.
///
/// # Errors
///
/// Returns `TokenError::SigningFailed` if `ttl` is not positive, if the
/// expiry falls outside the representable time range, or if the claims
/// cannot be encoded.
pub fn issue(subject: &str, secret: &[u8], ttl: Duration) -> Result<String, TokenError> {
    issue_at(subject, secret, ttl, Utc::now())
}

/// Issues a token as if the current time were `now`.
///
/// # Errors
///
/// See [`issue`].
pub fn issue_at(
    subject: &str,
    secret: &[u8],
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    if ttl <= Duration::zero() {
        return Err(TokenError::SigningFailed {
            reason: format!("lifetime must be positive, got {ttl}"),
        });
    }
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| TokenError::SigningFailed {
            reason: format!("expiry {ttl} after {now} is out of range"),
        })?;

    let header = Header {
        alg: ALGORITHM.to_string(),
        typ: TOKEN_TYPE.to_string(),
    };
    let claims = WireClaims {
        username: subject.to_string(),
        exp: expires_at.timestamp(),
    };

    let header_json = serde_json::to_vec(&header).map_err(|e| TokenError::SigningFailed {
        reason: e.to_string(),
    })?;
    let claims_json = serde_json::to_vec(&claims).map_err(|e| TokenError::SigningFailed {
        reason: e.to_string(),
    })?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = sign(secret, &signing_input)?;

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

/// Verifies `token` and returns its claims.
///
/// # Errors
///
/// - `InvalidSignature` if the token is not signed by `secret`
/// - `MalformedClaims` if a validly signed token lacks a subject or expiry
/// - `Expired` if the expiry has passed
pub fn verify(secret: &[u8], token: &str) -> Result<TokenClaims, TokenError> {
    verify_at(secret, token, Utc::now())
}

/// Verifies `token` as if the current time were `now`.
///
/// # Errors
///
/// See [`verify`].
pub fn verify_at(secret: &[u8], token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
    let (signing_input, signature_b64) = token
        .rsplit_once('.')
        .ok_or(TokenError::InvalidSignature)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidSignature)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    // Signed by us from here on; anything unexpected is a malformed token.
    let (header_b64, claims_b64) = signing_input
        .split_once('.')
        .ok_or_else(|| malformed("missing claims segment"))?;

    let header: Header = decode_part(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(malformed("unsupported algorithm"));
    }

    let claims: WireClaims = decode_part(claims_b64)?;
    if claims.username.is_empty() {
        return Err(malformed("empty subject"));
    }
    let expires_at =
        DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| malformed("expiry out of range"))?;

    if now >= expires_at {
        return Err(TokenError::Expired);
    }

    Ok(TokenClaims {
        subject: claims.username,
        expires_at,
    })
}

fn sign(secret: &[u8], signing_input: &str) -> Result<Vec<u8>, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| TokenError::SigningFailed {
        reason: e.to_string(),
    })?;
    mac.update(signing_input.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| malformed(&e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| malformed(&e.to_string()))
}

fn malformed(reason: &str) -> TokenError {
    TokenError::MalformedClaims {
        reason: reason.to_string(),
    }
}

/// Issues and verifies tokens with the process-wide secret.
///
/// The secret is set once at start-up and only read afterwards. Replacing
/// it invalidates every outstanding token.
#[derive(Clone)]
pub struct TokenManager {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenManager {
    /// Creates a manager signing with `secret`, issuing tokens valid for `ttl`.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Returns the lifetime of issued tokens.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `subject`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::SigningFailed` if signing fails.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        issue(subject, &self.secret, self.ttl)
    }

    /// Verifies a token.
    ///
    /// # Errors
    ///
    /// See [`verify`].
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        verify(&self.secret, token)
    }

    /// Re-issues a token for the same subject with a fresh expiry window.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::SigningFailed` if signing fails.
    pub fn renew(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        self.issue(claims.subject())
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}
