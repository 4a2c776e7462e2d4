//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`TOKEN__TTL_MINUTES=60`).

use chrono::Duration;
use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// PostgreSQL connection URL. Absent selects in-memory storage.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Token configuration.
    #[serde(default)]
    pub token: TokenConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Account created at start-up.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Longest accepted token or session lifetime: ten years.
const MAX_TTL_MINUTES: i64 = 10 * 366 * 24 * 60;

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Token-related configuration.
#[derive(Clone, Deserialize)]
pub struct TokenConfig {
    /// Signing secret. Absent generates a random secret at start-up, which
    /// invalidates every token on restart.
    #[serde(default)]
    pub secret: Option<String>,

    /// Token lifetime in minutes.
    #[serde(default = "default_token_ttl_minutes")]
    pub ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    24 * 60
}

impl TokenConfig {
    /// Returns the token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// How callers prove their identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStrategy {
    /// A bearer token alone.
    #[default]
    Token,
    /// A bearer token bound to a server-issued session id.
    SessionBound,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Strategy applied to every authenticated route.
    #[serde(default)]
    pub strategy: AuthStrategy,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in minutes.
    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_session_ttl_minutes() -> i64 {
    24 * 60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl SessionConfig {
    /// Returns the session lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// Root account created (or whose password is reset) at start-up.
#[derive(Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl BootstrapConfig {
    /// Returns the credentials if both are configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Some((login, password)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects lifetimes and intervals the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming the offending key.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        check_ttl("token.ttl_minutes", self.token.ttl_minutes)?;
        check_ttl("session.ttl_minutes", self.session.ttl_minutes)?;
        if self.session.cleanup_interval_seconds == 0 {
            return Err(config::ConfigError::Message(
                "session.cleanup_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_ttl(key: &str, minutes: i64) -> Result<(), config::ConfigError> {
    if (1..=MAX_TTL_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(config::ConfigError::Message(format!(
            "{key} must be between 1 and {MAX_TTL_MINUTES} minutes, got {minutes}"
        )))
    }
}
