//! Session records binding a server-issued session id to a user.
//!
//! A session is created at login and looked up on every request made with
//! the session-bound strategy. The record holds only the bound identity;
//! the store owning it tracks expiry.

use serde::{Deserialize, Serialize};

/// What the session store keeps for one session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "user")]
    current_user: String,
}

impl SessionRecord {
    /// Creates a record bound to `login`.
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            current_user: login.into(),
        }
    }

    /// Returns the login the session is bound to.
    #[must_use]
    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    /// Returns true if the session is bound to `subject`.
    #[must_use]
    pub fn is_bound_to(&self, subject: &str) -> bool {
        self.current_user == subject
    }
}
