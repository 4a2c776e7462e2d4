//! Core identifiers and error handling for warden.
//!
//! This crate provides the foundational types shared by the access-control
//! library and the server: the rootcause-based `Result` alias, typed
//! identifiers and secret generation.

pub mod error;
pub mod id;
pub mod secret;

pub use error::Result;
pub use id::{AuditEventId, ParseIdError, SessionId};
pub use secret::generate_secret;
