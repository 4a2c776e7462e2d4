//! Access control for warden.
//!
//! This crate is pure and synchronous. It provides:
//! - The grant model (`Role`, `RoleSet`, `AccessRule`, `GroupGrants`)
//! - The rule engine deciding whether a path is reachable
//! - The delegation check deciding who may grant what
//! - Signed bearer tokens and session records
//! - Shape checks for user-supplied names
//!
//! # Example
//!
//! ```
//! use warden_access::{AccessRule, GroupGrants, Operator, Role, RoleSet, can_access, may_grant};
//!
//! let rules = vec![
//!     AccessRule::new(Operator::StartsWith, "/resource", RoleSet::from([Role::Reader]))
//!         .expect("non-empty template"),
//! ];
//! let (granted, roles) = can_access(&rules, "/resource/report").into_parts();
//! assert!(granted);
//! assert!(roles.contains(Role::Reader));
//!
//! let actor: GroupGrants = [("finance", RoleSet::from([Role::Admin]))].into_iter().collect();
//! let requested: GroupGrants = [("finance", RoleSet::from([Role::Root]))].into_iter().collect();
//! assert!(may_grant(&actor, &requested).is_err());
//! ```

pub mod delegation;
pub mod engine;
pub mod error;
pub mod grants;
pub mod principal;
pub mod role;
pub mod rule;
pub mod session;
pub mod token;
pub mod validate;

pub use delegation::{GroupGrants, may_grant};
pub use engine::{AccessDecision, RuleEngine, can_access};
pub use error::{
    AuthenticationError, GrantError, GrantRequestError, InvalidRuleError, ParseOperatorError,
    ParseRoleError, TokenError,
};
pub use grants::GrantRequest;
pub use principal::Principal;
pub use role::{Role, RoleSet};
pub use rule::{AccessRule, Operator, PathPattern};
pub use session::SessionRecord;
pub use token::{TokenClaims, TokenManager};
