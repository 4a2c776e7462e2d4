//! Resource access decisions from an ordered list of rules.
//!
//! Rules are evaluated in the order supplied and the first match decides,
//! so whoever assembles the list controls precedence. Evaluation is total:
//! every path yields a definite decision.

use serde::Serialize;

use crate::role::RoleSet;
use crate::rule::{AccessRule, Operator};
use crate::validate::is_path_segment;

/// Wildcard standing for exactly one path segment in `MATCHES` templates.
const SEGMENT_WILDCARD: &str = "*";

/// Outcome of evaluating rules against a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "roles", rename_all = "lowercase")]
pub enum AccessDecision {
    /// The path is reachable with these (non-empty) roles.
    Granted(RoleSet),
    /// No rule admits the path.
    Denied,
}

impl AccessDecision {
    /// Returns true if access was granted.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Returns the granted roles, empty when denied.
    #[must_use]
    pub fn roles(&self) -> RoleSet {
        match self {
            Self::Granted(roles) => roles.clone(),
            Self::Denied => RoleSet::none(),
        }
    }

    /// Splits the decision into `(granted, roles)`.
    #[must_use]
    pub fn into_parts(self) -> (bool, RoleSet) {
        match self {
            Self::Granted(roles) => (true, roles),
            Self::Denied => (false, RoleSet::none()),
        }
    }
}

/// Rule engine over the rules loaded for one principal.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<AccessRule>,
}

impl RuleEngine {
    /// Creates an engine evaluating `rules` in order.
    #[must_use]
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// Returns the rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Decides whether `path` is reachable.
    #[must_use]
    pub fn can_access(&self, path: &str) -> AccessDecision {
        can_access(&self.rules, path)
    }
}

/// Decides whether `path` is reachable under `rules`.
///
/// The first rule whose template matches decides. A matching rule that
/// carries no role proves nothing about the caller, so it denies.
#[must_use]
pub fn can_access(rules: &[AccessRule], path: &str) -> AccessDecision {
    let Some(rule) = rules.iter().find(|rule| rule_matches(rule, path)) else {
        return AccessDecision::Denied;
    };

    if rule.roles().is_empty() {
        AccessDecision::Denied
    } else {
        AccessDecision::Granted(rule.roles().clone())
    }
}

fn rule_matches(rule: &AccessRule, path: &str) -> bool {
    match rule.operator() {
        Operator::Equals => path == rule.template(),
        Operator::StartsWith => path.starts_with(rule.template()),
        Operator::Matches => segments_match(rule.template(), path),
    }
}

/// Segment-wise comparison. Segment counts must agree; there is no
/// recursive wildcard.
fn segments_match(template: &str, path: &str) -> bool {
    let template_parts: Vec<&str> = template.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();

    if template_parts.len() != path_parts.len() {
        return false;
    }

    template_parts
        .iter()
        .zip(&path_parts)
        .all(|(expected, actual)| {
            if *expected == SEGMENT_WILDCARD {
                is_path_segment(actual)
            } else {
                expected == actual
            }
        })
}
