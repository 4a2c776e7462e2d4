//! Access rules: how a request path is compared against a template.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{InvalidRuleError, ParseOperatorError};
use crate::role::RoleSet;

/// How a rule's template is compared against a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    /// Exact string equality.
    Equals,
    /// Literal prefix, with no separator semantics.
    StartsWith,
    /// Segment-wise comparison where `*` stands for one path segment.
    Matches,
}

impl Operator {
    /// Returns the wire name of the operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::StartsWith => "STARTS_WITH",
            Self::Matches => "MATCHES",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ParseOperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EQUALS" => Ok(Self::Equals),
            "STARTS_WITH" => Ok(Self::StartsWith),
            "MATCHES" => Ok(Self::Matches),
            other => Err(ParseOperatorError {
                value: other.to_string(),
            }),
        }
    }
}

/// A path pattern without roles, as stored in a resource group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PathPattern {
    operator: Operator,
    template: String,
}

impl PathPattern {
    /// Creates a pattern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleError::EmptyTemplate` if `template` is empty.
    pub fn new(operator: Operator, template: impl Into<String>) -> Result<Self, InvalidRuleError> {
        let template = template.into();
        if template.is_empty() {
            return Err(InvalidRuleError::EmptyTemplate);
        }
        Ok(Self { operator, template })
    }

    /// Returns the comparison operator.
    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the template the path is compared against.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Attaches the roles a principal holds when this pattern admits a path.
    #[must_use]
    pub fn with_roles(self, roles: RoleSet) -> AccessRule {
        AccessRule {
            operator: self.operator,
            template: self.template,
            roles,
        }
    }
}

/// A condition under which a principal reaches a resource, and the roles
/// the principal then holds for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRule {
    operator: Operator,
    template: String,
    roles: RoleSet,
}

impl AccessRule {
    /// Creates a rule.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleError::EmptyTemplate` if `template` is empty.
    pub fn new(
        operator: Operator,
        template: impl Into<String>,
        roles: RoleSet,
    ) -> Result<Self, InvalidRuleError> {
        Ok(PathPattern::new(operator, template)?.with_roles(roles))
    }

    /// Returns the comparison operator.
    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the template the path is compared against.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the roles granted when the rule matches.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }
}
