//! Decoding of grant request bodies.
//!
//! A grant request is a JSON object of group name to role names:
//!
//! ```json
//! { "finance": ["reader", "editor"], "ops": ["admin"] }
//! ```
//!
//! Decoding is all-or-nothing: one bad group or role rejects the body.

use std::collections::BTreeMap;

use crate::delegation::GroupGrants;
use crate::error::GrantRequestError;
use crate::role::RoleSet;
use crate::validate::is_group_name;

/// A validated grant request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    grants: GroupGrants,
}

impl GrantRequest {
    /// Decodes and validates a JSON body.
    ///
    /// # Errors
    ///
    /// - `Malformed` if the body is not an object of string arrays
    /// - `Empty` if no group is named
    /// - `InvalidGroupName` if a group name has the wrong shape
    /// - `UnknownRole` if any role string is outside the closed set
    pub fn from_json(body: &[u8]) -> Result<Self, GrantRequestError> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_slice(body).map_err(|e| GrantRequestError::Malformed {
                reason: e.to_string(),
            })?;
        Self::from_raw(raw)
    }

    /// Validates already-parsed group/role names.
    ///
    /// # Errors
    ///
    /// See [`GrantRequest::from_json`].
    pub fn from_raw(raw: BTreeMap<String, Vec<String>>) -> Result<Self, GrantRequestError> {
        if raw.is_empty() {
            return Err(GrantRequestError::Empty);
        }

        let mut grants = GroupGrants::new();
        for (group, roles) in raw {
            if !is_group_name(&group) {
                return Err(GrantRequestError::InvalidGroupName { group });
            }
            grants.insert(group, RoleSet::parse(roles)?);
        }

        Ok(Self { grants })
    }

    /// Returns the requested roles per group.
    #[must_use]
    pub fn grants(&self) -> &GroupGrants {
        &self.grants
    }

    /// Consumes the request, returning the requested roles per group.
    #[must_use]
    pub fn into_grants(self) -> GroupGrants {
        self.grants
    }
}
