//! Shape checks for user-supplied names.
//!
//! These are syntactic only. Whether a user or group exists is for the
//! data layer to answer.

use regex::Regex;
use std::sync::LazyLock;

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{4,}[0-9]*$").expect("valid regex"));

static PASSWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S{4,60}$").expect("valid regex"));

static GROUP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+[0-9]*$").expect("valid regex"));

static PATH_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_\-]+$").expect("valid regex"));

static AUDIT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8}$").expect("valid regex"));

/// At least four ASCII letters, optionally followed by digits.
#[must_use]
pub fn is_username(value: &str) -> bool {
    USERNAME.is_match(value)
}

/// Four to sixty non-whitespace characters.
#[must_use]
pub fn is_password(value: &str) -> bool {
    PASSWORD.is_match(value)
}

/// ASCII letters, optionally followed by digits.
#[must_use]
pub fn is_group_name(value: &str) -> bool {
    GROUP_NAME.is_match(value)
}

/// One path segment: ASCII letters, digits, `_` or `-`.
#[must_use]
pub fn is_path_segment(value: &str) -> bool {
    PATH_SEGMENT.is_match(value)
}

/// An audit query date in `YYYYMMDD` form. Only the shape is checked.
#[must_use]
pub fn is_audit_date(value: &str) -> bool {
    AUDIT_DATE.is_match(value)
}
