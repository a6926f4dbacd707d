//! Package and asset name validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RepoError, RepoResult};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("name regex")
});

/// Names start with a word character and may contain letters, digits, `_`,
/// `.` and `-`. No whitespace, since a package name becomes the `package`
/// declaration of the assembled source.
pub fn validate_name(field: &'static str, name: &str) -> RepoResult<()> {
    if NAME_RE.is_match(name) {
        return Ok(());
    }
    Err(RepoError::validation(
        field,
        format!("'{name}' is not a valid name"),
    ))
}
