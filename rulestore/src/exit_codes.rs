//! Stable exit codes for rulestore CLI commands.

use crate::error::ErrorKind;

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid store layout/config/arguments or any other failure.
pub const INVALID: i32 = 1;
/// A package, asset or version does not exist.
pub const NOT_FOUND: i32 = 2;
/// Name already taken.
pub const CONFLICT: i32 = 3;
/// Rejected input (blank comment, bad name, unknown format).
pub const VALIDATION: i32 = 4;
/// A historical package version references a purged asset version.
pub const ASSEMBLY: i32 = 5;
/// The external compiler rejected the assembled source.
pub const COMPILE: i32 = 6;

pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => NOT_FOUND,
        ErrorKind::Conflict => CONFLICT,
        ErrorKind::Validation => VALIDATION,
        ErrorKind::Assembly => ASSEMBLY,
        ErrorKind::Compile => COMPILE,
    }
}
