//! Versioned content repository for rule packages.
//!
//! Packages hold a header and a set of assets (rules, functions, DSL files,
//! models, binaries). Every asset and every package carries its own
//! append-only version ledger; a package version pins one version of each
//! live asset, so any historical package can be reassembled into the exact
//! source that was in force at that checkin.
//!
//! - **[`core`]**: Pure, deterministic logic (ledgers, formats, source
//!   assembly, record invariants). No I/O.
//! - **[`io`]**: Side-effecting operations (persistence, config, the external
//!   compiler process).
//!
//! [`repository`], [`package`] and [`asset`] hold the live, lock-protected
//! entities that tie the two together.

pub mod asset;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod package;
pub mod record;
pub mod repository;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use asset::Asset;
pub use crate::core::format::AssetFormat;
pub use crate::core::types::AsOf;
pub use error::{ErrorKind, RepoError, RepoResult};
pub use package::Package;
pub use repository::Repository;
