//! Repository load/save helpers with schema + invariant validation.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::record::RepositoryRecord;
use crate::repository::Repository;

const REPOSITORY_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/repository/v1.schema.json"
));

static SCHEMA: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(REPOSITORY_SCHEMA).map_err(|err| format!("parse schema: {err}"))?;
    jsonschema::validator_for(&schema).map_err(|err| format!("invalid schema: {err}"))
});

/// Load and validate a repository from disk (schema + invariants).
pub fn load_repository(path: &Path) -> Result<Repository> {
    debug!(path = %path.display(), "loading repository");
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read repository {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse repository {}", path.display()))?;
    validate_schema(&value)?;
    let record: RepositoryRecord = serde_json::from_value(value)
        .with_context(|| format!("deserialize repository {}", path.display()))?;
    validate_record_invariants(&record)?;
    let packages = record.packages.len();
    let repo = Repository::from_record(record)
        .with_context(|| format!("rebuild repository {}", path.display()))?;
    debug!(packages, "repository loaded");
    Ok(repo)
}

/// Write the repository to disk in canonical order (temp file + rename).
pub fn write_repository(path: &Path, repo: &Repository) -> Result<()> {
    let record = repo.to_record();
    debug!(path = %path.display(), packages = record.packages.len(), "writing repository");
    let mut buf = serde_json::to_string_pretty(&record)?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

fn validate_schema(value: &Value) -> Result<()> {
    let validator = SCHEMA.as_ref().map_err(|err| anyhow!("{err}"))?;
    let messages = validator
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    if !messages.is_empty() {
        return Err(anyhow!(
            "repository schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn validate_record_invariants(record: &RepositoryRecord) -> Result<()> {
    let errors = validate_invariants(record);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("repository invariants failed: {}", errors.join("; ")))
}
