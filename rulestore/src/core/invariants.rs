//! Semantic invariants of a persisted repository not expressible via JSON Schema.

use std::collections::HashSet;

use uuid::Uuid;

use crate::core::ledger::VersionLedger;
use crate::core::types::PackageSnapshot;
use crate::record::{PackageRecord, RECORD_FORMAT_VERSION, RepositoryRecord};

/// Check semantic invariants of a repository record:
/// - Supported `format_version`
/// - No duplicate package or asset ids
/// - `archived_at` set exactly on archived packages and assets
/// - Live package names unique; live asset names unique per package
/// - Ledgers numbered 1..=N without gaps
/// - Pinned asset refs sorted by name, unique, and at version >= 1
pub fn validate_invariants(record: &RepositoryRecord) -> Vec<String> {
    let mut errors = Vec::new();
    if record.format_version != RECORD_FORMAT_VERSION {
        errors.push(format!(
            "unsupported format_version {} (expected {})",
            record.format_version, RECORD_FORMAT_VERSION
        ));
    }

    let mut ids: HashSet<Uuid> = HashSet::new();
    let mut live_packages: HashSet<&str> = HashSet::new();
    for package in &record.packages {
        if !ids.insert(package.id) {
            errors.push(format!("duplicate id '{}' at {}", package.id, package.name));
        }
        if package.archived != package.archived_at.is_some() {
            errors.push(format!("{}: archived and archived_at disagree", package.name));
        }
        if !package.archived && !live_packages.insert(package.name.as_str()) {
            errors.push(format!("duplicate live package name '{}'", package.name));
        }
        validate_package(package, &mut ids, &mut errors);
    }
    errors
}

fn validate_package(package: &PackageRecord, ids: &mut HashSet<Uuid>, errors: &mut Vec<String>) {
    let path = package.name.as_str();
    check_numbering(path, &package.versions, errors);
    check_trees(path, &package.versions, errors);

    let mut live_assets: HashSet<&str> = HashSet::new();
    for asset in &package.assets {
        let asset_path = format!("{}/{}", path, asset.name);
        if !ids.insert(asset.id) {
            errors.push(format!("duplicate id '{}' at {}", asset.id, asset_path));
        }
        if asset.archived != asset.archived_at.is_some() {
            errors.push(format!("{}: archived and archived_at disagree", asset_path));
        }
        if !asset.archived && !live_assets.insert(asset.name.as_str()) {
            errors.push(format!("{}: duplicate live asset name", asset_path));
        }
        check_numbering(&asset_path, &asset.versions, errors);
    }
}

fn check_numbering<S>(path: &str, ledger: &VersionLedger<S>, errors: &mut Vec<String>) {
    for (position, entry) in ledger.entries().iter().enumerate() {
        let expected = position as u64 + 1;
        if entry.version != expected {
            errors.push(format!(
                "{}: version {} recorded where {} was expected",
                path, entry.version, expected
            ));
            return;
        }
    }
}

fn check_trees(path: &str, ledger: &VersionLedger<PackageSnapshot>, errors: &mut Vec<String>) {
    for entry in ledger.entries() {
        let refs = &entry.snapshot.asset_refs;
        if !refs.windows(2).all(|pair| pair[0].name < pair[1].name) {
            errors.push(format!(
                "{}@{}: asset refs must be sorted by unique name",
                path, entry.version
            ));
        }
        if let Some(bad) = refs.iter().find(|r| r.version == 0) {
            errors.push(format!(
                "{}@{}: asset '{}' pinned at version 0",
                path, entry.version, bad.name
            ));
        }
    }
}
