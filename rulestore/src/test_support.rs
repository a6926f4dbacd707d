//! Test-only helpers for building records, repositories and stores.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use crate::core::format::AssetFormat;
use crate::core::ledger::VersionLedger;
use crate::core::types::AssetSnapshot;
use crate::error::{RepoError, RepoResult};
use crate::io::compiler::Compiler;
use crate::io::init::{InitOptions, StorePaths, init_store};
use crate::record::{AssetRecord, PackageRecord};
use crate::repository::Repository;

/// Fixed timestamp so records compare equal across runs.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Live package record with no versions and no assets.
pub fn package_record(name: &str) -> PackageRecord {
    PackageRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: String::new(),
        header: String::new(),
        archived: false,
        archived_at: None,
        created_at: fixed_time(),
        last_modified: fixed_time(),
        last_contributor: None,
        versions: VersionLedger::new(),
        assets: Vec::new(),
    }
}

/// Live rule asset record with `versions` checked-in versions
/// (`"{name} v1"`, `"{name} v2"`, …).
pub fn asset_record(name: &str, versions: u64) -> AssetRecord {
    let mut ledger = VersionLedger::new();
    for n in 1..=versions {
        ledger
            .checkin_at(
                AssetSnapshot::new(AssetFormat::Rule, format!("{name} v{n}")),
                &format!("version {n}"),
                "tester",
                fixed_time(),
            )
            .expect("fixture checkin");
    }
    AssetRecord {
        id: Uuid::new_v4(),
        name: name.to_string(),
        state: crate::asset::DEFAULT_STATE.to_string(),
        archived: false,
        archived_at: None,
        created_at: fixed_time(),
        last_modified: fixed_time(),
        last_contributor: None,
        working: AssetSnapshot::new(AssetFormat::Rule, format!("{name} v{versions}")),
        versions: ledger,
    }
}

/// Build the `restPackage1` package: a header, a model, a function, a DSL
/// mapping, a rule and a binary image, all checked in, then a package checkin.
pub fn rest_package_fixture(repo: &Repository) -> RepoResult<()> {
    let pkg = repo.create_package("restPackage1", "this is package restPackage1")?;
    pkg.update_header("import com.billasurf.Board\nglobal com.billasurf.Person customer")?;

    let assets: [(&str, AssetFormat, &[u8]); 6] = [
        (
            "model1",
            AssetFormat::Model,
            b"declare Album1\n genre1: String \n end",
        ),
        (
            "func",
            AssetFormat::Function,
            b"function void foo() { System.out.println(version 1); }",
        ),
        (
            "myDSL",
            AssetFormat::DslMapping,
            b"[then]call a func=foo();\n[then]call another func=foo2();",
        ),
        (
            "rule1",
            AssetFormat::Rule,
            b"rule 'foo' when Goo1() then end",
        ),
        (
            "Error-image",
            AssetFormat::Binary,
            &[0x47, 0x49, 0x46, 0x38, 0x39, 0x61],
        ),
        (
            "rule2",
            AssetFormat::Rule,
            b"rule 'bar' when Goo2() then end",
        ),
    ];
    for (name, format, content) in assets {
        let asset = pkg.add_asset(name, format, content)?;
        asset.checkin("version 1", "tester")?;
    }
    pkg.checkin("version 1", "tester")?;
    Ok(())
}

/// Compiler double: echoes the source as the artifact or fails with a fixed
/// message.
#[derive(Debug, Clone)]
pub struct FakeCompiler {
    failure: Option<String>,
}

impl FakeCompiler {
    pub fn succeeding() -> Self {
        Self { failure: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
        }
    }
}

impl Compiler for FakeCompiler {
    fn compile(&self, source: &str) -> RepoResult<Vec<u8>> {
        match &self.failure {
            Some(message) => Err(RepoError::Compile(message.clone())),
            None => Ok(source.as_bytes().to_vec()),
        }
    }
}

/// Initialized `.rulestore/` in a temp directory that lives as long as the
/// value.
pub struct TestStore {
    temp: TempDir,
    pub paths: StorePaths,
}

impl TestStore {
    pub fn new() -> anyhow::Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = init_store(temp.path(), &InitOptions { force: false })?;
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }
}
