//! CLI tests for `rulestore` commands.
//!
//! Spawns the binary against a temp store and checks stdout, persisted state
//! and exit codes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::thread;

use rulestore::exit_codes;
use rulestore::io::config::{CompilerConfig, StoreConfig, write_config};
use rulestore::io::store::load_repository;
use rulestore::test_support::TestStore;
use rulestore::{AsOf, AssetFormat};

fn rulestore(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rulestore"))
        .current_dir(root)
        .args(args)
        .output()
        .expect("run rulestore")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn ok(root: &Path, args: &[&str]) -> String {
    let output = rulestore(root, args);
    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "rulestore {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    stdout(&output)
}

#[test]
fn init_creates_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    ok(temp.path(), &["init"]);
    assert!(temp.path().join(".rulestore/repository.json").is_file());
    assert!(temp.path().join(".rulestore/config.toml").is_file());

    let again = rulestore(temp.path(), &["init"]);
    assert_eq!(again.status.code(), Some(exit_codes::INVALID));
    ok(temp.path(), &["init", "--force"]);
}

#[test]
fn commands_without_store_are_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = rulestore(temp.path(), &["package", "list"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("rulestore init"));
}

/// Add, check in, edit and check in again; version 1 of the package still
/// assembles the first rule text.
#[test]
fn package_lifecycle_round_trips_through_disk() {
    let store = TestStore::new().expect("store");
    let root = store.root();
    fs::write(root.join("rule1.drl"), "rule 'foo' when Goo1() then end\n").expect("rule file");

    ok(root, &["package", "create", "restPackage1", "-d", "this is package restPackage1"]);
    ok(root, &["package", "header", "restPackage1", "--set", "import com.billasurf.Board"]);
    ok(root, &["asset", "add", "restPackage1", "rule1.drl"]);
    assert_eq!(
        ok(root, &["asset", "checkin", "restPackage1", "rule1", "-m", "version 1"]).trim(),
        "1"
    );
    assert_eq!(
        ok(root, &["package", "checkin", "restPackage1", "-m", "version 1"]).trim(),
        "1"
    );

    fs::write(root.join("rule1-v2.drl"), "rule 'foo2' when Goo2() then end\n").expect("v2");
    ok(root, &["asset", "put", "restPackage1", "rule1", "rule1-v2.drl"]);
    ok(root, &["asset", "checkin", "restPackage1", "rule1", "-m", "version 2", "--author", "eric"]);

    let v1 = ok(root, &["package", "source", "restPackage1", "--version", "1"]);
    assert_eq!(
        v1,
        "package restPackage1\n\nimport com.billasurf.Board\n\nrule 'foo' when Goo1() then end\n"
    );
    let head = ok(root, &["package", "source", "restPackage1"]);
    assert!(head.contains("rule 'foo2'"));

    let asset_v1 = ok(root, &["asset", "get", "restPackage1", "rule1", "--version", "1"]);
    assert_eq!(asset_v1, "rule 'foo' when Goo1() then end\n");

    let repo = load_repository(&store.paths.repository_path).expect("load");
    let pkg = repo.get_package("restPackage1").expect("package");
    assert_eq!(pkg.description(), "this is package restPackage1");
    let rule1 = pkg.asset("rule1").expect("rule1");
    assert_eq!(rule1.format(), AssetFormat::Rule);
    assert_eq!(rule1.latest_version(), 2);
    assert_eq!(rule1.meta().last_contributor.as_deref(), Some("eric"));
    assert_eq!(
        pkg.list_versions()[0].author,
        StoreConfig::default().default_author
    );
}

#[test]
fn errors_map_to_exit_codes() {
    let store = TestStore::new().expect("store");
    let root = store.root();
    ok(root, &["package", "create", "p"]);

    let missing = rulestore(root, &["package", "show", "nope"]);
    assert_eq!(missing.status.code(), Some(exit_codes::NOT_FOUND));

    let taken = rulestore(root, &["package", "create", "p"]);
    assert_eq!(taken.status.code(), Some(exit_codes::CONFLICT));

    let blank = rulestore(root, &["package", "checkin", "p", "-m", "  "]);
    assert_eq!(blank.status.code(), Some(exit_codes::VALIDATION));

    let no_version = rulestore(root, &["package", "source", "p", "--version", "3"]);
    assert_eq!(no_version.status.code(), Some(exit_codes::NOT_FOUND));

    let no_compiler = rulestore(root, &["package", "binary", "p"]);
    assert_eq!(no_compiler.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn purged_asset_makes_old_source_fail() {
    let store = TestStore::new().expect("store");
    let root = store.root();
    fs::write(root.join("A.drl"), "rule A").expect("file");
    ok(root, &["package", "create", "P"]);
    ok(root, &["asset", "add", "P", "A.drl"]);
    ok(root, &["asset", "checkin", "P", "A", "-m", "A.1"]);
    ok(root, &["package", "checkin", "P", "-m", "P.1"]);
    ok(root, &["asset", "remove", "P", "A"]);
    ok(root, &["package", "checkin", "P", "-m", "P.2"]);
    assert_eq!(ok(root, &["asset", "list", "P", "--archived"]).trim(), "A\tdrl\t1");
    assert_eq!(ok(root, &["asset", "purge", "P", "A"]).trim(), "purged 1");

    let old = rulestore(root, &["package", "source", "P", "--version", "1"]);
    assert_eq!(old.status.code(), Some(exit_codes::ASSEMBLY));
    assert!(old.stdout.is_empty());
    assert_eq!(ok(root, &["package", "source", "P", "--version", "2"]), "package P\n");
}

#[test]
fn rename_delete_and_restore_package() {
    let store = TestStore::new().expect("store");
    let root = store.root();
    let id = ok(root, &["package", "create", "p"]);
    ok(root, &["package", "rename", "p", "q"]);
    assert_eq!(ok(root, &["package", "list"]).trim(), "q");

    let shown: serde_json::Value =
        serde_json::from_str(&ok(root, &["package", "show", "q"])).expect("json");
    assert_eq!(shown["id"], id.trim());
    assert_eq!(shown["name"], "q");

    ok(root, &["package", "delete", "q"]);
    assert_eq!(ok(root, &["package", "list"]), "");
    assert_eq!(ok(root, &["package", "list", "--archived"]).trim(), "q");
    ok(root, &["package", "restore", "q"]);
    assert_eq!(ok(root, &["package", "list"]).trim(), "q");
}

#[test]
fn binary_asset_views() {
    let store = TestStore::new().expect("store");
    let root = store.root();
    let image = [0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x00, 0xff];
    fs::write(root.join("Error-image.gif"), image).expect("image");
    ok(root, &["package", "create", "p"]);
    ok(root, &["asset", "add", "p", "Error-image.gif"]);

    let raw = rulestore(root, &["asset", "get", "p", "Error-image", "--binary"]);
    assert_eq!(raw.status.code(), Some(exit_codes::OK));
    assert_eq!(raw.stdout, image);

    ok(root, &["asset", "get", "p", "Error-image", "--binary", "-o", "out.gif"]);
    assert_eq!(fs::read(root.join("out.gif")).expect("out"), image);

    let repo = load_repository(&store.paths.repository_path).expect("load");
    let asset = repo.get_package("p").expect("p").asset("Error-image").expect("asset");
    assert_eq!(asset.format(), AssetFormat::Binary);
    assert_eq!(asset.binary(AsOf::Head).expect("bytes"), image);
}

#[cfg(unix)]
#[test]
fn binary_uses_configured_compiler() {
    let store = TestStore::new().expect("store");
    let root = store.root();
    let config = StoreConfig {
        compiler: CompilerConfig {
            command: vec!["cat".to_string()],
            ..CompilerConfig::default()
        },
        ..StoreConfig::default()
    };
    write_config(&store.paths.config_path, &config).expect("config");
    ok(root, &["package", "create", "p"]);
    ok(root, &["package", "checkin", "p", "-m", "empty"]);

    assert_eq!(ok(root, &["package", "binary", "p", "--version", "1"]), "package p\n");

    let failing = StoreConfig {
        compiler: CompilerConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cat >/dev/null; echo 'no rules' >&2; exit 3".to_string(),
            ],
            ..CompilerConfig::default()
        },
        ..StoreConfig::default()
    };
    write_config(&store.paths.config_path, &failing).expect("config");
    let output = rulestore(root, &["package", "binary", "p"]);
    assert_eq!(output.status.code(), Some(exit_codes::COMPILE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no rules"));
}

#[test]
fn asset_state_and_rename() {
    let store = TestStore::new().expect("store");
    let root = store.root();
    fs::write(root.join("func.function"), "function void foo() {}").expect("file");
    ok(root, &["package", "create", "p"]);
    ok(root, &["asset", "add", "p", "func.function"]);
    assert_eq!(ok(root, &["asset", "state", "p", "func"]).trim(), "Draft");
    ok(root, &["asset", "state", "p", "func", "Approved"]);
    ok(root, &["asset", "rename", "p", "func", "helpers"]);
    assert_eq!(ok(root, &["asset", "state", "p", "helpers"]).trim(), "Approved");

    let missing = rulestore(root, &["asset", "show", "p", "func"]);
    assert_eq!(missing.status.code(), Some(exit_codes::NOT_FOUND));
    let versions: serde_json::Value =
        serde_json::from_str(&ok(root, &["asset", "versions", "p", "helpers"])).expect("json");
    assert_eq!(versions, serde_json::json!([]));
}

/// Parallel processes checking in the same asset each get a distinct version
/// and none of their updates is lost.
#[test]
fn concurrent_cli_checkins_do_not_lose_updates() {
    const PROCESSES: u64 = 8;
    let store = TestStore::new().expect("store");
    let root = store.root();
    fs::write(root.join("a.drl"), "rule a").expect("file");
    ok(root, &["package", "create", "p"]);
    ok(root, &["asset", "add", "p", "a.drl"]);

    let mut versions: Vec<u64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..PROCESSES)
            .map(|_| scope.spawn(|| ok(root, &["asset", "checkin", "p", "a", "-m", "edit"])))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                let printed = handle.join().expect("checkin thread");
                printed.trim().parse().expect("version number")
            })
            .collect()
    });
    versions.sort_unstable();
    assert_eq!(versions, (1..=PROCESSES).collect::<Vec<_>>());

    let repo = load_repository(&store.paths.repository_path).expect("load");
    let asset = repo.get_package("p").expect("p").asset("a").expect("a");
    assert_eq!(asset.latest_version(), PROCESSES);
}
