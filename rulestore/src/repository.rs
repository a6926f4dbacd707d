//! Top-level name → package index.
//!
//! The index lock is the first lock in the crate-wide order (index →
//! package → asset set → asset). Rename and delete hold the index write lock
//! while they take the package lock, so they cannot interleave with a package
//! checkin that is already running.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::core::names::validate_name;
use crate::error::{RepoError, RepoResult};
use crate::package::Package;
use crate::record::{RECORD_FORMAT_VERSION, RepositoryRecord, archive_stamp};

#[derive(Debug, Default)]
pub struct Repository {
    index: RwLock<PackageIndex>,
}

#[derive(Debug, Default)]
struct PackageIndex {
    live: BTreeMap<String, Arc<Package>>,
    /// Soft-deleted packages in the order they were archived.
    archived: Vec<Arc<Package>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_package(&self, name: &str, description: &str) -> RepoResult<Arc<Package>> {
        validate_name("package name", name)?;
        let mut index = self.write_index();
        if index.live.contains_key(name) {
            return Err(RepoError::conflict("package", name));
        }
        let package = Arc::new(Package::new(name.to_string(), description.to_string()));
        index.live.insert(name.to_string(), Arc::clone(&package));
        info!(package = name, id = %package.id(), "package created");
        Ok(package)
    }

    pub fn get_package(&self, name: &str) -> RepoResult<Arc<Package>> {
        debug!(package = name, "package lookup");
        self.read_index()
            .live
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::not_found("package", name))
    }

    /// Live packages in name order.
    pub fn list_packages(&self) -> Vec<Arc<Package>> {
        self.read_index().live.values().cloned().collect()
    }

    pub fn list_archived_packages(&self) -> Vec<Arc<Package>> {
        self.read_index().archived.clone()
    }

    /// Rename a live package. Its id, versions and assets are unchanged.
    pub fn rename_package(&self, old_name: &str, new_name: &str) -> RepoResult<()> {
        validate_name("package name", new_name)?;
        let mut index = self.write_index();
        if !index.live.contains_key(old_name) {
            return Err(RepoError::not_found("package", old_name));
        }
        if index.live.contains_key(new_name) {
            return Err(RepoError::conflict("package", new_name));
        }
        let package = index
            .live
            .remove(old_name)
            .ok_or_else(|| RepoError::not_found("package", old_name))?;
        if let Err(err) = package.rename(new_name) {
            index.live.insert(old_name.to_string(), package);
            return Err(err);
        }
        index.live.insert(new_name.to_string(), package);
        info!(from = old_name, to = new_name, "package renamed");
        Ok(())
    }

    /// Archive a package. Lookups by name fail afterwards; history is kept.
    pub fn delete_package(&self, name: &str) -> RepoResult<()> {
        let mut index = self.write_index();
        let package = index
            .live
            .remove(name)
            .ok_or_else(|| RepoError::not_found("package", name))?;
        let previous = index.archived.last().and_then(|archived| archived.archived_at());
        package.archive(archive_stamp(previous));
        index.archived.push(package);
        info!(package = name, "package archived");
        Ok(())
    }

    /// Bring back the most recently archived package called `name`.
    pub fn restore_package(&self, name: &str) -> RepoResult<Arc<Package>> {
        let mut index = self.write_index();
        let position = index
            .archived
            .iter()
            .rposition(|package| package.name() == name)
            .ok_or_else(|| RepoError::not_found("archived package", name))?;
        if index.live.contains_key(name) {
            return Err(RepoError::conflict("package", name));
        }
        let package = index.archived.remove(position);
        package.restore();
        index.live.insert(name.to_string(), Arc::clone(&package));
        info!(package = name, "package restored");
        Ok(package)
    }

    /// Hard-delete every package called `name`, live or archived, with all
    /// of its history. Returns how many packages were removed. Handles still
    /// held to a purged package or its assets reject every mutation.
    pub fn purge_package(&self, name: &str) -> RepoResult<usize> {
        let mut index = self.write_index();
        let mut removed: Vec<_> = index.live.remove(name).into_iter().collect();
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut index.archived)
            .into_iter()
            .partition(|package| package.name() == name);
        index.archived = kept;
        removed.extend(gone);
        for package in &removed {
            package.mark_purged();
        }
        let purged = removed.len();
        if purged == 0 {
            return Err(RepoError::not_found("package", name));
        }
        warn!(package = name, purged, "package history purged");
        Ok(purged)
    }

    /// Check in the working copy of `asset` in `package`.
    ///
    /// Only the asset gets a new version; the package tree is untouched until
    /// the package itself is checked in.
    pub fn checkin_asset(
        &self,
        package: &str,
        asset: &str,
        comment: &str,
        author: &str,
    ) -> RepoResult<u64> {
        self.get_package(package)?
            .asset(asset)?
            .checkin(comment, author)
    }

    /// Check in `package`, pinning the latest version of each live asset.
    pub fn checkin_package(&self, package: &str, comment: &str, author: &str) -> RepoResult<u64> {
        self.get_package(package)?.checkin(comment, author)
    }

    pub fn to_record(&self) -> RepositoryRecord {
        let index = self.read_index();
        let mut record = RepositoryRecord {
            format_version: RECORD_FORMAT_VERSION,
            packages: index
                .live
                .values()
                .chain(index.archived.iter())
                .map(|package| package.to_record())
                .collect(),
        };
        record.sort();
        record
    }

    /// Rebuild from a persisted record. Archived packages are put back in
    /// `archived_at` order, which is the order they are listed and restored in.
    pub fn from_record(record: RepositoryRecord) -> RepoResult<Self> {
        let mut index = PackageIndex::default();
        for package_record in record.packages {
            let archived = package_record.archived_at.is_some();
            let package = Arc::new(Package::from_record(package_record)?);
            if archived {
                index.archived.push(package);
                continue;
            }
            let name = package.name();
            if index.live.contains_key(&name) {
                return Err(RepoError::conflict("package", name));
            }
            index.live.insert(name, package);
        }
        index.archived.sort_by_key(|package| package.archived_at());
        Ok(Self {
            index: RwLock::new(index),
        })
    }

    fn read_index(&self) -> RwLockReadGuard<'_, PackageIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, PackageIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::AssetFormat;
    use crate::core::types::AsOf;
    use crate::error::ErrorKind;
    use uuid::Uuid;

    #[test]
    fn create_rejects_duplicate_and_invalid_names() {
        let repo = Repository::new();
        repo.create_package("restPackage1", "").expect("create");
        assert_eq!(
            repo.create_package("restPackage1", "").expect_err("taken").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            repo.create_package("", "").expect_err("empty").kind(),
            ErrorKind::Validation
        );
        // A name with a space would assemble into an unparseable `package` line.
        assert_eq!(
            repo.create_package("my rules", "").expect_err("space").kind(),
            ErrorKind::Validation
        );
        repo.create_package("org.acme.rules", "").expect("dotted name");
        // Names are case-sensitive.
        repo.create_package("RestPackage1", "").expect("different case");
    }

    #[test]
    fn list_packages_is_sorted_and_excludes_archived() {
        let repo = Repository::new();
        repo.create_package("zeta", "").expect("zeta");
        repo.create_package("alpha", "").expect("alpha");
        repo.create_package("mid", "").expect("mid");
        repo.delete_package("mid").expect("delete");

        let names: Vec<_> = repo.list_packages().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(repo.list_archived_packages().len(), 1);
        assert!(repo.list_archived_packages()[0].is_archived());
    }

    #[test]
    fn rename_preserves_identity_and_history() {
        let repo = Repository::new();
        let pkg = repo.create_package("p", "").expect("create");
        let asset = pkg.add_asset("a", AssetFormat::Rule, "rule a").expect("add");
        asset.checkin("version 1", "tester").expect("checkin asset");
        pkg.checkin("version 1", "tester").expect("checkin package");

        repo.rename_package("p", "p2").expect("rename");
        let renamed = repo.get_package("p2").expect("new name");
        assert_eq!(renamed.id(), pkg.id());
        assert_eq!(renamed.latest_version(), 1);
        assert!(
            renamed
                .assemble_source(AsOf::Version(1))
                .expect("source")
                .starts_with("package p2\n")
        );
        assert_eq!(
            repo.get_package("p").expect_err("old name").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn rename_reports_missing_and_taken() {
        let repo = Repository::new();
        repo.create_package("a", "").expect("a");
        repo.create_package("b", "").expect("b");
        assert_eq!(
            repo.rename_package("missing", "c").expect_err("missing").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            repo.rename_package("a", "b").expect_err("taken").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            repo.rename_package("a", "a").expect_err("same name").kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn delete_then_lookup_is_not_found_and_frees_name() {
        let repo = Repository::new();
        let old = repo.create_package("p", "").expect("create");
        repo.delete_package("p").expect("delete");
        assert_eq!(
            repo.get_package("p").expect_err("archived").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            repo.delete_package("p").expect_err("already archived").kind(),
            ErrorKind::NotFound
        );
        let new = repo.create_package("p", "").expect("name reusable");
        assert_ne!(new.id(), old.id());
    }

    #[test]
    fn restore_returns_archived_package() {
        let repo = Repository::new();
        let pkg = repo.create_package("p", "").expect("create");
        pkg.checkin("version 1", "tester").expect("checkin");
        repo.delete_package("p").expect("delete");

        let restored = repo.restore_package("p").expect("restore");
        assert_eq!(restored.id(), pkg.id());
        assert!(!restored.is_archived());
        assert_eq!(restored.latest_version(), 1);
        assert!(repo.list_archived_packages().is_empty());
    }

    #[test]
    fn restore_conflicts_when_name_reused() {
        let repo = Repository::new();
        repo.create_package("p", "").expect("create");
        repo.delete_package("p").expect("delete");
        repo.create_package("p", "").expect("reuse");
        assert_eq!(
            repo.restore_package("p").expect_err("taken").kind(),
            ErrorKind::Conflict
        );
        assert_eq!(repo.list_archived_packages().len(), 1);
    }

    /// After a save and load, restore still picks the most recently archived
    /// package of that name.
    #[test]
    fn restore_after_round_trip_picks_latest_archived() {
        let repo = Repository::new();
        let older = repo.create_package("p", "older").expect("older");
        repo.delete_package("p").expect("delete older");
        let newer = repo.create_package("p", "newer").expect("newer");
        repo.delete_package("p").expect("delete newer");

        // Ids that sort against archive order, listed in reverse.
        let mut record = repo.to_record();
        for package in &mut record.packages {
            package.id = if package.description == "older" {
                Uuid::from_u128(2)
            } else {
                Uuid::from_u128(1)
            };
        }
        record.packages.reverse();

        let rebuilt = Repository::from_record(record).expect("rebuild");
        let descriptions: Vec<_> = rebuilt
            .list_archived_packages()
            .iter()
            .map(|p| p.description())
            .collect();
        assert_eq!(descriptions, ["older", "newer"]);
        let restored = rebuilt.restore_package("p").expect("restore");
        assert_eq!(restored.description(), "newer");
        assert!(older.archived_at() < newer.archived_at());
    }

    #[test]
    fn purged_package_handles_reject_mutation() {
        let repo = Repository::new();
        let pkg = repo.create_package("p", "").expect("create");
        let asset = pkg.add_asset("a", AssetFormat::Rule, "rule a").expect("add");
        repo.purge_package("p").expect("purge");

        assert_eq!(
            pkg.checkin("after purge", "tester").expect_err("purged").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            asset.checkin("after purge", "tester").expect_err("purged").kind(),
            ErrorKind::NotFound
        );
        assert!(pkg.update_header("import x").is_err());
    }

    #[test]
    fn purge_removes_live_and_archived() {
        let repo = Repository::new();
        repo.create_package("p", "").expect("create");
        repo.delete_package("p").expect("delete");
        repo.create_package("p", "").expect("reuse");

        assert_eq!(repo.purge_package("p").expect("purge"), 2);
        assert!(repo.list_packages().is_empty());
        assert!(repo.list_archived_packages().is_empty());
        assert_eq!(
            repo.purge_package("p").expect_err("gone").kind(),
            ErrorKind::NotFound
        );
    }

    /// An asset checkin does not create a package version.
    #[test]
    fn checkin_helpers_do_not_cascade() {
        let repo = Repository::new();
        let pkg = repo.create_package("p", "").expect("create");
        pkg.add_asset("a", AssetFormat::Rule, "rule a").expect("add");

        assert_eq!(repo.checkin_asset("p", "a", "version 1", "tester").expect("asset"), 1);
        assert_eq!(pkg.latest_version(), 0);
        assert_eq!(repo.checkin_package("p", "version 1", "tester").expect("package"), 1);
        assert_eq!(
            repo.checkin_asset("p", "missing", "x", "tester").expect_err("missing").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn record_round_trip_keeps_archive() {
        let repo = Repository::new();
        repo.create_package("live", "").expect("live");
        repo.create_package("gone", "").expect("gone");
        repo.delete_package("gone").expect("delete");

        let record = repo.to_record();
        let rebuilt = Repository::from_record(record.clone()).expect("rebuild");
        assert_eq!(rebuilt.to_record(), record);
        assert_eq!(rebuilt.list_packages().len(), 1);
        assert_eq!(rebuilt.list_archived_packages()[0].name(), "gone");
    }
}
