//! Packages: named containers of assets with a header and tree-snapshot history.
//!
//! # Locking
//!
//! A package owns two locks: `state` (name, header, ledger, archive flag) and
//! `assets` (the working asset set). Each asset owns its own lock. They are
//! always acquired in the order `state` → `assets` → asset. Holding several
//! asset locks at once is only done in current name order (package checkin
//! and HEAD assembly). Historical assembly follows pinned order, which can
//! disagree with current names after a rename, so it takes one asset lock at
//! a time.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::asset::Asset;
use crate::core::assembler::{AssemblyInput, assemble};
use crate::core::format::{AssetFormat, split_file_name};
use crate::core::ledger::{VersionLedger, validate_comment};
use crate::core::names::validate_name;
use crate::core::types::{AsOf, AssetRef, AssetSnapshot, EntityMeta, PackageSnapshot, VersionInfo};
use crate::error::{RepoError, RepoResult};
use crate::io::compiler::Compiler;
use crate::record::{PackageRecord, archive_stamp};

#[derive(Debug)]
pub struct Package {
    id: Uuid,
    state: RwLock<PackageState>,
    assets: RwLock<AssetSet>,
}

#[derive(Debug)]
struct PackageState {
    name: String,
    description: String,
    header: String,
    ledger: VersionLedger<PackageSnapshot>,
    archived_at: Option<DateTime<Utc>>,
    /// Set once the package is hard-deleted; never persisted.
    purged: bool,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    last_contributor: Option<String>,
}

#[derive(Debug, Default)]
struct AssetSet {
    live: BTreeMap<String, Arc<Asset>>,
    /// Removed assets in archive order; kept so historical trees still resolve.
    archived: Vec<Arc<Asset>>,
}

impl AssetSet {
    fn find_by_id(&self, id: Uuid) -> Option<&Arc<Asset>> {
        self.live
            .values()
            .chain(self.archived.iter())
            .find(|asset| asset.id() == id)
    }
}

impl Package {
    pub(crate) fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: RwLock::new(PackageState {
                name,
                description,
                header: String::new(),
                ledger: VersionLedger::new(),
                archived_at: None,
                purged: false,
                created_at: now,
                last_modified: now,
                last_contributor: None,
            }),
            assets: RwLock::new(AssetSet::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> String {
        self.read_state().name.clone()
    }

    pub fn description(&self) -> String {
        self.read_state().description.clone()
    }

    /// Working header (imports and globals).
    pub fn header(&self) -> String {
        self.read_state().header.clone()
    }

    pub fn is_archived(&self) -> bool {
        self.read_state().archived_at.is_some()
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.read_state().archived_at
    }

    pub fn update_header(&self, header: &str) -> RepoResult<()> {
        let mut state = self.write_state();
        state.ensure_live()?;
        state.header = header.to_string();
        state.last_modified = Utc::now();
        debug!(package = %state.name, "package header updated");
        Ok(())
    }

    pub fn update_description(&self, description: &str) -> RepoResult<()> {
        let mut state = self.write_state();
        state.ensure_live()?;
        state.description = description.to_string();
        state.last_modified = Utc::now();
        Ok(())
    }

    /// Create a new live asset with an unversioned working copy.
    pub fn add_asset(
        &self,
        name: &str,
        format: AssetFormat,
        content: impl Into<Vec<u8>>,
    ) -> RepoResult<Arc<Asset>> {
        validate_name("asset name", name)?;
        let mut state = self.write_state();
        state.ensure_live()?;
        let mut assets = self.write_assets();
        if assets.live.contains_key(name) {
            return Err(RepoError::conflict("asset", name));
        }
        let asset = Arc::new(Asset::new(
            name.to_string(),
            AssetSnapshot::new(format, content),
        ));
        assets.live.insert(name.to_string(), Arc::clone(&asset));
        state.last_modified = Utc::now();
        info!(package = %state.name, asset = name, format = %format, "asset added");
        Ok(asset)
    }

    /// Create an asset from an uploaded file name such as `Error-image.gif`.
    pub fn add_asset_from_file(
        &self,
        file_name: &str,
        content: impl Into<Vec<u8>>,
    ) -> RepoResult<Arc<Asset>> {
        let (name, format) = split_file_name(file_name)?;
        self.add_asset(&name, format, content)
    }

    /// Live asset by name.
    pub fn asset(&self, name: &str) -> RepoResult<Arc<Asset>> {
        self.read_assets()
            .live
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::not_found("asset", name))
    }

    /// Live assets in name order.
    pub fn list_assets(&self) -> Vec<Arc<Asset>> {
        self.read_assets().live.values().cloned().collect()
    }

    pub fn list_archived_assets(&self) -> Vec<Arc<Asset>> {
        self.read_assets().archived.clone()
    }

    /// Archive an asset. Its history stays resolvable for older package versions.
    pub fn remove_asset(&self, name: &str) -> RepoResult<()> {
        let mut state = self.write_state();
        state.ensure_live()?;
        let mut assets = self.write_assets();
        let asset = assets
            .live
            .remove(name)
            .ok_or_else(|| RepoError::not_found("asset", name))?;
        let previous = assets.archived.last().and_then(|archived| archived.archived_at());
        asset.archive(archive_stamp(previous));
        assets.archived.push(asset);
        state.last_modified = Utc::now();
        info!(package = %state.name, asset = name, "asset archived");
        Ok(())
    }

    /// Rename a live asset, keeping its id and history.
    pub fn rename_asset(&self, old_name: &str, new_name: &str) -> RepoResult<()> {
        validate_name("asset name", new_name)?;
        let mut state = self.write_state();
        state.ensure_live()?;
        let mut assets = self.write_assets();
        if !assets.live.contains_key(old_name) {
            return Err(RepoError::not_found("asset", old_name));
        }
        if assets.live.contains_key(new_name) {
            return Err(RepoError::conflict("asset", new_name));
        }
        if let Some(asset) = assets.live.remove(old_name) {
            asset.rename(new_name);
            assets.live.insert(new_name.to_string(), asset);
        }
        state.last_modified = Utc::now();
        info!(package = %state.name, from = old_name, to = new_name, "asset renamed");
        Ok(())
    }

    /// Hard-delete every asset called `name`, live or archived, with its ledger.
    ///
    /// Package versions that pinned a purged asset can no longer be assembled,
    /// and handles still held to a purged asset reject every mutation.
    pub fn purge_asset(&self, name: &str) -> RepoResult<usize> {
        let mut state = self.write_state();
        let mut assets = self.write_assets();
        let mut removed: Vec<_> = assets.live.remove(name).into_iter().collect();
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut assets.archived)
            .into_iter()
            .partition(|asset| asset.name() == name);
        assets.archived = kept;
        removed.extend(gone);
        for asset in &removed {
            asset.mark_purged();
        }
        let purged = removed.len();
        if purged == 0 {
            return Err(RepoError::not_found("asset", name));
        }
        state.last_modified = Utc::now();
        warn!(package = %state.name, asset = name, purged, "asset history purged");
        Ok(purged)
    }

    /// Record a tree snapshot: the working header plus every live asset pinned
    /// at its latest version.
    ///
    /// Assets never checked in have nothing to pin and are left out. Working
    /// edits to an asset are invisible here until that asset is checked in.
    pub fn checkin(&self, comment: &str, author: &str) -> RepoResult<u64> {
        validate_comment(comment)?;
        let mut state = self.write_state();
        state.ensure_live()?;
        let assets = self.read_assets();
        let guards: Vec<_> = assets
            .live
            .values()
            .map(|asset| (asset.id(), asset.read()))
            .collect();
        let asset_refs = guards
            .iter()
            .filter_map(|(asset_id, asset)| {
                let version = asset.ledger.latest_version();
                (version > 0).then(|| AssetRef {
                    asset_id: *asset_id,
                    name: asset.name.clone(),
                    version,
                })
            })
            .collect::<Vec<_>>();
        let pinned = asset_refs.len();
        let snapshot = PackageSnapshot {
            header: state.header.clone(),
            asset_refs,
        };
        let version = state.ledger.checkin(snapshot, comment, author)?;
        drop(guards);
        drop(assets);

        state.last_modified = Utc::now();
        state.last_contributor = Some(author.to_string());
        info!(package = %state.name, version, pinned, author, "package checked in");
        Ok(version)
    }

    /// Header and asset refs at `as_of`. For `Head` the refs are the latest
    /// checked-in version of every live asset.
    pub fn snapshot(&self, as_of: AsOf) -> RepoResult<PackageSnapshot> {
        let state = self.read_state();
        match as_of {
            AsOf::Version(version) => Ok(state.entry(version)?.clone()),
            AsOf::Head => {
                let assets = self.read_assets();
                let asset_refs = assets
                    .live
                    .values()
                    .filter_map(|asset| {
                        let current = asset.read();
                        let version = current.ledger.latest_version();
                        (version > 0).then(|| AssetRef {
                            asset_id: asset.id(),
                            name: current.name.clone(),
                            version,
                        })
                    })
                    .collect();
                Ok(PackageSnapshot {
                    header: state.header.clone(),
                    asset_refs,
                })
            }
        }
    }

    /// Assemble the package source at `as_of`.
    ///
    /// `Head` uses the working header and the latest version of each live
    /// asset. A historical version dereferences exactly the pinned asset
    /// versions; if any of them is gone the whole assembly fails.
    pub fn assemble_source(&self, as_of: AsOf) -> RepoResult<String> {
        let state = self.read_state();
        let assets = self.read_assets();
        let source = match as_of {
            AsOf::Head => {
                let guards: Vec<_> = assets.live.values().map(|asset| asset.read()).collect();
                let inputs: Vec<AssemblyInput<'_>> = guards
                    .iter()
                    .filter_map(|asset| {
                        asset.ledger.latest().map(|entry| AssemblyInput {
                            name: &asset.name,
                            format: entry.snapshot.format,
                            content: &entry.snapshot.content,
                        })
                    })
                    .collect();
                assemble(&state.name, &state.header, &inputs)
            }
            AsOf::Version(version) => {
                let tree = state.entry(version)?;
                let missing = |asset_ref: &AssetRef| RepoError::Assembly {
                    package: state.name.clone(),
                    package_version: version,
                    asset: asset_ref.name.clone(),
                    asset_version: asset_ref.version,
                };
                // Pinned refs are ordered by their names at checkin time, which
                // may differ from current name order, so each asset lock is
                // released before the next one is taken.
                let mut pinned = Vec::with_capacity(tree.asset_refs.len());
                for asset_ref in &tree.asset_refs {
                    let asset = assets
                        .find_by_id(asset_ref.asset_id)
                        .ok_or_else(|| missing(asset_ref))?;
                    let snapshot = asset
                        .read()
                        .ledger
                        .get(asset_ref.version)
                        .map(|entry| entry.snapshot.clone())
                        .ok_or_else(|| missing(asset_ref))?;
                    pinned.push((asset_ref, snapshot));
                }
                let inputs: Vec<AssemblyInput<'_>> = pinned
                    .iter()
                    .map(|(asset_ref, snapshot)| AssemblyInput {
                        name: &asset_ref.name,
                        format: snapshot.format,
                        content: &snapshot.content,
                    })
                    .collect();
                assemble(&state.name, &tree.header, &inputs)
            }
        };
        debug!(package = %state.name, %as_of, bytes = source.len(), "package source assembled");
        Ok(source)
    }

    /// Assemble the source at `as_of` and hand it to `compiler`.
    pub fn build_binary(&self, as_of: AsOf, compiler: &dyn Compiler) -> RepoResult<Vec<u8>> {
        let source = self.assemble_source(as_of)?;
        match compiler.compile(&source) {
            Ok(artifact) => {
                debug!(package = %self.name(), %as_of, bytes = artifact.len(), "package compiled");
                Ok(artifact)
            }
            Err(err) => {
                warn!(package = %self.name(), %as_of, error = %err, "package compile failed");
                Err(err)
            }
        }
    }

    pub fn latest_version(&self) -> u64 {
        self.read_state().ledger.latest_version()
    }

    pub fn list_versions(&self) -> Vec<VersionInfo> {
        self.read_state().ledger.list_versions()
    }

    pub fn meta(&self) -> EntityMeta {
        let state = self.read_state();
        EntityMeta {
            id: self.id,
            name: state.name.clone(),
            created_at: state.created_at,
            last_modified: state.last_modified,
            last_contributor: state.last_contributor.clone(),
            archived: state.archived_at.is_some(),
            version: state.ledger.latest_version(),
            checkin_comment: state.ledger.latest().map(|entry| entry.comment.clone()),
        }
    }

    pub(crate) fn rename(&self, new_name: &str) -> RepoResult<()> {
        let mut state = self.write_state();
        state.ensure_live()?;
        state.name = new_name.to_string();
        state.last_modified = Utc::now();
        Ok(())
    }

    pub(crate) fn archive(&self, at: DateTime<Utc>) {
        let mut state = self.write_state();
        state.archived_at = Some(at);
        state.last_modified = Utc::now();
    }

    pub(crate) fn restore(&self) {
        let mut state = self.write_state();
        state.archived_at = None;
        state.last_modified = Utc::now();
    }

    /// Mark the package and every asset it owns as hard-deleted, so handles
    /// still held by callers stop accepting mutations.
    pub(crate) fn mark_purged(&self) {
        let mut state = self.write_state();
        state.purged = true;
        let assets = self.read_assets();
        for asset in assets.live.values().chain(assets.archived.iter()) {
            asset.mark_purged();
        }
    }

    pub(crate) fn to_record(&self) -> PackageRecord {
        let state = self.read_state();
        let assets = self.read_assets();
        let mut asset_records: Vec<_> = assets
            .live
            .values()
            .chain(assets.archived.iter())
            .map(|asset| asset.to_record())
            .collect();
        asset_records.sort_by(|a, b| {
            (&a.name, a.archived_at, a.id).cmp(&(&b.name, b.archived_at, b.id))
        });
        PackageRecord {
            id: self.id,
            name: state.name.clone(),
            description: state.description.clone(),
            header: state.header.clone(),
            archived: state.archived_at.is_some(),
            archived_at: state.archived_at,
            created_at: state.created_at,
            last_modified: state.last_modified,
            last_contributor: state.last_contributor.clone(),
            versions: state.ledger.clone(),
            assets: asset_records,
        }
    }

    /// Rebuild from a persisted record. Archived assets are put back in
    /// `archived_at` order.
    pub(crate) fn from_record(record: PackageRecord) -> RepoResult<Self> {
        let mut set = AssetSet::default();
        for asset_record in record.assets {
            let archived = asset_record.archived_at.is_some();
            let asset = Arc::new(Asset::from_record(asset_record));
            if archived {
                set.archived.push(asset);
                continue;
            }
            let name = asset.name();
            if set.live.contains_key(&name) {
                return Err(RepoError::conflict("asset", name));
            }
            set.live.insert(name, asset);
        }
        set.archived.sort_by_key(|asset| asset.archived_at());
        Ok(Self {
            id: record.id,
            state: RwLock::new(PackageState {
                name: record.name,
                description: record.description,
                header: record.header,
                ledger: record.versions,
                archived_at: record.archived_at,
                purged: false,
                created_at: record.created_at,
                last_modified: record.last_modified,
                last_contributor: record.last_contributor,
            }),
            assets: RwLock::new(set),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, PackageState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, PackageState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_assets(&self) -> RwLockReadGuard<'_, AssetSet> {
        self.assets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_assets(&self) -> RwLockWriteGuard<'_, AssetSet> {
        self.assets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PackageState {
    fn ensure_live(&self) -> RepoResult<()> {
        if self.purged || self.archived_at.is_some() {
            return Err(RepoError::not_found("package", self.name.clone()));
        }
        Ok(())
    }

    fn entry(&self, version: u64) -> RepoResult<&PackageSnapshot> {
        self.ledger
            .get(version)
            .map(|entry| &entry.snapshot)
            .ok_or_else(|| RepoError::VersionNotFound {
                entity: "package",
                name: self.name.clone(),
                version,
            })
    }
}
