//! Assets: named working documents backed by their own version ledger.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::format::AssetFormat;
use crate::core::ledger::VersionLedger;
use crate::core::types::{AsOf, AssetSnapshot, EntityMeta, VersionInfo};
use crate::error::{RepoError, RepoResult};
use crate::record::AssetRecord;

/// Lifecycle label assigned to new assets.
pub const DEFAULT_STATE: &str = "Draft";

/// A versioned asset.
///
/// All mutations take the asset's exclusive lock, so at most one mutation per
/// asset is in flight. Reads take the shared side only for as long as it takes
/// to clone the requested snapshot.
#[derive(Debug)]
pub struct Asset {
    id: Uuid,
    state: RwLock<AssetState>,
}

#[derive(Debug)]
pub(crate) struct AssetState {
    pub(crate) name: String,
    pub(crate) working: AssetSnapshot,
    pub(crate) ledger: VersionLedger<AssetSnapshot>,
    pub(crate) archived_at: Option<DateTime<Utc>>,
    /// Set once the asset's history is hard-deleted; never persisted.
    purged: bool,
    lifecycle: String,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    last_contributor: Option<String>,
}

impl Asset {
    pub(crate) fn new(name: String, working: AssetSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: RwLock::new(AssetState {
                name,
                working,
                ledger: VersionLedger::new(),
                archived_at: None,
                purged: false,
                lifecycle: DEFAULT_STATE.to_string(),
                created_at: now,
                last_modified: now,
                last_contributor: None,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    /// Format of the working copy.
    pub fn format(&self) -> AssetFormat {
        self.read().working.format
    }

    pub fn is_archived(&self) -> bool {
        self.read().archived_at.is_some()
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.read().archived_at
    }

    /// Replace the working content and format. Does not create a version.
    pub fn update_content(&self, content: impl Into<Vec<u8>>, format: AssetFormat) -> RepoResult<()> {
        let mut state = self.write();
        state.replace_working(AssetSnapshot::new(format, content))
    }

    /// Replace the working content, keeping the current format.
    pub fn update_bytes(&self, content: impl Into<Vec<u8>>) -> RepoResult<()> {
        let mut state = self.write();
        let format = state.working.format;
        state.replace_working(AssetSnapshot::new(format, content))
    }

    /// Set the lifecycle label (e.g. `Draft`, `Approved`).
    pub fn set_state(&self, label: &str) -> RepoResult<()> {
        if label.trim().is_empty() {
            return Err(RepoError::validation("state", "state must not be empty"));
        }
        let mut state = self.write();
        state.ensure_live()?;
        state.lifecycle = label.trim().to_string();
        state.last_modified = Utc::now();
        Ok(())
    }

    pub fn lifecycle_state(&self) -> String {
        self.read().lifecycle.clone()
    }

    /// Record the working copy as the next version.
    pub fn checkin(&self, comment: &str, author: &str) -> RepoResult<u64> {
        let mut state = self.write();
        state.ensure_live()?;
        let snapshot = state.working.clone();
        let version = state.ledger.checkin(snapshot, comment, author)?;
        state.last_modified = Utc::now();
        state.last_contributor = Some(author.to_string());
        info!(asset = %state.name, version, author, "asset checked in");
        Ok(version)
    }

    /// Working copy (`Head`) or a checked-in version.
    pub fn get_content(&self, as_of: AsOf) -> RepoResult<AssetSnapshot> {
        self.read().snapshot(as_of).cloned()
    }

    /// Text view. Binary content is decoded lossily instead of failing.
    pub fn source_text(&self, as_of: AsOf) -> RepoResult<String> {
        let state = self.read();
        Ok(state.snapshot(as_of)?.text().into_owned())
    }

    /// Byte view. Text assets return their text encoded as bytes.
    pub fn binary(&self, as_of: AsOf) -> RepoResult<Vec<u8>> {
        let state = self.read();
        Ok(state.snapshot(as_of)?.content.clone())
    }

    pub fn latest_version(&self) -> u64 {
        self.read().ledger.latest_version()
    }

    pub fn list_versions(&self) -> Vec<VersionInfo> {
        self.read().ledger.list_versions()
    }

    pub fn meta(&self) -> EntityMeta {
        let state = self.read();
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

    pub(crate) fn rename(&self, new_name: &str) {
        let mut state = self.write();
        state.name = new_name.to_string();
        state.last_modified = Utc::now();
    }

    pub(crate) fn archive(&self, at: DateTime<Utc>) {
        let mut state = self.write();
        state.archived_at = Some(at);
        state.last_modified = Utc::now();
    }

    /// Make every later mutation through a held handle fail with NotFound.
    pub(crate) fn mark_purged(&self) {
        self.write().purged = true;
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, AssetState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AssetState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn to_record(&self) -> AssetRecord {
        let state = self.read();
        AssetRecord {
            id: self.id,
            name: state.name.clone(),
            state: state.lifecycle.clone(),
            archived: state.archived_at.is_some(),
            archived_at: state.archived_at,
            created_at: state.created_at,
            last_modified: state.last_modified,
            last_contributor: state.last_contributor.clone(),
            working: state.working.clone(),
            versions: state.ledger.clone(),
        }
    }

    pub(crate) fn from_record(record: AssetRecord) -> Self {
        Self {
            id: record.id,
            state: RwLock::new(AssetState {
                name: record.name,
                working: record.working,
                ledger: record.versions,
                archived_at: record.archived_at,
                purged: false,
                lifecycle: record.state,
                created_at: record.created_at,
                last_modified: record.last_modified,
                last_contributor: record.last_contributor,
            }),
        }
    }
}

impl AssetState {
    fn ensure_live(&self) -> RepoResult<()> {
        if self.purged || self.archived_at.is_some() {
            return Err(RepoError::not_found("asset", self.name.clone()));
        }
        Ok(())
    }

    fn replace_working(&mut self, working: AssetSnapshot) -> RepoResult<()> {
        self.ensure_live()?;
        debug!(asset = %self.name, format = %working.format, "asset working copy updated");
        self.working = working;
        self.last_modified = Utc::now();
        Ok(())
    }

    pub(crate) fn snapshot(&self, as_of: AsOf) -> RepoResult<&AssetSnapshot> {
        match as_of {
            AsOf::Head => Ok(&self.working),
            AsOf::Version(version) => self
                .ledger
                .get(version)
                .map(|entry| &entry.snapshot)
                .ok_or_else(|| RepoError::VersionNotFound {
                    entity: "asset",
                    name: self.name.clone(),
                    version,
                }),
        }
    }
}
