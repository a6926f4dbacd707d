//! Serializable form of a repository, as persisted in `repository.json`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ledger::VersionLedger;
use crate::core::types::{AssetSnapshot, PackageSnapshot};

/// Current `format_version` written by this crate.
pub const RECORD_FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub format_version: u32,
    /// Live and archived packages, ordered by (name, archived_at, id).
    pub packages: Vec<PackageRecord>,
}

impl Default for RepositoryRecord {
    fn default() -> Self {
        Self {
            format_version: RECORD_FORMAT_VERSION,
            packages: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub header: String,
    pub archived: bool,
    /// Set exactly when `archived` is; orders the archive.
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_contributor: Option<String>,
    pub versions: VersionLedger<PackageSnapshot>,
    /// Live and archived assets, ordered by (name, archived_at, id).
    pub assets: Vec<AssetRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: Uuid,
    pub name: String,
    pub state: String,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_contributor: Option<String>,
    pub working: AssetSnapshot,
    pub versions: VersionLedger<AssetSnapshot>,
}

impl RepositoryRecord {
    /// Sort packages and assets into their canonical order. Under one name the
    /// live entity comes first, then archived ones oldest first.
    pub fn sort(&mut self) {
        self.packages.sort_by(|a, b| {
            (&a.name, a.archived_at, a.id).cmp(&(&b.name, b.archived_at, b.id))
        });
        for package in &mut self.packages {
            package.assets.sort_by(|a, b| {
                (&a.name, a.archived_at, a.id).cmp(&(&b.name, b.archived_at, b.id))
            });
        }
    }
}

/// Archive timestamp for an entity archived after `previous`.
///
/// Strictly later than `previous`, so archive order survives a round trip
/// through `archived_at` even when the clock stalls or steps back.
pub(crate) fn archive_stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if previous >= now => previous + TimeDelta::nanoseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_stamp_is_strictly_increasing() {
        let future = Utc::now() + TimeDelta::hours(1);
        let stamp = archive_stamp(Some(future));
        assert!(stamp > future);
        assert!(archive_stamp(Some(stamp)) > stamp);
        assert!(archive_stamp(None) <= Utc::now());
    }
}
