//! Shared value types for repository snapshots and metadata.
//!
//! These types are the stable contracts between the ledger, the entities and
//! the persisted record format. They carry no locks and no I/O.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::format::AssetFormat;

/// Which state of an entity a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsOf {
    /// The current working state.
    #[default]
    Head,
    /// A checked-in version (1-indexed).
    Version(u64),
}

impl From<Option<u64>> for AsOf {
    fn from(version: Option<u64>) -> Self {
        version.map_or(Self::Head, Self::Version)
    }
}

impl fmt::Display for AsOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => f.write_str("HEAD"),
            Self::Version(n) => write!(f, "v{n}"),
        }
    }
}

/// Immutable content of an asset at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub format: AssetFormat,
    pub content: Vec<u8>,
}

impl AssetSnapshot {
    pub fn new(format: AssetFormat, content: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            content: content.into(),
        }
    }

    pub fn is_binary(&self) -> bool {
        self.format.is_binary()
    }

    /// Text view of the content. Binary content is decoded lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// A pinned asset version inside a package tree.
///
/// `name` is the asset name at checkin time; resolution goes through
/// `asset_id` so renames and same-name re-creation cannot redirect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub asset_id: Uuid,
    pub name: String,
    pub version: u64,
}

/// Immutable tree recorded by a package checkin.
///
/// `asset_refs` is sorted by asset name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PackageSnapshot {
    pub header: String,
    pub asset_refs: Vec<AssetRef>,
}

/// Ledger entry summary returned by version listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: u64,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
}

/// Metadata exposed for every package and asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMeta {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub last_contributor: Option<String>,
    pub archived: bool,
    /// Latest checked-in version, 0 if never checked in.
    pub version: u64,
    pub checkin_comment: Option<String>,
}
