//! Append-only version ledger shared by packages and assets.
//!
//! Version numbers start at 1 and increase by exactly one per checkin. Entries
//! are never reordered, rewritten or removed; the only mutation is
//! [`VersionLedger::checkin`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::VersionInfo;
use crate::error::{RepoError, RepoResult};

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry<S> {
    pub version: u64,
    pub snapshot: S,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
}

impl<S> VersionEntry<S> {
    pub fn info(&self) -> VersionInfo {
        VersionInfo {
            version: self.version,
            comment: self.comment.clone(),
            timestamp: self.timestamp,
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionLedger<S> {
    entries: Vec<VersionEntry<S>>,
}

impl<S> Default for VersionLedger<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S> VersionLedger<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `snapshot` as the next version and return its number.
    ///
    /// Fails with a validation error (and appends nothing) if `comment` is
    /// blank.
    pub fn checkin(&mut self, snapshot: S, comment: &str, author: &str) -> RepoResult<u64> {
        self.checkin_at(snapshot, comment, author, Utc::now())
    }

    pub(crate) fn checkin_at(
        &mut self,
        snapshot: S,
        comment: &str,
        author: &str,
        timestamp: DateTime<Utc>,
    ) -> RepoResult<u64> {
        validate_comment(comment)?;
        let version = self.latest_version() + 1;
        self.entries.push(VersionEntry {
            version,
            snapshot,
            comment: comment.to_string(),
            timestamp,
            author: author.to_string(),
        });
        Ok(version)
    }

    /// Entry for version `n`, or `None` if it was never appended.
    pub fn get(&self, version: u64) -> Option<&VersionEntry<S>> {
        // Contiguous numbering makes the position `version - 1`.
        let index = usize::try_from(version.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }

    /// Latest version number, 0 if never checked in.
    pub fn latest_version(&self) -> u64 {
        self.entries.last().map_or(0, |entry| entry.version)
    }

    pub fn latest(&self) -> Option<&VersionEntry<S>> {
        self.entries.last()
    }

    /// Version summaries in ascending order.
    pub fn list_versions(&self) -> Vec<VersionInfo> {
        self.entries.iter().map(VersionEntry::info).collect()
    }

    pub fn entries(&self) -> &[VersionEntry<S>] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reject empty or whitespace-only checkin comments.
pub fn validate_comment(comment: &str) -> RepoResult<()> {
    if comment.trim().is_empty() {
        return Err(RepoError::validation(
            "checkin comment",
            "comment must not be empty",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn checkin_assigns_contiguous_versions() {
        let mut ledger = VersionLedger::new();
        assert_eq!(ledger.latest_version(), 0);
        for expected in 1..=5 {
            let version = ledger
                .checkin(format!("v{expected}"), "edit", "tester")
                .expect("checkin");
            assert_eq!(version, expected);
        }
        let numbers: Vec<u64> = ledger.list_versions().iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_comment_appends_nothing() {
        let mut ledger = VersionLedger::new();
        let err = ledger.checkin("x", "   ", "tester").expect_err("blank comment");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(ledger.is_empty());
    }

    #[test]
    fn get_rejects_zero_and_out_of_range() {
        let mut ledger = VersionLedger::new();
        ledger.checkin("a", "first", "tester").expect("checkin");
        assert!(ledger.get(0).is_none());
        assert!(ledger.get(2).is_none());
        assert_eq!(ledger.get(1).map(|e| e.snapshot), Some("a"));
    }

    /// Entries keep comment and author exactly as recorded.
    #[test]
    fn list_versions_reports_metadata() {
        let mut ledger = VersionLedger::new();
        ledger.checkin(1, "version 1", "alan_parsons").expect("checkin");
        ledger.checkin(2, "version 2", "eric").expect("checkin");
        let listed = ledger.list_versions();
        assert_eq!(listed[0].comment, "version 1");
        assert_eq!(listed[0].author, "alan_parsons");
        assert_eq!(listed[1].author, "eric");
        assert!(listed[0].timestamp <= listed[1].timestamp);
    }
}
