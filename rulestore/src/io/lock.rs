//! Advisory store lock shared by every `rulestore` process.
//!
//! Readers take it shared, mutating commands take it exclusive and hold it
//! across load, mutate and save, so concurrent commands never lose updates.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

/// Held lock on `.rulestore/repository.lock`; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Block until no other process holds the lock.
    pub fn exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("lock {} exclusively", path.display()))?;
        debug!(path = %path.display(), "exclusive store lock acquired");
        Ok(Self { file })
    }

    /// Block until no process holds the lock exclusively.
    pub fn shared(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file).with_context(|| format!("lock {} shared", path.display()))?;
        debug!(path = %path.display(), "shared store lock acquired");
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("open lock file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_locks_coexist_and_exclusive_follows_release() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/repository.lock");
        let first = StoreLock::shared(&path).expect("first shared");
        let second = StoreLock::shared(&path).expect("second shared");
        assert!(path.is_file());

        let contender = OpenOptions::new().write(true).open(&path).expect("open");
        assert!(FileExt::try_lock_exclusive(&contender).is_err());
        drop(first);
        drop(second);

        let _exclusive = StoreLock::exclusive(&path).expect("exclusive");
        let other = OpenOptions::new().write(true).open(&path).expect("open");
        assert!(FileExt::try_lock_shared(&other).is_err());
    }
}
