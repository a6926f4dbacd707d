//! Initialization helpers for `.rulestore/` scaffolding.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tracing::info;

use super::config::{StoreConfig, write_config};
use super::lock::StoreLock;
use super::store::write_repository;
use crate::repository::Repository;

/// All canonical paths within `.rulestore/` for a project root.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub store_dir: PathBuf,
    pub config_path: PathBuf,
    pub repository_path: PathBuf,
    pub lock_path: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store_dir = root.join(".rulestore");
        Self {
            root: root.clone(),
            store_dir: store_dir.clone(),
            config_path: store_dir.join("config.toml"),
            repository_path: store_dir.join("repository.json"),
            lock_path: store_dir.join("repository.lock"),
        }
    }
}

/// Options for `init_store`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, reset `config.toml` to defaults. The repository itself is
    /// never overwritten.
    pub force: bool,
}

/// Create `.rulestore/` scaffolding in `root`.
///
/// Fails if `.rulestore/` already exists unless `options.force` is set.
pub fn init_store(root: &Path, options: &InitOptions) -> Result<StorePaths> {
    let paths = StorePaths::new(root);
    if paths.store_dir.exists() && !paths.store_dir.is_dir() {
        return Err(anyhow!(
            "rulestore init: .rulestore exists but is not a directory"
        ));
    }
    if paths.store_dir.exists() && !options.force {
        return Err(anyhow!(
            "rulestore init: .rulestore already exists (use --force to reset config)"
        ));
    }

    let _lock = StoreLock::exclusive(&paths.lock_path)?;
    write_config(&paths.config_path, &StoreConfig::default())?;
    if !paths.repository_path.exists() {
        write_repository(&paths.repository_path, &Repository::new())?;
    }
    info!(root = %root.display(), "store initialized");
    Ok(paths)
}
