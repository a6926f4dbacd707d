//! Store configuration kept in `.rulestore/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Store configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Author recorded on checkins when `--author` is not given.
    pub default_author: String,

    pub compiler: CompilerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Command that reads package source on stdin and writes the artifact to
    /// stdout (e.g. `["drools-compile", "-"]`). Empty disables binary builds.
    pub command: Vec<String>,

    /// Wall-clock budget for one compile, in seconds.
    pub timeout_secs: u64,

    /// Largest artifact or stderr kept in memory, in bytes.
    pub output_limit_bytes: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 5 * 60,
            output_limit_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_author: "anonymous".to_string(),
            compiler: CompilerConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_author.trim().is_empty() {
            return Err(anyhow!("default_author must not be empty"));
        }
        if self.compiler.timeout_secs == 0 {
            return Err(anyhow!("compiler.timeout_secs must be > 0"));
        }
        if self.compiler.output_limit_bytes == 0 {
            return Err(anyhow!("compiler.output_limit_bytes must be > 0"));
        }
        if let Some(program) = self.compiler.command.first()
            && program.trim().is_empty()
        {
            return Err(anyhow!("compiler.command must start with a program name"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StoreConfig::default()`.
pub fn load_config(path: &Path) -> Result<StoreConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = StoreConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StoreConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &StoreConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, StoreConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = StoreConfig {
            default_author: "alan_parsons".to_string(),
            compiler: CompilerConfig {
                command: vec!["drools-compile".to_string(), "-".to_string()],
                ..CompilerConfig::default()
            },
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "default_author = \"eric\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.default_author, "eric");
        assert_eq!(cfg.compiler, CompilerConfig::default());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[compiler]\ntimeout_secs = 0\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(err.to_string().contains("timeout_secs"));
    }
}
