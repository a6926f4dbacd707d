//! External compiler adapter: assembled source in, binary artifact out.

use std::process::Command;
use std::time::Duration;

use tracing::{info, warn};

use super::config::CompilerConfig;
use super::process::run_command_with_timeout;
use crate::error::{RepoError, RepoResult};

/// Compiles assembled package source into an opaque artifact.
///
/// Failures are reported as [`RepoError::Compile`] and passed to callers
/// unchanged.
pub trait Compiler {
    fn compile(&self, source: &str) -> RepoResult<Vec<u8>>;
}

/// Runs a configured command with the source on stdin and takes stdout as the
/// artifact. A non-zero exit or a timeout is a compile error carrying stderr.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    pub command: Vec<String>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl CommandCompiler {
    /// `None` when no compiler command is configured.
    pub fn from_config(config: &CompilerConfig) -> Option<Self> {
        if config.command.is_empty() {
            return None;
        }
        Some(Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        })
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, source: &str) -> RepoResult<Vec<u8>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| RepoError::Compile("no compiler command configured".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = run_command_with_timeout(
            cmd,
            Some(source.as_bytes().to_vec()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| RepoError::Compile(format!("{program}: {err:#}")))?;

        if output.timed_out {
            warn!(program = %program, timeout_secs = self.timeout.as_secs(), "compiler timed out");
            return Err(RepoError::Compile(format!(
                "{program} timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(program = %program, exit_code = ?output.status.code(), "compiler rejected source");
            return Err(RepoError::Compile(stderr));
        }
        if output.stdout_truncated > 0 {
            return Err(RepoError::Compile(format!(
                "artifact exceeds {} bytes",
                self.output_limit_bytes
            )));
        }
        info!(program = %program, bytes = output.stdout.len(), "compiled package source");
        Ok(output.stdout)
    }
}
