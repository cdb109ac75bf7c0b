//! Tool runner backed by child processes.

use super::{ToolError, ToolInvocation, ToolRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Runs tools as child processes with `tokio::process`.
///
/// Programs are looked up on `PATH` unless an explicit search path is set.
#[derive(Debug, Clone, Default)]
pub struct ProcessToolRunner {
    search_path: Option<Vec<PathBuf>>,
}

impl ProcessToolRunner {
    /// Creates a runner that searches `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches only the given directories.
    #[must_use]
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = Some(dirs);
        self
    }

    fn dirs(&self) -> Vec<PathBuf> {
        match &self.search_path {
            Some(dirs) => dirs.clone(),
            None => std::env::var_os("PATH")
                .map(|path| std::env::split_paths(&path).collect())
                .unwrap_or_default(),
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.dirs()
            .into_iter()
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        let start = Instant::now();
        info!(
            command = %invocation.command_line(),
            working_dir = %invocation.working_dir.display(),
            "Invoking tool"
        );

        let program = self
            .locate(&invocation.program)
            .unwrap_or_else(|| PathBuf::from(&invocation.program));

        let status = tokio::process::Command::new(&program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .status()
            .await
            .map_err(|source| ToolError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        debug!(
            program = %invocation.program,
            code = ?status.code(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Tool exited"
        );

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::failed(&invocation.program, status.code()))
        }
    }
}
