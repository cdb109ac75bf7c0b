//! External tool invocation boundary.
//!
//! An action that shells out to a synthesis tool describes the call as a
//! [`ToolInvocation`] and hands it to a [`ToolRunner`]. The process exit
//! status is the only success signal; tool output is not interpreted here.

mod process;

pub use process::ProcessToolRunner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors related to external tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program is not on the search path.
    #[error("{program} not found. Please source the tool settings script first")]
    NotFound {
        /// The program name.
        program: String,
    },

    /// The process could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// The program name.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("{program} exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Failed {
        /// The program name.
        program: String,
        /// Exit code, `None` if terminated by a signal.
        code: Option<i32>,
    },
}

impl ToolError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(program: impl Into<String>) -> Self {
        Self::NotFound {
            program: program.into(),
        }
    }

    /// Creates a failed exit error.
    #[must_use]
    pub fn failed(program: impl Into<String>, code: Option<i32>) -> Self {
        Self::Failed {
            program: program.into(),
            code,
        }
    }
}

/// One call of an external program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Program name, looked up on the search path.
    pub program: String,
    /// Arguments, passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory of the process.
    pub working_dir: PathBuf,
}

impl ToolInvocation {
    /// Creates an invocation with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Renders the call as a shell-like command line for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs external programs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Returns the full path of a program, if it is on the search path.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Runs the invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Spawn`] if the process cannot start and
    /// [`ToolError::Failed`] if it exits unsuccessfully.
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<(), ToolError>;
}

/// Returns the program's path, or [`ToolError::NotFound`].
///
/// # Errors
///
/// Returns [`ToolError::NotFound`] if the runner cannot locate the program.
pub fn require(runner: &dyn ToolRunner, program: &str) -> Result<PathBuf, ToolError> {
    runner.locate(program).ok_or_else(|| ToolError::not_found(program))
}
