// ABOUTME: Executes remote commands with fatal or tolerant failure policy.
// ABOUTME: Echoes every command, streams its output, and keeps the run's command history.

use serde::Serialize;

use crate::diagnostics::{Diagnostics, Warning};
use crate::output::Output;
use crate::remote::{Remote, shell_quote};

use super::error::DeployError;

/// How a nonzero exit is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Nonzero exit aborts the stage and the run.
    Fatal,
    /// Nonzero exit is logged; execution continues.
    Tolerant,
}

/// Outcome of one remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands one at a time over the run's single remote session.
pub struct CommandRunner<'a, R: Remote + ?Sized> {
    remote: &'a R,
    output: &'a Output,
    history: Vec<CommandResult>,
    diagnostics: Diagnostics,
}

impl<'a, R: Remote + ?Sized> CommandRunner<'a, R> {
    pub fn new(remote: &'a R, output: &'a Output) -> Self {
        Self {
            remote,
            output,
            history: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Execute a command under the given policy.
    ///
    /// A broken session is always fatal, whatever the policy.
    pub async fn execute(
        &mut self,
        command: &str,
        tolerance: Tolerance,
    ) -> Result<CommandResult, DeployError> {
        self.output.command(command);

        let output = self
            .remote
            .exec_streaming(command, self.output)
            .await
            .map_err(|source| DeployError::Transport {
                command: command.to_string(),
                source,
            })?;

        self.output.command_exit(command, output.exit_code);

        let result = CommandResult {
            command: command.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        };
        self.history.push(result.clone());

        if result.success() {
            return Ok(result);
        }

        match tolerance {
            Tolerance::Fatal => Err(DeployError::Command {
                command: result.command,
                exit_code: result.exit_code,
                stderr: result.stderr,
            }),
            Tolerance::Tolerant => {
                self.diagnostics
                    .warn(Warning::tolerated_failure(command, result.exit_code));
                Ok(result)
            }
        }
    }

    /// Run a command whose failure aborts the run.
    pub async fn run(&mut self, command: &str) -> Result<CommandResult, DeployError> {
        self.execute(command, Tolerance::Fatal).await
    }

    /// Run a check whose failure is an expected signal.
    pub async fn run_tolerant(&mut self, command: &str) -> Result<CommandResult, DeployError> {
        self.execute(command, Tolerance::Tolerant).await
    }

    /// Run a fatal command inside `dir`.
    pub async fn run_in(&mut self, dir: &str, command: &str) -> Result<CommandResult, DeployError> {
        self.run(&in_dir(dir, command)).await
    }

    /// Replace a remote file; failures are upload errors.
    pub async fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), DeployError> {
        self.output.progress(&format!("  → Writing {}", path));
        self.remote
            .write_file(path, contents)
            .await
            .map_err(|e| DeployError::upload(path, e))
    }

    /// Upload bytes, creating parent directories.
    pub async fn upload(&mut self, contents: &[u8], path: &str) -> Result<(), DeployError> {
        self.output.progress(&format!("  → Uploading {}", path));
        self.remote
            .upload(contents, path)
            .await
            .map_err(|e| DeployError::upload(path, e))
    }

    /// Read a remote file.
    pub async fn read_file(&mut self, path: &str) -> Result<Vec<u8>, DeployError> {
        self.remote
            .read_file(path)
            .await
            .map_err(|source| DeployError::Transport {
                command: format!("cat {}", shell_quote(path)),
                source,
            })
    }

    pub fn remote(&self) -> &'a R {
        self.remote
    }

    pub fn output(&self) -> &'a Output {
        self.output
    }

    /// Every command executed so far, in order.
    pub fn history(&self) -> &[CommandResult] {
        &self.history
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn into_parts(self) -> (Vec<CommandResult>, Diagnostics) {
        (self.history, self.diagnostics)
    }
}

/// Prefix a command with a change of directory.
pub fn in_dir(dir: &str, command: &str) -> String {
    format!("cd {} && {}", shell_quote(dir), command)
}
