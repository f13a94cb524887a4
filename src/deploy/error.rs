// ABOUTME: Error types for deployment stages.
// ABOUTME: Fatal failure taxonomy plus the stage wrapper that names where a run stopped.

use snafu::Snafu;
use std::fmt;

use crate::sync::SyncError;

/// Fatal errors raised by deployment stages.
///
/// A tolerated check failure is not represented here; it becomes a
/// `diagnostics::Warning` and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The remote session could not be established.
    #[error("connection failed: {0}")]
    Connection(#[source] crate::ssh::Error),

    /// A file or directory transfer failed.
    #[error("upload of {path} failed: {reason}")]
    Upload { path: String, reason: String },

    /// A non-tolerant command exited nonzero.
    #[error("command `{command}` failed with exit code {exit_code}{}", stderr_suffix(.stderr))]
    Command {
        command: String,
        exit_code: u32,
        stderr: String,
    },

    /// A check of written content failed, e.g. `nginx -t` on a new site.
    /// Nothing that depends on the content has been activated.
    #[error("validation `{command}` failed: {output}")]
    Validation { command: String, output: String },

    /// The session broke while a command was running.
    #[error("remote session failed while running `{command}`: {source}")]
    Transport {
        command: String,
        #[source]
        source: crate::ssh::Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Connection,
    Upload,
    Command,
    Validation,
    Transport,
}

impl DeployError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Connection(_) => DeployErrorKind::Connection,
            DeployError::Upload { .. } => DeployErrorKind::Upload,
            DeployError::Command { .. } => DeployErrorKind::Command,
            DeployError::Validation { .. } => DeployErrorKind::Validation,
            DeployError::Transport { .. } => DeployErrorKind::Transport,
        }
    }

    /// The remote command that failed, when there was one.
    pub fn command(&self) -> Option<&str> {
        match self {
            DeployError::Command { command, .. }
            | DeployError::Validation { command, .. }
            | DeployError::Transport { command, .. } => Some(command),
            DeployError::Connection(_) | DeployError::Upload { .. } => None,
        }
    }

    pub fn upload(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        DeployError::Upload {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<SyncError> for DeployError {
    fn from(err: SyncError) -> Self {
        let path = err.path();
        DeployError::Upload {
            path,
            reason: err.to_string(),
        }
    }
}

/// Stages of a deployment run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Synchronize,
    Provision,
    Build,
    InstallServices,
    Restart,
    HealthCheck,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Synchronize => "synchronize",
            Stage::Provision => "provision",
            Stage::Build => "build",
            Stage::InstallServices => "install-services",
            Stage::Restart => "restart",
            Stage::HealthCheck => "health-check",
        };
        f.write_str(name)
    }
}

/// A run that stopped in a particular stage.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RunError {
    #[snafu(display("{stage} stage failed: {source}"))]
    Stage { stage: Stage, source: DeployError },
}

impl RunError {
    /// The stage the run stopped in.
    pub fn stage(&self) -> Stage {
        match self {
            RunError::Stage { stage, .. } => *stage,
        }
    }

    /// The underlying fatal error.
    pub fn cause(&self) -> &DeployError {
        match self {
            RunError::Stage { source, .. } => source,
        }
    }

    pub fn kind(&self) -> DeployErrorKind {
        self.cause().kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_includes_stderr() {
        let err = DeployError::Command {
            command: "npm run build".to_string(),
            exit_code: 2,
            stderr: "  Type error\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command `npm run build` failed with exit code 2: Type error"
        );
        assert_eq!(err.command(), Some("npm run build"));
    }

    #[test]
    fn command_error_without_stderr_has_no_suffix() {
        let err = DeployError::Command {
            command: "false".to_string(),
            exit_code: 1,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "command `false` failed with exit code 1");
    }

    #[test]
    fn sync_errors_become_upload_errors() {
        let err: DeployError = SyncError::MissingRoot("/src".into()).into();
        assert_eq!(err.kind(), DeployErrorKind::Upload);
    }

    #[test]
    fn run_error_names_stage() {
        let err = RunError::Stage {
            stage: Stage::Build,
            source: DeployError::Command {
                command: "npm run build".to_string(),
                exit_code: 1,
                stderr: String::new(),
            },
        };
        assert!(err.to_string().starts_with("build stage failed"));
        assert_eq!(err.stage(), Stage::Build);
        assert_eq!(err.kind(), DeployErrorKind::Command);
    }
}
