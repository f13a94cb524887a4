// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects tolerated command failures and teardown problems to show at the end of a run.

/// Collects non-fatal warnings during deployment operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Move another accumulator's warnings into this one.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A tolerant command exited nonzero.
    pub fn tolerated_failure(command: &str, exit_code: u32) -> Self {
        Self {
            kind: WarningKind::ToleratedFailure,
            message: format!("`{}` exited with code {} (tolerated)", command, exit_code),
        }
    }

    /// Health checks did not all pass.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Unhealthy,
            message: message.into(),
        }
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A tolerant command failed; the run continued.
    ToleratedFailure,
    /// The advisory health check did not pass.
    Unhealthy,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}
