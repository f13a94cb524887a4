// ABOUTME: Idempotent dependency provisioning on the remote host.
// ABOUTME: Runs a tolerant presence check and installs only when the check fails.

use serde::{Deserialize, Serialize};

use crate::remote::Remote;

use super::error::DeployError;
use super::runner::CommandRunner;

/// A runtime or tool the host must have before the build can run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dependency {
    /// Label used in progress output.
    pub name: String,
    /// Exits 0 when the dependency is present.
    pub check: String,
    /// Install steps, run in order, each fatal.
    pub install: Vec<String>,
}

impl Dependency {
    pub fn new(
        name: impl Into<String>,
        check: impl Into<String>,
        install: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            check: check.into(),
            install: install.into_iter().map(Into::into).collect(),
        }
    }
}

/// What the provisioner did for one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    AlreadyPresent,
    Installed,
}

/// Make sure a dependency is present, installing it if the check fails.
///
/// Running this twice in a row installs at most once: the second check
/// succeeds and no install step executes.
pub async fn ensure<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    dependency: &Dependency,
) -> Result<ProvisionOutcome, DeployError> {
    let check = runner.run_tolerant(&dependency.check).await?;
    if check.success() {
        tracing::debug!("{} already present", dependency.name);
        return Ok(ProvisionOutcome::AlreadyPresent);
    }

    runner
        .output()
        .progress(&format!("  → Installing {}...", dependency.name));
    for step in &dependency.install {
        runner.run(step).await?;
    }
    Ok(ProvisionOutcome::Installed)
}

/// Provision every dependency in order, stopping at the first failed install.
pub async fn ensure_all<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    dependencies: &[Dependency],
) -> Result<Vec<(String, ProvisionOutcome)>, DeployError> {
    let mut outcomes = Vec::with_capacity(dependencies.len());
    for dependency in dependencies {
        let outcome = ensure(runner, dependency).await?;
        outcomes.push((dependency.name.clone(), outcome));
    }
    Ok(outcomes)
}
