// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Owns the run's command runner and accumulates what each stage produced.

use crate::diagnostics::Diagnostics;
use crate::output::Output;
use crate::remote::Remote;
use crate::sync::FileManifest;

use super::error::DeployError;
use super::health::HealthReport;
use super::plan::DeployPlan;
use super::provision::ProvisionOutcome;
use super::runner::{CommandResult, CommandRunner};
use super::state::Connected;

/// A deployment in progress, parameterized by its current state.
///
/// Each stage method consumes the deployment and returns it in the next
/// state, so stages cannot be skipped or reordered. The remote session is
/// borrowed for the whole run and used by nothing else.
pub struct Deployment<'a, R: Remote + ?Sized, S> {
    pub(crate) plan: &'a DeployPlan,
    pub(crate) runner: CommandRunner<'a, R>,
    pub(crate) manifest: FileManifest,
    pub(crate) provisioned: Vec<(String, ProvisionOutcome)>,
    pub(crate) report: Option<HealthReport>,
    pub(crate) state: S,
}

impl<'a, R: Remote + ?Sized> Deployment<'a, R, Connected> {
    /// Start a deployment over an already open session.
    pub fn new(plan: &'a DeployPlan, remote: &'a R, output: &'a Output) -> Self {
        Deployment {
            plan,
            runner: CommandRunner::new(remote, output),
            manifest: FileManifest::new(),
            provisioned: Vec::new(),
            report: None,
            state: Connected,
        }
    }
}

impl<'a, R: Remote + ?Sized, S> Deployment<'a, R, S> {
    pub fn plan(&self) -> &DeployPlan {
        self.plan
    }

    /// Files uploaded so far (empty before synchronization).
    pub fn manifest(&self) -> &FileManifest {
        &self.manifest
    }

    /// Commands executed so far.
    pub fn history(&self) -> &[CommandResult] {
        self.runner.history()
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

/// What a completed run did. Warnings go to the caller's `Diagnostics`.
#[derive(Debug)]
pub struct DeploymentSummary {
    pub manifest: FileManifest,
    pub provisioned: Vec<(String, ProvisionOutcome)>,
    pub report: HealthReport,
    pub commands: Vec<CommandResult>,
}

/// Terminal state of a run stopped by a fatal error.
///
/// Keeps what was collected before the failure so warnings raised by
/// earlier checks still reach the operator.
#[derive(Debug)]
pub struct Failed {
    pub error: DeployError,
    pub commands: Vec<CommandResult>,
    pub diagnostics: Diagnostics,
}
