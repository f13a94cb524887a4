// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state, or the Failed state on a fatal error.

use snafu::ResultExt;

use crate::diagnostics::{Diagnostics, Warning};
use crate::output::Output;
use crate::remote::{Remote, close_session};
use crate::sync::Synchronizer;

use super::build::run_build;
use super::deployment::{Deployment, DeploymentSummary, Failed};
use super::error::{DeployError, RunError, Stage, StageSnafu};
use super::health::{self, HealthReport};
use super::plan::DeployPlan;
use super::provision::ensure_all;
use super::proxy::install_route;
use super::state::{
    Built, Connected, HealthChecked, Provisioned, Restarted, ServicesInstalled, Synchronized,
};
use super::units;

/// Evaluate a step, or stop the deployment in the `Failed` state.
macro_rules! attempt {
    ($deployment:ident, $step:expr) => {{
        let result = $step;
        match result {
            Ok(value) => value,
            Err(error) => return Err($deployment.fail(error)),
        }
    }};
}

impl<'a, R: Remote + ?Sized, S> Deployment<'a, R, S> {
    fn transition<T>(self, state: T) -> Deployment<'a, R, T> {
        Deployment {
            plan: self.plan,
            runner: self.runner,
            manifest: self.manifest,
            provisioned: self.provisioned,
            report: self.report,
            state,
        }
    }

    fn fail(self, error: impl Into<DeployError>) -> Failed {
        let (commands, diagnostics) = self.runner.into_parts();
        Failed {
            error: error.into(),
            commands,
            diagnostics,
        }
    }

    fn progress(&self, message: &str) {
        self.runner.output().progress(message);
    }
}

// =============================================================================
// Connected -> Synchronized
// =============================================================================

impl<'a, R: Remote + ?Sized> Deployment<'a, R, Connected> {
    /// Upload the source tree, overwriting every remote copy.
    #[must_use = "deployment state must be used"]
    pub async fn synchronize(mut self) -> Result<Deployment<'a, R, Synchronized>, Failed> {
        let plan = self.plan;
        self.progress(&format!(
            "\n→ Uploading {} to {}...",
            plan.local_root.display(),
            plan.remote_root
        ));
        let synchronizer = Synchronizer::new(plan.exclude.clone());
        let manifest = attempt!(
            self,
            synchronizer
                .sync(self.runner.remote(), &plan.local_root, &plan.remote_root)
                .await
        );
        self.manifest = manifest;
        self.progress(&format!(
            "  ✓ Uploaded {} files, {} directories ({} bytes)",
            self.manifest.files().count(),
            self.manifest.directories().count(),
            self.manifest.total_bytes()
        ));
        Ok(self.transition(Synchronized))
    }
}

// =============================================================================
// Synchronized -> Provisioned
// =============================================================================

impl<'a, R: Remote + ?Sized> Deployment<'a, R, Synchronized> {
    /// Install any missing runtimes and tools.
    #[must_use = "deployment state must be used"]
    pub async fn provision(mut self) -> Result<Deployment<'a, R, Provisioned>, Failed> {
        let plan = self.plan;
        self.progress("\n→ Checking dependencies...");
        let provisioned = attempt!(self, ensure_all(&mut self.runner, &plan.dependencies).await);
        self.provisioned = provisioned;
        Ok(self.transition(Provisioned))
    }
}

// =============================================================================
// Provisioned -> Built
// =============================================================================

impl<'a, R: Remote + ?Sized> Deployment<'a, R, Provisioned> {
    /// Build every sub-project in declaration order.
    #[must_use = "deployment state must be used"]
    pub async fn build(mut self) -> Result<Deployment<'a, R, Built>, Failed> {
        let plan = self.plan;
        self.progress("\n→ Building...");
        for step in &plan.builds {
            attempt!(
                self,
                run_build(&mut self.runner, &plan.remote_root, step).await
            );
        }
        Ok(self.transition(Built))
    }
}

// =============================================================================
// Built -> ServicesInstalled
// =============================================================================

impl<'a, R: Remote + ?Sized> Deployment<'a, R, Built> {
    /// Write unit files, reload and enable them, then install the proxy route.
    #[must_use = "deployment state must be used"]
    pub async fn install_services(
        mut self,
    ) -> Result<Deployment<'a, R, ServicesInstalled>, Failed> {
        let plan = self.plan;
        self.progress("\n→ Installing services...");
        for spec in &plan.services {
            attempt!(self, units::install(&mut self.runner, spec).await);
        }
        attempt!(
            self,
            units::activate(&mut self.runner, &plan.service_names()).await
        );

        if let Some(route) = &plan.proxy {
            self.progress("\n→ Configuring reverse proxy...");
            attempt!(self, install_route(&mut self.runner, route).await);
        }
        Ok(self.transition(ServicesInstalled))
    }
}

// =============================================================================
// ServicesInstalled -> Restarted
// =============================================================================

impl<'a, R: Remote + ?Sized> Deployment<'a, R, ServicesInstalled> {
    /// Restart every service.
    #[must_use = "deployment state must be used"]
    pub async fn restart(mut self) -> Result<Deployment<'a, R, Restarted>, Failed> {
        let plan = self.plan;
        self.progress("\n→ Restarting services...");
        attempt!(
            self,
            units::restart(&mut self.runner, &plan.service_names()).await
        );
        Ok(self.transition(Restarted))
    }
}

// =============================================================================
// Restarted -> HealthChecked
// =============================================================================

impl<'a, R: Remote + ?Sized> Deployment<'a, R, Restarted> {
    /// Check services and the web port. An unhealthy result is a warning.
    #[must_use = "deployment state must be used"]
    pub async fn health_check(mut self) -> Result<Deployment<'a, R, HealthChecked>, Failed> {
        let plan = self.plan;
        self.progress("\n→ Health check...");
        let report = attempt!(
            self,
            health::check(&mut self.runner, &plan.service_names(), plan.health).await
        );
        for problem in report.problems() {
            self.runner.diagnostics_mut().warn(Warning::unhealthy(problem));
        }
        self.report = Some(report);
        Ok(self.transition(HealthChecked))
    }
}

impl<'a, R: Remote + ?Sized> Deployment<'a, R, HealthChecked> {
    /// The health check results.
    pub fn report(&self) -> Option<&HealthReport> {
        self.report.as_ref()
    }

    /// Finish the run, moving its warnings into `diagnostics`.
    pub fn finish(self, diagnostics: &mut Diagnostics) -> DeploymentSummary {
        let (commands, collected) = self.runner.into_parts();
        diagnostics.absorb(collected);
        DeploymentSummary {
            manifest: self.manifest,
            provisioned: self.provisioned,
            report: self.report.unwrap_or_else(|| HealthReport {
                checked_at: chrono::Utc::now(),
                attempts: 0,
                services: Vec::new(),
                port: None,
            }),
            commands,
        }
    }
}

/// Run every stage in order over an open session, then close it.
///
/// The first fatal error stops the run; no later stage executes. The
/// session is closed whether the run succeeded or failed, and every
/// warning collected on the way ends up in `diagnostics`.
pub async fn run<R: Remote + ?Sized>(
    remote: &R,
    plan: &DeployPlan,
    output: &Output,
    diagnostics: &mut Diagnostics,
) -> Result<DeploymentSummary, RunError> {
    let result = run_stages(remote, plan, output, diagnostics).await;
    close_session(remote, diagnostics).await;
    result
}

async fn run_stages<R: Remote + ?Sized>(
    remote: &R,
    plan: &DeployPlan,
    output: &Output,
    diagnostics: &mut Diagnostics,
) -> Result<DeploymentSummary, RunError> {
    let deployment = Deployment::new(plan, remote, output);

    let deployment = stage(deployment.synchronize().await, Stage::Synchronize, diagnostics)?;
    let deployment = stage(deployment.provision().await, Stage::Provision, diagnostics)?;
    let deployment = stage(deployment.build().await, Stage::Build, diagnostics)?;
    let deployment = stage(
        deployment.install_services().await,
        Stage::InstallServices,
        diagnostics,
    )?;
    let deployment = stage(deployment.restart().await, Stage::Restart, diagnostics)?;
    let deployment = stage(deployment.health_check().await, Stage::HealthCheck, diagnostics)?;

    Ok(deployment.finish(diagnostics))
}

/// Name the stage a failure happened in, keeping the warnings it collected.
fn stage<T>(
    result: Result<T, Failed>,
    stage: Stage,
    diagnostics: &mut Diagnostics,
) -> Result<T, RunError> {
    result
        .map_err(|failed| {
            diagnostics.absorb(failed.diagnostics);
            failed.error
        })
        .context(StageSnafu { stage })
}
