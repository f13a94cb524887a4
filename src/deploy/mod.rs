// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the stages, their building blocks, and the end-to-end run.

mod build;
mod deployment;
mod error;
mod health;
mod patch;
mod plan;
mod provision;
mod proxy;
mod runner;
mod state;
mod transitions;
mod units;
mod verify;

pub use build::{BuildStep, run_build};
pub use deployment::{Deployment, DeploymentSummary, Failed};
pub use error::{DeployError, DeployErrorKind, RunError, Stage};
pub use health::{HealthPolicy, HealthReport, PortHealth, ServiceHealth, check as check_health};
pub use patch::{rebuild, replace_file};
pub use plan::DeployPlan;
pub use provision::{Dependency, ProvisionOutcome, ensure, ensure_all};
pub use proxy::{ProxyRoute, SITES_AVAILABLE, SITES_ENABLED, install_route};
pub use runner::{CommandResult, CommandRunner, Tolerance, in_dir};
pub use state::{
    Built, Connected, HealthChecked, Provisioned, Restarted, ServicesInstalled, Synchronized,
};
pub use transitions::run;
pub use units::{
    ServiceSpec, UNIT_DIR, activate as activate_units, install as install_unit,
    restart as restart_units,
};
pub use verify::{ArtifactCheck, VerifyReport, VerifyRequest, journal_command, verify};
