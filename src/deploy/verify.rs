// ABOUTME: Read-only checks of a finished deployment.
// ABOUTME: Marker grep, build output and env file presence, plus a single health check round.

use serde::Serialize;

use crate::remote::{Remote, shell_quote};
use crate::types::ServiceName;

use super::error::DeployError;
use super::health::{self, HealthPolicy, HealthReport};
use super::runner::CommandRunner;

/// What to look for. Paths are absolute.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    /// File and the text it must contain.
    pub marker: Option<(String, String)>,
    pub build_output: Option<String>,
    pub env_file: Option<String>,
    pub services: Vec<ServiceName>,
    pub port: Option<u16>,
}

/// One artifact check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactCheck {
    pub name: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub artifacts: Vec<ArtifactCheck>,
    pub health: HealthReport,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.artifacts.iter().all(|c| c.passed) && self.health.passed()
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .artifacts
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.clone())
            .collect();
        problems.extend(self.health.problems());
        problems
    }
}

/// Run every check. All checks are tolerant; only a broken session fails.
pub async fn verify<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    request: &VerifyRequest,
) -> Result<VerifyReport, DeployError> {
    let mut artifacts = Vec::new();

    if let Some((path, text)) = &request.marker {
        let found = runner
            .run_tolerant(&format!(
                "grep -F -- {} {}",
                shell_quote(text),
                shell_quote(path)
            ))
            .await?;
        artifacts.push(ArtifactCheck {
            name: format!("{} contains {:?}", path, text),
            passed: found.success(),
        });
    }

    if let Some(dir) = &request.build_output {
        let found = runner.run_tolerant(&format!("test -d {}", shell_quote(dir))).await?;
        artifacts.push(ArtifactCheck {
            name: format!("build output {} exists", dir),
            passed: found.success(),
        });
    }

    if let Some(file) = &request.env_file {
        let found = runner.run_tolerant(&format!("test -f {}", shell_quote(file))).await?;
        artifacts.push(ArtifactCheck {
            name: format!("env file {} exists", file),
            passed: found.success(),
        });
    }

    let health = health::check(runner, &request.services, HealthPolicy::once(request.port)).await?;

    Ok(VerifyReport { artifacts, health })
}

/// `journalctl` invocation for the last `lines` entries of a unit.
pub fn journal_command(service: &ServiceName, lines: u32) -> String {
    format!(
        "journalctl -u {} -n {} --no-pager",
        shell_quote(&service.unit()),
        lines
    )
}
