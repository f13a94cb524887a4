// ABOUTME: Advisory post-restart health checks.
// ABOUTME: Polls systemd service state and the listening-socket table; never fails the run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::remote::{Remote, shell_quote};
use crate::types::ServiceName;

use super::error::DeployError;
use super::runner::CommandRunner;

/// How long to keep polling after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Port the web app should be listening on.
    pub port: Option<u16>,
    /// Check rounds before giving up (at least 1).
    pub attempts: u32,
    /// Pause between rounds.
    pub interval: Duration,
}

impl HealthPolicy {
    pub fn once(port: Option<u16>) -> Self {
        Self {
            port,
            attempts: 1,
            interval: Duration::ZERO,
        }
    }
}

/// State of one service as systemd reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    /// `systemctl is-active` output, e.g. `active`, `failed`, `activating`.
    pub state: String,
    /// Head of `systemctl status` for the operator.
    pub status: String,
}

impl ServiceHealth {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

/// Listening-socket check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortHealth {
    pub port: u16,
    pub listening: bool,
    /// Matching lines from `ss`.
    pub sockets: String,
}

/// Result of the final check round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub attempts: u32,
    pub services: Vec<ServiceHealth>,
    pub port: Option<PortHealth>,
}

impl HealthReport {
    pub fn passed(&self) -> bool {
        self.services.iter().all(ServiceHealth::is_active)
            && self.port.as_ref().is_none_or(|p| p.listening)
    }

    /// One line per failing check.
    pub fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .services
            .iter()
            .filter(|s| !s.is_active())
            .map(|s| format!("service {} is {}", s.name, s.state))
            .collect();
        if let Some(port) = &self.port
            && !port.listening
        {
            problems.push(format!("nothing is listening on port {}", port.port));
        }
        problems
    }
}

/// Check services and the expected port, retrying until healthy or out of attempts.
///
/// All checks are tolerant; only a broken session makes this fail.
pub async fn check<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    services: &[ServiceName],
    policy: HealthPolicy,
) -> Result<HealthReport, DeployError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let report = check_once(runner, services, policy.port, attempt).await?;
        if report.passed() || attempt >= attempts {
            return Ok(report);
        }
        tracing::debug!(
            "Health check {}/{} not yet passing: {:?}",
            attempt,
            attempts,
            report.problems()
        );
        tokio::time::sleep(policy.interval).await;
        attempt += 1;
    }
}

async fn check_once<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    services: &[ServiceName],
    port: Option<u16>,
    attempt: u32,
) -> Result<HealthReport, DeployError> {
    let mut service_health = Vec::with_capacity(services.len());
    for name in services {
        let unit = shell_quote(&name.unit());
        let state = runner
            .run_tolerant(&format!("systemctl is-active {}", unit))
            .await?;
        let status = runner
            .run_tolerant(&format!("systemctl status {} --no-pager | head -n 20", unit))
            .await?;
        let state = state.stdout.trim();
        service_health.push(ServiceHealth {
            name: name.to_string(),
            state: if state.is_empty() {
                "unknown".to_string()
            } else {
                state.to_string()
            },
            status: status.stdout.trim_end().to_string(),
        });
    }

    let port = match port {
        Some(port) => {
            let sockets = runner
                .run_tolerant(&format!("ss -tlnp | grep ':{} '", port))
                .await?;
            let lines = sockets.stdout.trim().to_string();
            Some(PortHealth {
                port,
                listening: sockets.success() && !lines.is_empty(),
                sockets: lines,
            })
        }
        None => None,
    };

    Ok(HealthReport {
        checked_at: Utc::now(),
        attempts: attempt,
        services: service_health,
        port,
    })
}
