// ABOUTME: systemd unit rendering and installation.
// ABOUTME: Units are regenerated every run and overwrite the previous file wholesale.

use std::fmt::Write as _;

use crate::config::RestartPolicy;
use crate::remote::{Remote, shell_quote};
use crate::types::ServiceName;

use super::error::DeployError;
use super::runner::CommandRunner;

/// Directory systemd loads administrator units from.
pub const UNIT_DIR: &str = "/etc/systemd/system";

/// A long-running process managed by systemd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: ServiceName,
    pub description: String,
    /// Process owner.
    pub user: String,
    pub working_dir: String,
    /// Start command, passed verbatim as `ExecStart`.
    pub exec: String,
    pub restart: RestartPolicy,
    /// Environment in declaration order; keys are unique.
    pub env: Vec<(String, String)>,
}

impl ServiceSpec {
    /// Absolute path of the unit file.
    pub fn unit_path(&self) -> String {
        format!("{}/{}", UNIT_DIR, self.name.unit())
    }

    /// Render the unit file.
    pub fn render(&self) -> String {
        let mut unit = String::new();
        let _ = writeln!(unit, "[Unit]");
        let _ = writeln!(unit, "Description={}", self.description);
        let _ = writeln!(unit, "After=network.target");
        let _ = writeln!(unit);
        let _ = writeln!(unit, "[Service]");
        let _ = writeln!(unit, "Type=simple");
        let _ = writeln!(unit, "User={}", self.user);
        let _ = writeln!(unit, "WorkingDirectory={}", self.working_dir);
        let _ = writeln!(unit, "ExecStart={}", self.exec);
        let _ = writeln!(unit, "Restart={}", self.restart);
        let _ = writeln!(unit, "RestartSec=5");
        for (key, value) in &self.env {
            let _ = writeln!(unit, "Environment=\"{}={}\"", key, escape_env_value(value));
        }
        let _ = writeln!(unit);
        let _ = writeln!(unit, "[Install]");
        let _ = writeln!(unit, "WantedBy=multi-user.target");
        unit
    }
}

/// Escape a value for a double-quoted `Environment=` assignment.
fn escape_env_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '%' => escaped.push_str("%%"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Write a service's unit file, replacing any previous version.
pub async fn install<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    spec: &ServiceSpec,
) -> Result<(), DeployError> {
    runner
        .write_file(&spec.unit_path(), spec.render().as_bytes())
        .await
}

/// Reload systemd's view of the units and enable them at boot.
pub async fn activate<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    names: &[ServiceName],
) -> Result<(), DeployError> {
    runner.run("systemctl daemon-reload").await?;
    runner
        .run(&format!("systemctl enable {}", unit_list(names)))
        .await?;
    Ok(())
}

/// Restart the services so they pick up new code, units, and environment.
pub async fn restart<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    names: &[ServiceName],
) -> Result<(), DeployError> {
    runner
        .run(&format!("systemctl restart {}", unit_list(names)))
        .await?;
    Ok(())
}

fn unit_list(names: &[ServiceName]) -> String {
    names
        .iter()
        .map(|name| shell_quote(&name.unit()))
        .collect::<Vec<_>>()
        .join(" ")
}
