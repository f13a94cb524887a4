// ABOUTME: Build pipeline for each sub-project on the remote host.
// ABOUTME: Optionally wipes stale output, then installs dependencies and builds, in order.

use serde::Deserialize;

use crate::remote::{Remote, join_path, shell_quote};

use super::error::DeployError;
use super::runner::CommandRunner;

/// Build commands for one sub-project (the web app, the worker binary).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildStep {
    pub name: String,
    /// Working directory relative to the remote root.
    #[serde(default = "default_dir")]
    pub dir: String,
    /// Build output directory removed before installing, forcing a full rebuild.
    #[serde(default)]
    pub clean: Option<String>,
    /// Dependency install command.
    #[serde(default)]
    pub install: Option<String>,
    pub build: String,
}

fn default_dir() -> String {
    ".".to_string()
}

impl BuildStep {
    /// Reject clean targets that could escape the working directory.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(clean) = &self.clean {
            let escapes = clean.is_empty()
                || clean.starts_with('/')
                || clean
                    .split('/')
                    .any(|segment| segment.is_empty() || segment == "." || segment == "..");
            if escapes {
                return Err(format!(
                    "build '{}': clean path '{}' must be a relative path inside the build directory",
                    self.name, clean
                ));
            }
        }
        if self.build.trim().is_empty() {
            return Err(format!("build '{}': build command is empty", self.name));
        }
        Ok(())
    }

    /// Commands in execution order, relative to the step's directory.
    pub fn commands(&self) -> Vec<String> {
        let mut commands = Vec::with_capacity(3);
        if let Some(clean) = &self.clean {
            commands.push(format!("rm -rf {}", shell_quote(clean)));
        }
        if let Some(install) = &self.install {
            commands.push(install.clone());
        }
        commands.push(self.build.clone());
        commands
    }
}

/// Run one build step inside its directory under `remote_root`.
pub async fn run_build<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    remote_root: &str,
    step: &BuildStep,
) -> Result<(), DeployError> {
    let dir = join_path(remote_root, &step.dir);
    runner
        .output()
        .progress(&format!("  → Building {} in {}...", step.name, dir));
    for command in step.commands() {
        runner.run_in(&dir, &command).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(clean: Option<&str>) -> BuildStep {
        BuildStep {
            name: "web".to_string(),
            dir: ".".to_string(),
            clean: clean.map(str::to_string),
            install: Some("npm install".to_string()),
            build: "npm run build".to_string(),
        }
    }

    #[test]
    fn commands_run_clean_install_build_in_order() {
        assert_eq!(
            step(Some(".next")).commands(),
            ["rm -rf .next", "npm install", "npm run build"]
        );
    }

    #[test]
    fn commands_without_clean_or_install() {
        let mut step = step(None);
        step.install = None;
        assert_eq!(step.commands(), ["npm run build"]);
    }

    #[test]
    fn validate_rejects_escaping_clean_paths() {
        for bad in ["/", "..", "../x", "a/../../b", ".", ""] {
            assert!(step(Some(bad)).validate().is_err(), "{bad:?} should be rejected");
        }
        assert!(step(Some(".next")).validate().is_ok());
        assert!(step(Some("dist/cache")).validate().is_ok());
    }
}
