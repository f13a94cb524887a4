// ABOUTME: Single-file hot patch of a deployed tree.
// ABOUTME: Overwrites one file, reads it back to confirm, and optionally rebuilds and restarts.

use crate::remote::{Remote, shell_quote};

use super::build::run_build;
use super::error::DeployError;
use super::plan::DeployPlan;
use super::runner::CommandRunner;
use super::units;

/// Overwrite `path` and confirm the host now holds exactly `contents`.
///
/// With `expect`, the read-back must also contain that text.
pub async fn replace_file<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    path: &str,
    contents: &[u8],
    expect: Option<&str>,
) -> Result<(), DeployError> {
    runner.upload(contents, path).await?;

    let written = runner.read_file(path).await?;
    let read_back = format!("cat {}", shell_quote(path));
    if written != contents {
        return Err(DeployError::Validation {
            command: read_back,
            output: format!(
                "remote file has {} bytes, expected {} identical bytes",
                written.len(),
                contents.len()
            ),
        });
    }

    if let Some(marker) = expect
        && !String::from_utf8_lossy(&written).contains(marker)
    {
        return Err(DeployError::Validation {
            command: read_back,
            output: format!("marker {:?} not found", marker),
        });
    }

    runner
        .output()
        .progress(&format!("  ✓ {} verified ({} bytes)", path, written.len()));
    Ok(())
}

/// Re-run every build step, then restart all services.
pub async fn rebuild<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    plan: &DeployPlan,
) -> Result<(), DeployError> {
    for step in &plan.builds {
        run_build(runner, &plan.remote_root, step).await?;
    }
    units::restart(runner, &plan.service_names()).await
}
