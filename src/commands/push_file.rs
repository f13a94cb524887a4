// ABOUTME: Push-file command implementation.
// ABOUTME: Hot-patches one remote file, verifies it, and optionally rebuilds and restarts.

use super::connection::{close, open, report_warnings};
use std::path::{Path, PathBuf};
use tandem::config::Config;
use tandem::deploy::{CommandRunner, DeployError, DeployPlan, rebuild, replace_file};
use tandem::diagnostics::Diagnostics;
use tandem::error::{Error, Result};
use tandem::output::Output;
use tandem::remote::Remote;

/// Arguments of `tandem push-file`.
pub struct PushRequest {
    pub local: PathBuf,
    /// Relative to the remote root.
    pub remote: String,
    pub expect: Option<String>,
    pub rebuild: bool,
}

pub async fn push_file(config: Config, request: PushRequest, mut output: Output) -> Result<()> {
    output.start_timer();
    let contents = std::fs::read(&request.local)?;
    if let Some(marker) = &request.expect
        && !String::from_utf8_lossy(&contents).contains(marker.as_str())
    {
        return Err(Error::Verification(format!(
            "{} does not contain {:?}",
            request.local.display(),
            marker
        )));
    }

    let remote_path = config.remote_path(&request.remote);
    let plan = if request.rebuild {
        Some(config.plan(Path::new("."))?)
    } else {
        None
    };

    let mut diag = Diagnostics::default();
    let session = open(&config, &output).await?;
    let result = {
        let mut runner = CommandRunner::new(&session, &output);
        let result = apply(&mut runner, &remote_path, &contents, &request, plan.as_ref()).await;
        diag.absorb(runner.into_parts().1);
        result
    };
    close(session, &mut diag).await;
    report_warnings(&diag, &output);

    result?;
    output.success(&format!("Patched {}", remote_path));
    Ok(())
}

async fn apply<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    remote_path: &str,
    contents: &[u8],
    request: &PushRequest,
    plan: Option<&DeployPlan>,
) -> std::result::Result<(), DeployError> {
    replace_file(runner, remote_path, contents, request.expect.as_deref()).await?;
    if let Some(plan) = plan {
        runner.output().progress("\n→ Rebuilding...");
        rebuild(runner, plan).await?;
    }
    Ok(())
}
