// ABOUTME: Verify command implementation.
// ABOUTME: Checks deployed artifacts and service state over one session without changing anything.

use super::connection::{close, open, report_warnings};
use super::deploy::print_health;
use tandem::config::Config;
use tandem::deploy::{CommandRunner, VerifyRequest, verify as run_checks};
use tandem::diagnostics::Diagnostics;
use tandem::error::{Error, Result};
use tandem::output::Output;

/// Verify the deployment. `marker` is a file relative to the remote root and its expected text.
pub async fn verify(
    config: Config,
    marker: Option<(String, String)>,
    output: Output,
) -> Result<()> {
    let request = VerifyRequest {
        marker: marker.map(|(file, text)| (config.remote_path(&file), text)),
        build_output: config
            .verify
            .build_output
            .as_deref()
            .map(|p| config.remote_path(p)),
        env_file: config
            .verify
            .env_file
            .as_deref()
            .map(|p| config.remote_path(p)),
        services: config.services.iter().map(|s| s.name.clone()).collect(),
        port: config.health.port,
    };

    let mut diag = Diagnostics::default();
    let session = open(&config, &output).await?;
    let result = {
        let mut runner = CommandRunner::new(&session, &output);
        let result = run_checks(&mut runner, &request).await;
        diag.absorb(runner.into_parts().1);
        result
    };
    close(session, &mut diag).await;
    report_warnings(&diag, &output);

    let report = result?;
    output.progress("\nArtifacts:");
    for check in &report.artifacts {
        let mark = if check.passed { "✓" } else { "✗" };
        output.progress(&format!("  {} {}", mark, check.name));
    }
    print_health(&report.health, &output);
    output.json(&report);

    if report.passed() {
        output.success("Verification passed");
        Ok(())
    } else {
        Err(Error::Verification(report.problems().join("; ")))
    }
}
