// ABOUTME: Deploy command implementation.
// ABOUTME: Resolves the plan, runs every stage over one session, and prints the summary.

use super::connection::{open, report_warnings};
use std::path::Path;
use tandem::config::Config;
use tandem::deploy::{DeploymentSummary, HealthReport, ProvisionOutcome, run};
use tandem::diagnostics::Diagnostics;
use tandem::error::Result;
use tandem::output::Output;

/// Deploy to the configured target.
pub async fn deploy(config: Config, base_dir: &Path, mut output: Output) -> Result<()> {
    output.start_timer();

    // Resolves service secrets; must happen before connecting.
    let plan = config.plan(base_dir)?;
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Deploying {} to {}:{} ({} service(s))",
        plan.local_root.display(),
        config.target.host,
        plan.remote_root,
        plan.services.len()
    ));

    let session = open(&config, &output).await?;
    // Closes the session on every path.
    let result = run(&session, &plan, &output, &mut diag).await;
    report_warnings(&diag, &output);
    let summary = result?;

    print_summary(&summary, &config, &output);

    output.success("Deployment complete!");
    Ok(())
}

fn print_summary(summary: &DeploymentSummary, config: &Config, output: &Output) {
    let installed: Vec<&str> = summary
        .provisioned
        .iter()
        .filter(|(_, outcome)| *outcome == ProvisionOutcome::Installed)
        .map(|(name, _)| name.as_str())
        .collect();
    if !installed.is_empty() {
        output.progress(&format!("\nInstalled: {}", installed.join(", ")));
    }

    print_health(&summary.report, output);
    output.json(&summary.report);

    output.progress(&format!(
        "\n{} commands run, {} entries uploaded",
        summary.commands.len(),
        summary.manifest.len()
    ));
    if let Some(url) = config.access_url() {
        output.progress(&format!("Access URL: {}", url));
    }
}

pub(crate) fn print_health(report: &HealthReport, output: &Output) {
    output.progress("\nHealth:");
    for service in &report.services {
        let mark = if service.is_active() { "✓" } else { "✗" };
        output.progress(&format!("  {} {} ({})", mark, service.name, service.state));
    }
    if let Some(port) = &report.port {
        if port.listening {
            output.progress(&format!("  ✓ port {} listening", port.port));
        } else {
            output.progress(&format!("  ✗ nothing listening on port {}", port.port));
        }
    }
}
