// ABOUTME: Logs command implementation.
// ABOUTME: Prints recent journal output for one or all services.

use super::connection::{close, open, report_warnings};
use tandem::config::Config;
use tandem::deploy::{CommandRunner, journal_command};
use tandem::diagnostics::Diagnostics;
use tandem::error::{Error, Result};
use tandem::output::Output;
use tandem::types::ServiceName;

pub async fn logs(
    config: Config,
    service: Option<String>,
    lines: u32,
    output: Output,
) -> Result<()> {
    let names: Vec<ServiceName> = match service {
        Some(name) => {
            let found = config
                .services
                .iter()
                .find(|s| s.name.as_str() == name)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown service: {}", name)))?;
            vec![found.name.clone()]
        }
        None => config.services.iter().map(|s| s.name.clone()).collect(),
    };

    let mut diag = Diagnostics::default();
    let session = open(&config, &output).await?;
    let result = {
        let mut runner = CommandRunner::new(&session, &output);
        let mut result = Ok(());
        for name in &names {
            if let Err(e) = runner.run_tolerant(&journal_command(name, lines)).await {
                result = Err(e);
                break;
            }
        }
        diag.absorb(runner.into_parts().1);
        result
    };
    close(session, &mut diag).await;
    report_warnings(&diag, &output);

    result.map_err(Error::from)
}
