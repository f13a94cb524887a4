// ABOUTME: Exec command implementation.
// ABOUTME: Runs one command inside the remote root and fails on a nonzero exit.

use super::connection::{close, open, report_warnings};
use tandem::config::Config;
use tandem::deploy::CommandRunner;
use tandem::diagnostics::Diagnostics;
use tandem::error::Result;
use tandem::output::Output;

/// Execute a command in the remote root. Arguments are joined verbatim.
pub async fn exec(config: Config, command: Vec<String>, output: Output) -> Result<()> {
    let command = command.join(" ");

    let mut diag = Diagnostics::default();
    let session = open(&config, &output).await?;
    let result = {
        let mut runner = CommandRunner::new(&session, &output);
        let result = runner.run_in(&config.remote_root, &command).await;
        diag.absorb(runner.into_parts().1);
        result
    };
    close(session, &mut diag).await;
    report_warnings(&diag, &output);

    result?;
    Ok(())
}
