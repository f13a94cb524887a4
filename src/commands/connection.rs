// ABOUTME: Shared helpers for opening and closing the SSH session.
// ABOUTME: Every command opens through `open` and closes through `close` on all exit paths.

use tandem::config::Config;
use tandem::deploy::DeployError;
use tandem::diagnostics::Diagnostics;
use tandem::error::Result;
use tandem::output::Output;
use tandem::remote::close_session;
use tandem::ssh::Session;

/// Resolve credentials and connect to the configured target.
pub async fn open(config: &Config, output: &Output) -> Result<Session> {
    let session_config = config.target.session_config()?;
    output.progress(&format!(
        "→ Connecting to {}@{}...",
        config.target.user,
        config.target.address()
    ));
    let session = Session::connect(session_config)
        .await
        .map_err(DeployError::Connection)?;
    output.progress("  ✓ Connected");
    Ok(session)
}

/// Disconnect, recording a failure as a warning rather than an error.
pub async fn close(session: Session, diag: &mut Diagnostics) {
    close_session(&session, diag).await;
}

/// Print every collected warning.
pub fn report_warnings(diag: &Diagnostics, output: &Output) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}
