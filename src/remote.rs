// ABOUTME: The remote host capability every deployment stage works through.
// ABOUTME: Implemented by the SSH session; also holds shell quoting and remote path helpers.

use crate::diagnostics::{Diagnostics, Warning};
use crate::ssh::{CommandOutput, Result, Session};
use async_trait::async_trait;

/// Which remote stream a chunk of command output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives command output while the command is still running.
pub trait OutputSink: Send + Sync {
    fn chunk(&self, stream: OutputStream, data: &[u8]);
}

/// Operations the orchestrator needs from the deployment host.
///
/// All calls block until the remote side has finished; there is never more
/// than one outstanding operation per session.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Run a shell command and wait for it to exit.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Run a shell command, handing output to `sink` as it arrives.
    ///
    /// The returned output still holds everything the command printed.
    async fn exec_streaming(&self, command: &str, sink: &dyn OutputSink) -> Result<CommandOutput> {
        let output = self.exec(command).await?;
        if !output.stdout.is_empty() {
            sink.chunk(OutputStream::Stdout, output.stdout.as_bytes());
        }
        if !output.stderr.is_empty() {
            sink.chunk(OutputStream::Stderr, output.stderr.as_bytes());
        }
        Ok(output)
    }

    /// Write bytes to `remote_path`, creating parent directories as needed.
    async fn upload(&self, contents: &[u8], remote_path: &str) -> Result<()>;

    /// Create a directory if it does not exist yet.
    async fn ensure_directory(&self, path: &str) -> Result<()>;

    /// Read a remote file's full contents.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Replace a remote file's contents.
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Release the session. Nothing may run on it afterwards.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl Remote for Session {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Session::exec(self, command).await
    }

    async fn exec_streaming(&self, command: &str, sink: &dyn OutputSink) -> Result<CommandOutput> {
        Session::exec_streaming(self, command, sink).await
    }

    async fn upload(&self, contents: &[u8], remote_path: &str) -> Result<()> {
        Session::upload(self, contents, remote_path).await
    }

    async fn ensure_directory(&self, path: &str) -> Result<()> {
        Session::ensure_directory(self, path).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Session::read_file(self, path).await
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        Session::write_file(self, path, contents).await
    }

    async fn close(&self) -> Result<()> {
        Session::close(self).await
    }
}

/// Close the session, recording a failure as a warning rather than an error.
pub async fn close_session<R: Remote + ?Sized>(remote: &R, diagnostics: &mut Diagnostics) {
    if let Err(e) = remote.close().await {
        diagnostics.warn(Warning::ssh_disconnect(format!("SSH disconnect failed: {}", e)));
    }
}

/// Quote a string for a POSIX shell.
///
/// Plain tokens pass through untouched so echoed commands stay readable.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '/' | '.' | '-' | '_' | ':' | '=' | '@' | '+' | ',')
        });
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Join a path onto a remote root. `.` and empty mean the root itself;
/// absolute paths are returned unchanged.
pub fn join_path(root: &str, path: &str) -> String {
    let path = path.trim_start_matches("./");
    if path.is_empty() || path == "." {
        return root.to_string();
    }
    if path.starts_with('/') {
        return path.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), path.trim_end_matches('/'))
}

/// Parent directory of a remote path, if it has one.
pub fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(pos) => Some(&trimmed[..pos]),
        None => None,
    }
}
