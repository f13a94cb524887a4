// ABOUTME: Errors raised by the SSH transport.
// ABOUTME: Connecting, authenticating, running commands, and moving file contents over a channel.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// TCP connect or handshake failed. Never carries credentials.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: no valid credentials")]
    AuthenticationFailed,

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    /// A channel could not be opened or fed.
    #[error("command execution failed: {0}")]
    CommandFailed(String),

    /// Only raised when a command timeout was configured.
    #[error("command exceeded the configured limit of {0:?}")]
    CommandTimeout(Duration),

    /// The transport dropped before the command reported an exit status.
    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    /// `mkdir -p`, `cat >` or `cat` on the host exited nonzero.
    #[error("transfer of {path} failed: {reason}")]
    TransferFailed { path: String, reason: String },

    #[error("SSH protocol error: {0}")]
    Protocol(#[source] russh::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
