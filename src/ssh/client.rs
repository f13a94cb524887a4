// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, keepalive, authentication, command execution, and file transfer.

use super::error::{Error, Result};
use crate::remote::{OutputSink, OutputStream, parent_dir, shell_quote};
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// Unanswered keepalives tolerated before the transport is considered dead.
const KEEPALIVE_MAX: usize = 3;

/// Configuration for establishing an SSH session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Password, already resolved from the secret store.
    pub password: Option<String>,
    /// Optional path to private key file.
    /// If None, tries the password, then the SSH agent, then default key locations.
    pub key_path: Option<PathBuf>,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Optional limit on a single command. None (the default) waits for it to exit.
    pub command_timeout: Option<Duration>,
    /// Interval between transport keepalives (default: 30 seconds).
    pub keepalive_interval: Duration,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field("trust_on_first_use", &self.trust_on_first_use)
            .field("known_hosts_path", &self.known_hosts_path)
            .field("command_timeout", &self.command_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .finish()
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            password: None,
            key_path: None,
            trust_on_first_use: false,
            known_hosts_path: None,
            command_timeout: None,
            keepalive_interval: Duration::from_secs(30),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Undecoded channel output, used where file bytes must survive intact.
struct RawOutput {
    exit_code: u32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl RawOutput {
    fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

impl From<RawOutput> for CommandOutput {
    fn from(raw: RawOutput) -> Self {
        CommandOutput {
            exit_code: raw.exit_code,
            stdout: String::from_utf8_lossy(&raw.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&raw.stderr).into_owned(),
        }
    }
}

/// Channel output collected so far, each chunk also handed to the sink.
struct Capture<'s> {
    sink: Option<&'s dyn OutputSink>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl<'s> Capture<'s> {
    fn new(sink: Option<&'s dyn OutputSink>) -> Self {
        Self {
            sink,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    fn push(&mut self, stream: OutputStream, data: &[u8]) {
        if let Some(sink) = self.sink {
            sink.chunk(stream, data);
        }
        match stream {
            OutputStream::Stdout => self.stdout.extend_from_slice(data),
            OutputStream::Stderr => self.stderr.extend_from_slice(data),
        }
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn new(
        host: String,
        port: u16,
        trust_on_first_use: bool,
        known_hosts_path: Option<PathBuf>,
    ) -> Self {
        Self {
            host,
            port,
            trust_on_first_use,
            known_hosts_path,
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) => {
                if !self.trust_on_first_use {
                    return Ok(false);
                }
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!("Host key for {}:{} has changed", self.host, self.port);
                Ok(false)
            }
            // Unreadable known_hosts: only TOFU may proceed
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// Authentication method resolved from config.
enum AuthMethod {
    KeyFile(Arc<ssh_key::PrivateKey>),
    Password(String),
    Agent(AgentClient<UnixStream>),
}

/// An established SSH session.
///
/// The session is the single transport for a run: commands execute one at a
/// time on fresh channels, and a keepalive runs for the whole lifetime so
/// long builds do not trip idle timeouts.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate.
    ///
    /// No retry is attempted; any failure here is final for the run.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let russh_config = Config {
            inactivity_timeout: None,
            keepalive_interval: Some(config.keepalive_interval),
            keepalive_max: KEEPALIVE_MAX,
            ..Default::default()
        };

        let handler = SshHandler::new(
            config.host.clone(),
            config.port,
            config.trust_on_first_use,
            config.known_hosts_path.clone(),
        );

        let mut handle = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("Connection refused") {
                Error::Connection(format!(
                    "connection refused to {}:{}",
                    config.host, config.port
                ))
            } else {
                Error::Connection(format!("{}:{}: {}", config.host, config.port, e))
            }
        })?;

        let auth_method = Self::resolve_auth_method(&config).await?;
        let auth_success = Self::authenticate(&mut handle, &config, auth_method).await?;
        if !auth_success {
            return Err(Error::AuthenticationFailed);
        }

        tracing::debug!(
            "Connected to {}@{}:{} (keepalive every {:?})",
            config.user,
            config.host,
            config.port,
            config.keepalive_interval
        );

        Ok(Self { config, handle })
    }

    /// Resolve which authentication method to use.
    async fn resolve_auth_method(config: &SessionConfig) -> Result<AuthMethod> {
        if let Some(key_path) = &config.key_path {
            let key = load_secret_key(key_path, None).map_err(|e| Error::KeyLoadFailed {
                path: key_path.clone(),
                reason: e.to_string(),
            })?;
            return Ok(AuthMethod::KeyFile(Arc::new(key)));
        }

        if let Some(password) = &config.password {
            return Ok(AuthMethod::Password(password.clone()));
        }

        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(AuthMethod::Agent(agent));
        }

        let home = std::env::var("HOME").map_err(|_| {
            Error::AgentUnavailable("SSH agent not available and HOME not set".to_string())
        })?;

        let default_keys = [
            format!("{}/.ssh/id_ed25519", home),
            format!("{}/.ssh/id_rsa", home),
            format!("{}/.ssh/id_ecdsa", home),
        ];

        for key_path in &default_keys {
            if let Ok(key) = load_secret_key(key_path, None) {
                return Ok(AuthMethod::KeyFile(Arc::new(key)));
            }
        }

        Err(Error::AgentUnavailable(
            "SSH agent not available and no default keys found".to_string(),
        ))
    }

    /// Authenticate the session.
    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SessionConfig,
        auth_method: AuthMethod,
    ) -> Result<bool> {
        match auth_method {
            AuthMethod::KeyFile(key) => {
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = session
                    .authenticate_publickey(&config.user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
            AuthMethod::Password(password) => {
                let result = session
                    .authenticate_password(&config.user, password)
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
            AuthMethod::Agent(mut agent) => {
                let keys = agent.request_identities().await.map_err(|e| {
                    Error::AgentUnavailable(format!("failed to list agent keys: {}", e))
                })?;

                if keys.is_empty() {
                    return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
                }

                for key in &keys {
                    match session
                        .authenticate_publickey_with(&config.user, key.clone(), None, &mut agent)
                        .await
                    {
                        Ok(result) if result.success() => return Ok(true),
                        _ => continue,
                    }
                }
                Ok(false)
            }
        }
    }

    /// Execute a command on the remote host, blocking until it exits.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.exec_raw(command, None, None).await?.into())
    }

    /// Execute a command, forwarding output to `sink` as the host sends it.
    pub async fn exec_streaming(
        &self,
        command: &str,
        sink: &dyn OutputSink,
    ) -> Result<CommandOutput> {
        Ok(self.exec_raw(command, None, Some(sink)).await?.into())
    }

    /// Create a directory and its parents. Succeeds if it already exists.
    pub async fn ensure_directory(&self, path: &str) -> Result<()> {
        let raw = self
            .exec_raw(&format!("mkdir -p {}", shell_quote(path)), None, None)
            .await?;
        if raw.exit_code != 0 {
            return Err(Error::TransferFailed {
                path: path.to_string(),
                reason: raw.stderr_text(),
            });
        }
        Ok(())
    }

    /// Write bytes to a remote path, creating parent directories as needed.
    pub async fn upload(&self, contents: &[u8], remote_path: &str) -> Result<()> {
        let command = match parent_dir(remote_path) {
            Some(parent) => format!(
                "mkdir -p {} && cat > {}",
                shell_quote(parent),
                shell_quote(remote_path)
            ),
            None => format!("cat > {}", shell_quote(remote_path)),
        };
        self.transfer(&command, remote_path, contents).await
    }

    /// Overwrite a remote file whose parent directory already exists.
    pub async fn write_file(&self, remote_path: &str, contents: &[u8]) -> Result<()> {
        let command = format!("cat > {}", shell_quote(remote_path));
        self.transfer(&command, remote_path, contents).await
    }

    /// Read a remote file's full contents.
    pub async fn read_file(&self, remote_path: &str) -> Result<Vec<u8>> {
        let raw = self
            .exec_raw(&format!("cat {}", shell_quote(remote_path)), None, None)
            .await?;
        if raw.exit_code != 0 {
            return Err(Error::TransferFailed {
                path: remote_path.to_string(),
                reason: raw.stderr_text(),
            });
        }
        Ok(raw.stdout)
    }

    async fn transfer(&self, command: &str, remote_path: &str, contents: &[u8]) -> Result<()> {
        let raw = self.exec_raw(command, Some(contents), None).await?;
        if raw.exit_code != 0 {
            return Err(Error::TransferFailed {
                path: remote_path.to_string(),
                reason: raw.stderr_text(),
            });
        }
        tracing::debug!("Wrote {} bytes to {}", contents.len(), remote_path);
        Ok(())
    }

    /// Run a command to completion, bounded only by a configured timeout.
    async fn exec_raw(
        &self,
        command: &str,
        input: Option<&[u8]>,
        sink: Option<&dyn OutputSink>,
    ) -> Result<RawOutput> {
        let run = self.exec_inner(command, input, sink);
        match self.config.command_timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| Error::CommandTimeout(limit))?,
            None => run.await,
        }
    }

    async fn exec_inner(
        &self,
        command: &str,
        input: Option<&[u8]>,
        sink: Option<&dyn OutputSink>,
    ) -> Result<RawOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        if let Some(input) = input {
            channel
                .data(input)
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to send data: {}", e)))?;
            channel
                .eof()
                .await
                .map_err(|e| Error::CommandFailed(format!("failed to close stdin: {}", e)))?;
        }

        let mut capture = Capture::new(sink);
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    capture.push(OutputStream::Stdout, &data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    // ext 1 is stderr
                    if ext == 1 {
                        capture.push(OutputStream::Stderr, &data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // No exit status means the transport dropped mid-command
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        Ok(RawOutput {
            exit_code,
            stdout: capture.stdout,
            stderr: capture.stderr,
        })
    }

    /// Disconnect the session.
    pub async fn close(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}
