// ABOUTME: In-memory remote host for orchestrator tests.
// ABOUTME: Records every operation, answers commands from scripted rules, and keeps a virtual filesystem.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tandem::remote::{OutputSink, OutputStream, Remote, parent_dir};
use tandem::ssh::{CommandOutput, Error, Result};

struct Rule {
    pattern: String,
    exit_code: u32,
    stdout: String,
    stderr: String,
    once: bool,
    broken: bool,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    operations: Vec<String>,
    files: BTreeMap<String, Vec<u8>>,
    directories: BTreeSet<String>,
    closed: bool,
}

/// A scripted stand-in for the SSH session.
///
/// Commands answer with the first matching rule (substring match), one-shot
/// rules first. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every command containing `pattern`.
    pub fn respond(&self, pattern: &str, exit_code: u32, stdout: &str) -> &Self {
        self.push_rule(pattern, exit_code, stdout, "", false, false);
        self
    }

    /// Answer with stderr output too.
    pub fn respond_err(&self, pattern: &str, exit_code: u32, stderr: &str) -> &Self {
        self.push_rule(pattern, exit_code, "", stderr, false, false);
        self
    }

    /// Answer the next command containing `pattern`, then fall through to other rules.
    pub fn respond_once(&self, pattern: &str, exit_code: u32, stdout: &str) -> &Self {
        self.push_rule(pattern, exit_code, stdout, "", true, false);
        self
    }

    /// Make commands containing `pattern` fail at the transport level.
    pub fn break_on(&self, pattern: &str) -> &Self {
        self.push_rule(pattern, 0, "", "", false, true);
        self
    }

    /// Seed a file, as if left by an earlier run.
    pub fn put_file(&self, path: &str, contents: &[u8]) {
        self.state
            .lock()
            .files
            .insert(path.to_string(), contents.to_vec());
    }

    /// Executed commands, in order.
    pub fn commands(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| op.strip_prefix("exec: ").map(str::to_string))
            .collect()
    }

    /// Every operation in order: `exec: `, `write: `, `mkdir: `, `read: `, `stream: `, `close`.
    pub fn operations(&self) -> Vec<String> {
        self.state.lock().operations.clone()
    }

    /// Index of the first operation equal to `op`.
    pub fn position(&self, op: &str) -> Option<usize> {
        self.operations().iter().position(|o| o == op)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn file_text(&self, path: &str) -> Option<String> {
        self.file(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.state.lock().files.clone()
    }

    pub fn directories(&self) -> BTreeSet<String> {
        self.state.lock().directories.clone()
    }

    /// Commands whose output was handed to a sink while running, in order.
    pub fn streamed(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| op.strip_prefix("stream: ").map(str::to_string))
            .collect()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn push_rule(
        &self,
        pattern: &str,
        exit_code: u32,
        stdout: &str,
        stderr: &str,
        once: bool,
        broken: bool,
    ) {
        self.state.lock().rules.push(Rule {
            pattern: pattern.to_string(),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            once,
            broken,
        });
    }

    fn store(&self, path: &str, contents: &[u8]) {
        let mut state = self.state.lock();
        state.operations.push(format!("write: {}", path));
        if let Some(parent) = parent_dir(path) {
            state.directories.insert(parent.to_string());
        }
        state.files.insert(path.to_string(), contents.to_vec());
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn exec_streaming(&self, command: &str, sink: &dyn OutputSink) -> Result<CommandOutput> {
        self.state
            .lock()
            .operations
            .push(format!("stream: {}", command));
        let output = self.exec(command).await?;
        if !output.stdout.is_empty() {
            sink.chunk(OutputStream::Stdout, output.stdout.as_bytes());
        }
        if !output.stderr.is_empty() {
            sink.chunk(OutputStream::Stderr, output.stderr.as_bytes());
        }
        Ok(output)
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let mut state = self.state.lock();
        state.operations.push(format!("exec: {}", command));
        if state.closed {
            return Err(Error::ChannelClosed);
        }

        let index = state
            .rules
            .iter()
            .position(|r| r.once && command.contains(&r.pattern))
            .or_else(|| {
                state
                    .rules
                    .iter()
                    .position(|r| !r.once && command.contains(&r.pattern))
            });

        let Some(index) = index else {
            return Ok(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            });
        };

        let rule = if state.rules[index].once {
            state.rules.remove(index)
        } else {
            let r = &state.rules[index];
            Rule {
                pattern: r.pattern.clone(),
                exit_code: r.exit_code,
                stdout: r.stdout.clone(),
                stderr: r.stderr.clone(),
                once: false,
                broken: r.broken,
            }
        };

        if rule.broken {
            return Err(Error::ChannelClosed);
        }
        Ok(CommandOutput {
            exit_code: rule.exit_code,
            stdout: rule.stdout,
            stderr: rule.stderr,
        })
    }

    async fn upload(&self, contents: &[u8], remote_path: &str) -> Result<()> {
        self.store(remote_path, contents);
        Ok(())
    }

    async fn ensure_directory(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.operations.push(format!("mkdir: {}", path));
        state.directories.insert(path.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.operations.push(format!("read: {}", path));
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::TransferFailed {
                path: path.to_string(),
                reason: "No such file or directory".to_string(),
            })
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.store(path, contents);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.operations.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}
