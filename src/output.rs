// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, including per-command echo.

use serde::Serialize;
use std::io::Write;
use std::time::Instant;

use crate::remote::{OutputSink, OutputStream};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Echo a remote command before it runs.
    pub fn command(&self, command: &str) {
        match self.mode {
            OutputMode::Normal => println!("\n▶ {command}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit(&JsonEvent {
                event: "command",
                message: command,
                exit_code: None,
                duration_secs: None,
            }),
        }
    }

    /// Report how a remote command ended. Its output has already been streamed.
    pub fn command_exit(&self, command: &str, exit_code: u32) {
        match self.mode {
            OutputMode::Normal => {
                if exit_code != 0 {
                    eprintln!("  exit code {exit_code}");
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit(&JsonEvent {
                event: "command_exit",
                message: command,
                exit_code: Some(exit_code),
                duration_secs: None,
            }),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => self.emit_err(&JsonEvent {
                event: "warning",
                message,
                exit_code: None,
                duration_secs: None,
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => self.emit(&JsonEvent {
                event: "success",
                message,
                exit_code: None,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => self.emit_err(&JsonEvent {
                event: "error",
                message,
                exit_code: None,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a serializable value: pretty JSON in json mode, nothing otherwise.
    pub fn json<T: Serialize>(&self, value: &T) {
        if self.mode == OutputMode::Json
            && let Ok(json) = serde_json::to_string(value)
        {
            println!("{json}");
        }
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    fn emit(&self, event: &JsonEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }

    fn emit_err(&self, event: &JsonEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            eprintln!("{json}");
        }
    }
}

/// Remote output goes straight to the terminal in normal mode.
impl OutputSink for Output {
    fn chunk(&self, stream: OutputStream, data: &[u8]) {
        if self.mode != OutputMode::Normal {
            return;
        }
        match stream {
            OutputStream::Stdout => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(data);
                let _ = stdout.flush();
            }
            OutputStream::Stderr => {
                let _ = std::io::stderr().lock().write_all(data);
            }
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
