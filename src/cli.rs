// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Deploy a source tree to a host over SSH and run it under systemd")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the config file (default: discover tandem.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new tandem.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Upload, provision, build, install services, restart, and health check
    Deploy {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,
    },

    /// Check the deployed artifacts and service state without changing anything
    Verify {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Remote file, relative to the remote root, to search for a marker
        #[arg(long, requires = "contains")]
        file: Option<String>,

        /// Text the remote file must contain
        #[arg(long, requires = "file")]
        contains: Option<String>,
    },

    /// Show recent journal output for one or all services
    Logs {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Service to show (default: all)
        service: Option<String>,

        /// Number of journal lines
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: u32,
    },

    /// Overwrite one remote file and read it back
    PushFile {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Local file to upload
        local: PathBuf,

        /// Destination, relative to the remote root
        remote: String,

        /// Text the uploaded file must contain
        #[arg(long)]
        expect: Option<String>,

        /// Rebuild and restart services afterwards
        #[arg(long)]
        rebuild: bool,
    },

    /// Run a command in the remote root
    Exec {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show the resolved configuration
    Status {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,
    },
}
