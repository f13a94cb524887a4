// ABOUTME: Entry point for the tandem CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use tandem::config::{self, Config};
use tandem::error::Result;
use tandem::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    if let Err(e) = run(cli, output).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { force } => {
            let path = config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", path.display()));
            Ok(())
        }
        Commands::Deploy { destination } => {
            let (base_dir, config) = load(cli.config, &cwd, destination.as_deref())?;
            commands::deploy(config, &base_dir, output).await
        }
        Commands::Verify {
            destination,
            file,
            contains,
        } => {
            let (_, config) = load(cli.config, &cwd, destination.as_deref())?;
            let marker = file.zip(contains);
            commands::verify(config, marker, output).await
        }
        Commands::Logs {
            destination,
            service,
            lines,
        } => {
            let (_, config) = load(cli.config, &cwd, destination.as_deref())?;
            commands::logs(config, service, lines, output).await
        }
        Commands::PushFile {
            destination,
            local,
            remote,
            expect,
            rebuild,
        } => {
            let (_, config) = load(cli.config, &cwd, destination.as_deref())?;
            let request = commands::PushRequest {
                local,
                remote,
                expect,
                rebuild,
            };
            commands::push_file(config, request, output).await
        }
        Commands::Exec {
            destination,
            command,
        } => {
            let (_, config) = load(cli.config, &cwd, destination.as_deref())?;
            commands::exec(config, command, output).await
        }
        Commands::Status { destination } => {
            let (base_dir, config) = load(cli.config, &cwd, destination.as_deref())?;
            commands::status(&config, &base_dir, &output);
            Ok(())
        }
    }
}

/// Load the config, apply the destination, and return the directory it lives in.
fn load(
    explicit: Option<PathBuf>,
    cwd: &Path,
    destination: Option<&str>,
) -> Result<(PathBuf, Config)> {
    let (path, config) = match explicit {
        Some(path) => {
            let config = Config::load(&path)?;
            (path, config)
        }
        None => Config::discover(cwd)?,
    };

    let config = match destination {
        Some(dest) => config.for_destination(dest)?,
        None => config,
    };

    Ok((config_dir(&path, cwd), config))
}

/// Directory relative `source` paths are anchored to.
fn config_dir(path: &Path, cwd: &Path) -> PathBuf {
    let dir = match path.parent() {
        Some(parent) if parent.ends_with(".tandem") => parent.parent().unwrap_or(parent),
        Some(parent) => parent,
        None => cwd,
    };
    if dir.as_os_str().is_empty() {
        cwd.to_path_buf()
    } else {
        cwd.join(dir)
    }
}
