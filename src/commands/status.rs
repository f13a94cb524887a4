// ABOUTME: Status command implementation.
// ABOUTME: Prints the resolved configuration without connecting.

use serde::Serialize;
use std::path::Path;
use tandem::config::Config;
use tandem::output::{Output, OutputMode};

#[derive(Serialize)]
struct StatusSummary<'a> {
    target: String,
    user: &'a str,
    source: String,
    remote_root: &'a str,
    services: Vec<&'a str>,
    builds: Vec<&'a str>,
    dependencies: Vec<&'a str>,
    proxy: Option<&'a str>,
    access_url: Option<String>,
}

pub fn status(config: &Config, base_dir: &Path, output: &Output) {
    let summary = StatusSummary {
        target: config.target.address(),
        user: &config.target.user,
        source: base_dir.join(&config.source).display().to_string(),
        remote_root: &config.remote_root,
        services: config.services.iter().map(|s| s.name.as_str()).collect(),
        builds: config.builds.iter().map(|b| b.name.as_str()).collect(),
        dependencies: config.dependencies.iter().map(|d| d.name.as_str()).collect(),
        proxy: config.proxy.as_ref().map(|p| p.name.as_str()),
        access_url: config.access_url(),
    };

    if output.mode() == OutputMode::Json {
        output.json(&summary);
        return;
    }

    println!("Target: {}@{}", summary.user, summary.target);
    println!("Source: {}", summary.source);
    println!("Remote root: {}", summary.remote_root);
    println!("Services: {}", summary.services.join(", "));
    if !summary.builds.is_empty() {
        println!("Builds: {}", summary.builds.join(", "));
    }
    if !summary.dependencies.is_empty() {
        println!("Dependencies: {}", summary.dependencies.join(", "));
    }
    if let Some(proxy) = summary.proxy {
        println!("Proxy: {}", proxy);
    }
    if let Some(url) = &summary.access_url {
        println!("Access URL: {}", url);
    }
}
