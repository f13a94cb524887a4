// ABOUTME: nginx reverse-proxy site rendering and activation.
// ABOUTME: Writes the site, links it into sites-enabled, validates, and only then reloads.

use serde::Deserialize;
use std::fmt::Write as _;

use crate::remote::{Remote, shell_quote};

use super::error::DeployError;
use super::runner::CommandRunner;

pub const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

const VALIDATE_COMMAND: &str = "nginx -t";
const RELOAD_COMMAND: &str = "systemctl reload-or-restart nginx";

/// A public port forwarded to the web front end.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyRoute {
    /// Site file name.
    pub name: String,
    /// Port nginx listens on.
    pub listen: u16,
    /// Local port the web app serves on.
    pub upstream: u16,
    /// Pass `Upgrade`/`Connection` headers for WebSockets.
    #[serde(default = "default_websocket")]
    pub websocket: bool,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Remove nginx's stock `default` site from sites-enabled.
    #[serde(default)]
    pub disable_default: bool,
}

fn default_websocket() -> bool {
    true
}

fn default_server_name() -> String {
    "_".to_string()
}

impl ProxyRoute {
    pub fn new(name: impl Into<String>, listen: u16, upstream: u16) -> Self {
        Self {
            name: name.into(),
            listen,
            upstream,
            websocket: true,
            server_name: default_server_name(),
            disable_default: false,
        }
    }

    pub fn available_path(&self) -> String {
        format!("{}/{}", SITES_AVAILABLE, self.name)
    }

    pub fn enabled_path(&self) -> String {
        format!("{}/{}", SITES_ENABLED, self.name)
    }

    /// Where the replaced site is kept until the new one passes `nginx -t`.
    /// Outside sites-enabled, so nginx never loads it.
    pub fn previous_path(&self) -> String {
        format!("{}/{}.previous", SITES_AVAILABLE, self.name)
    }

    pub fn validate(&self) -> Result<(), String> {
        let valid_name = !self.name.is_empty()
            && !self.name.starts_with('.')
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid_name {
            return Err(format!("invalid proxy site name '{}'", self.name));
        }
        if self.listen == 0 || self.upstream == 0 {
            return Err("proxy ports must be nonzero".to_string());
        }
        Ok(())
    }

    /// Render the nginx server block.
    pub fn render(&self) -> String {
        let mut site = String::new();
        let _ = writeln!(site, "server {{");
        let _ = writeln!(site, "    listen {};", self.listen);
        let _ = writeln!(site, "    server_name {};", self.server_name);
        let _ = writeln!(site);
        let _ = writeln!(site, "    location / {{");
        let _ = writeln!(site, "        proxy_pass http://127.0.0.1:{};", self.upstream);
        let _ = writeln!(site, "        proxy_http_version 1.1;");
        if self.websocket {
            let _ = writeln!(site, "        proxy_set_header Upgrade $http_upgrade;");
            let _ = writeln!(site, "        proxy_set_header Connection \"upgrade\";");
            let _ = writeln!(site, "        proxy_cache_bypass $http_upgrade;");
        }
        let _ = writeln!(site, "        proxy_set_header Host $host;");
        let _ = writeln!(site, "        proxy_set_header X-Real-IP $remote_addr;");
        let _ = writeln!(
            site,
            "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"
        );
        let _ = writeln!(site, "        proxy_set_header X-Forwarded-Proto $scheme;");
        let _ = writeln!(site, "    }}");
        let _ = writeln!(site, "}}");
        site
    }
}

/// Install and activate a proxy route.
///
/// The syntax check runs before the reload. If it fails, the site file and
/// link are put back the way they were, so the rejected config is never
/// picked up by a later reload, and a validation error is returned.
pub async fn install_route<R: Remote + ?Sized>(
    runner: &mut CommandRunner<'_, R>,
    route: &ProxyRoute,
) -> Result<(), DeployError> {
    let available = route.available_path();
    let enabled = route.enabled_path();

    let linked = runner.run(&link_check_command(route)).await?;
    let was_linked = linked.stdout.trim() == "linked";
    runner.run(&snapshot_command(route)).await?;

    runner
        .write_file(&available, route.render().as_bytes())
        .await?;
    runner
        .run(&format!(
            "ln -sfn {} {}",
            shell_quote(&available),
            shell_quote(&enabled)
        ))
        .await?;
    if route.disable_default {
        runner
            .run(&format!("rm -f {}/default", SITES_ENABLED))
            .await?;
    }

    let check = runner.run_tolerant(VALIDATE_COMMAND).await?;
    if !check.success() {
        runner.run(&restore_command(route)).await?;
        if !was_linked {
            runner
                .run(&format!("rm -f {}", shell_quote(&enabled)))
                .await?;
        }
        return Err(DeployError::Validation {
            command: VALIDATE_COMMAND.to_string(),
            output: check.stderr.trim().to_string(),
        });
    }

    runner
        .run(&format!("rm -f {}", shell_quote(&route.previous_path())))
        .await?;
    runner.run(RELOAD_COMMAND).await?;
    Ok(())
}

/// Prints `linked` when the site is already enabled.
fn link_check_command(route: &ProxyRoute) -> String {
    format!(
        "test -L {} && echo linked || true",
        shell_quote(&route.enabled_path())
    )
}

/// Copy the current site file aside, if there is one.
fn snapshot_command(route: &ProxyRoute) -> String {
    let available = shell_quote(&route.available_path());
    let previous = shell_quote(&route.previous_path());
    format!("rm -f {previous} && if [ -e {available} ]; then cp -f {available} {previous}; fi")
}

/// Put the copied site file back, or remove the new one if there was none.
fn restore_command(route: &ProxyRoute) -> String {
    let available = shell_quote(&route.available_path());
    let previous = shell_quote(&route.previous_path());
    format!("if [ -e {previous} ]; then mv -f {previous} {available}; else rm -f {available}; fi")
}
