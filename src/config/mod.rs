// ABOUTME: Configuration types and parsing for tandem.yml.
// ABOUTME: Handles YAML parsing, validation, destination merging, and plan resolution.

mod deserialize;
mod env_value;
mod init;
mod restart_policy;
mod service;
mod target;

pub use env_value::{EnvValue, EnvVars, SecretRef};
pub use init::{TEMPLATE, init_config};
pub use restart_policy::RestartPolicy;
pub use service::ServiceConfig;
pub use target::TargetConfig;

use crate::deploy::{BuildStep, Dependency, DeployPlan, HealthPolicy, ProxyRoute};
use crate::error::{Error, Result};
use crate::remote::join_path;
use crate::sync::ExclusionRules;
use deserialize::{deserialize_services, deserialize_target, deserialize_target_option};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "tandem.yml";
pub const CONFIG_FILENAME_ALT: &str = "tandem.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".tandem/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_target")]
    pub target: TargetConfig,

    /// Absolute application directory on the host.
    pub remote_root: String,

    /// Local tree to upload, relative to the config file's directory.
    #[serde(default = "default_source")]
    pub source: PathBuf,

    #[serde(default)]
    pub exclude: ExclusionRules,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default)]
    pub builds: Vec<BuildStep>,

    #[serde(deserialize_with = "deserialize_services")]
    pub services: NonEmpty<ServiceConfig>,

    #[serde(default)]
    pub proxy: Option<ProxyRoute>,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub destinations: HashMap<String, Destination>,
}

fn default_source() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Destination {
    #[serde(default, deserialize_with = "deserialize_target_option")]
    pub target: Option<TargetConfig>,

    #[serde(default)]
    pub remote_root: Option<String>,

    /// Set on every service, replacing values of the same name.
    #[serde(default)]
    pub env: EnvVars,

    #[serde(default)]
    pub proxy: Option<ProxyRoute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Port the web app listens on once restarted.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_health_attempts")]
    pub attempts: u32,
    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: None,
            attempts: default_health_attempts(),
            interval: default_health_interval(),
        }
    }
}

fn default_health_attempts() -> u32 {
    5
}

fn default_health_interval() -> Duration {
    Duration::from_secs(3)
}

/// Artifacts `tandem verify` looks for, relative to the remote root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfig {
    #[serde(default)]
    pub build_output: Option<String>,
    #[serde(default)]
    pub env_file: Option<String>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find the config file in `dir`. Returns the path alongside the config.
    pub fn discover(dir: &Path) -> Result<(PathBuf, Self)> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in candidates {
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((path, config));
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn validate(&self) -> Result<()> {
        validate_remote_root(&self.remote_root)?;
        for step in &self.builds {
            step.validate()
                .map_err(|e| Error::InvalidConfig(format!("build '{}': {}", step.name, e)))?;
        }
        for dep in &self.dependencies {
            if dep.install.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "dependency '{}' has no install steps",
                    dep.name
                )));
            }
        }
        if let Some(proxy) = &self.proxy {
            proxy.validate().map_err(Error::InvalidConfig)?;
        }
        if self.health.attempts == 0 {
            return Err(Error::InvalidConfig(
                "health.attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn for_destination(&self, name: &str) -> Result<Config> {
        let dest = self
            .destinations
            .get(name)
            .ok_or_else(|| Error::UnknownDestination(name.to_string()))?;

        let mut merged = self.clone();

        if let Some(target) = &dest.target {
            merged.target = target.clone();
        }

        if let Some(remote_root) = &dest.remote_root {
            merged.remote_root = remote_root.clone();
        }

        for service in merged.services.iter_mut() {
            for (key, value) in dest.env.iter() {
                service.env.set(key, value.clone());
            }
        }

        if dest.proxy.is_some() {
            merged.proxy = dest.proxy.clone();
        }

        merged.validate()?;
        Ok(merged)
    }

    /// Resolve into a run plan. Reads service secrets from the environment.
    pub fn plan(&self, base_dir: &Path) -> Result<DeployPlan> {
        let services = self
            .services
            .iter()
            .map(|service| service.resolve(&self.remote_root))
            .collect::<Result<Vec<_>>>()?;

        Ok(DeployPlan {
            local_root: base_dir.join(&self.source),
            remote_root: self.remote_root.clone(),
            exclude: self.exclude.clone(),
            dependencies: self.dependencies.clone(),
            builds: self.builds.clone(),
            services,
            proxy: self.proxy.clone(),
            health: HealthPolicy {
                port: self.health.port,
                attempts: self.health.attempts,
                interval: self.health.interval,
            },
        })
    }

    /// A path under the remote root.
    pub fn remote_path(&self, relative: &str) -> String {
        join_path(&self.remote_root, relative)
    }

    /// Where the deployed app can be reached, if anything is exposed.
    pub fn access_url(&self) -> Option<String> {
        match (&self.proxy, self.health.port) {
            (Some(proxy), _) if proxy.listen == 80 => Some(format!("http://{}", self.target.host)),
            (Some(proxy), _) => Some(format!("http://{}:{}", self.target.host, proxy.listen)),
            (None, Some(port)) => Some(format!("http://{}:{}", self.target.host, port)),
            (None, None) => None,
        }
    }
}

fn validate_remote_root(root: &str) -> Result<()> {
    if !root.starts_with('/') {
        return Err(Error::InvalidConfig(format!(
            "remote_root must be an absolute path, got '{}'",
            root
        )));
    }
    if root.trim_end_matches('/').is_empty() {
        return Err(Error::InvalidConfig(
            "remote_root cannot be the filesystem root".to_string(),
        ));
    }
    if root.split('/').any(|segment| segment == "..") {
        return Err(Error::InvalidConfig(
            "remote_root cannot contain '..'".to_string(),
        ));
    }
    Ok(())
}
