// ABOUTME: Service declarations as written in the config file.
// ABOUTME: Resolved into unit specs once the remote root and secrets are known.

use serde::Deserialize;

use super::deserialize::deserialize_service_name;
use super::env_value::EnvVars;
use super::restart_policy::RestartPolicy;
use crate::deploy::ServiceSpec;
use crate::error::Result;
use crate::remote::join_path;
use crate::types::ServiceName;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(deserialize_with = "deserialize_service_name")]
    pub name: ServiceName,
    #[serde(default)]
    pub description: Option<String>,
    /// Working directory relative to the remote root (absolute paths are kept).
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    /// Start command.
    pub exec: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default)]
    pub env: EnvVars,
}

fn default_working_dir() -> String {
    ".".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

impl ServiceConfig {
    /// Produce the unit spec with paths anchored at `remote_root` and env resolved.
    pub fn resolve(&self, remote_root: &str) -> Result<ServiceSpec> {
        Ok(ServiceSpec {
            name: self.name.clone(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| self.name.to_string()),
            user: self.user.clone(),
            working_dir: join_path(remote_root, &self.working_dir),
            exec: self.exec.clone(),
            restart: self.restart,
            env: self.env.resolve()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_anchors_working_dir() {
        let yaml = "name: kai-worker\nworking_dir: worker\nexec: /opt/app/worker/run\nenv:\n  RUST_LOG: info\n";
        let service: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        let spec = service.resolve("/opt/app").unwrap();
        assert_eq!(spec.working_dir, "/opt/app/worker");
        assert_eq!(spec.description, "kai-worker");
        assert_eq!(spec.user, "root");
        assert_eq!(spec.restart, RestartPolicy::Always);
        assert_eq!(spec.env, [("RUST_LOG".to_string(), "info".to_string())]);
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "name: web\nexec: npm start\nports: [80]\n";
        assert!(serde_yaml::from_str::<ServiceConfig>(yaml).is_err());
    }
}
