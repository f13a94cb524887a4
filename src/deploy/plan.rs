// ABOUTME: The resolved, immutable input to one deployment run.
// ABOUTME: Built once from configuration at run start and borrowed by every stage.

use std::path::PathBuf;

use crate::sync::ExclusionRules;
use crate::types::ServiceName;

use super::build::BuildStep;
use super::health::HealthPolicy;
use super::provision::Dependency;
use super::proxy::ProxyRoute;
use super::units::ServiceSpec;

/// Everything a run needs, with secrets already resolved.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    /// Local source tree to upload.
    pub local_root: PathBuf,
    /// Absolute application directory on the host.
    pub remote_root: String,
    pub exclude: ExclusionRules,
    pub dependencies: Vec<Dependency>,
    pub builds: Vec<BuildStep>,
    pub services: Vec<ServiceSpec>,
    pub proxy: Option<ProxyRoute>,
    pub health: HealthPolicy,
}

impl DeployPlan {
    pub fn service_names(&self) -> Vec<ServiceName> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }
}
