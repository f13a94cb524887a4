// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles service names, service lists, and the short target form.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::service::ServiceConfig;
use super::target::TargetConfig;
use crate::types::ServiceName;

pub fn deserialize_service_name<'de, D>(deserializer: D) -> Result<ServiceName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ServiceName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_services<'de, D>(deserializer: D) -> Result<NonEmpty<ServiceConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let services: Vec<ServiceConfig> = Vec::deserialize(deserializer)?;
    for (i, service) in services.iter().enumerate() {
        if services[..i].iter().any(|s| s.name == service.name) {
            return Err(serde::de::Error::custom(format!(
                "duplicate service name: {}",
                service.name
            )));
        }
    }
    NonEmpty::from_vec(services)
        .ok_or_else(|| serde::de::Error::custom("at least one service is required"))
}

pub fn deserialize_target<'de, D>(deserializer: D) -> Result<TargetConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    TargetEntry::deserialize(deserializer)?
        .into_target_config()
        .map_err(serde::de::Error::custom)
}

pub fn deserialize_target_option<'de, D>(deserializer: D) -> Result<Option<TargetConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<TargetEntry> = Option::deserialize(deserializer)?;
    opt.map(TargetEntry::into_target_config)
        .transpose()
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetEntry {
    Simple(String),
    Detailed(TargetConfig),
}

impl TargetEntry {
    fn into_target_config(self) -> Result<TargetConfig, String> {
        match self {
            TargetEntry::Simple(s) => TargetConfig::parse(&s),
            TargetEntry::Detailed(c) => Ok(c),
        }
    }
}
