// ABOUTME: Environment variable value types with interpolation support.
// ABOUTME: Ordered service environments, literal-or-env values, and env-only secrets.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

/// A credential that may only come from the process environment.
///
/// Written as `{ env: VAR }`. A plain string is a parse error, so a
/// password can never sit in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretRef {
    env: String,
}

impl SecretRef {
    pub fn new(var: impl Into<String>) -> Self {
        Self { env: var.into() }
    }

    /// Name of the environment variable holding the secret.
    pub fn var(&self) -> &str {
        &self.env
    }

    pub fn resolve(&self) -> Result<String> {
        std::env::var(&self.env).map_err(|_| Error::MissingEnvVar(self.env.clone()))
    }
}

/// Service environment in document order. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars(Vec<(String, EnvValue)>);

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value of an existing key in place, or append a new one.
    pub fn set(&mut self, key: impl Into<String>, value: EnvValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve every value, keeping declaration order.
    pub fn resolve(&self) -> Result<Vec<(String, String)>> {
        self.0
            .iter()
            .map(|(k, v)| v.resolve().map(|resolved| (k.clone(), resolved)))
            .collect()
    }
}

fn valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl<'de> Deserialize<'de> for EnvVars {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EnvVarsVisitor;

        impl<'de> Visitor<'de> for EnvVarsVisitor {
            type Value = EnvVars;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of environment variable names to values")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<EnvVars, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut vars: Vec<(String, EnvValue)> = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, EnvValue>()? {
                    if !valid_key(&key) {
                        return Err(de::Error::custom(format!(
                            "invalid environment variable name `{}`",
                            key
                        )));
                    }
                    if vars.iter().any(|(k, _)| *k == key) {
                        return Err(de::Error::custom(format!(
                            "duplicate environment variable `{}`",
                            key
                        )));
                    }
                    vars.push((key, value));
                }
                Ok(EnvVars(vars))
            }
        }

        deserializer.deserialize_map(EnvVarsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order() {
        let vars: EnvVars = serde_yaml::from_str("ZED: z\nALPHA: a\nMID: m\n").unwrap();
        let keys: Vec<&str> = vars.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["ZED", "ALPHA", "MID"]);
    }

    #[test]
    fn rejects_duplicate_keys() {
        let result: std::result::Result<EnvVars, _> = serde_yaml::from_str("A: one\nA: two\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_invalid_names() {
        let result: std::result::Result<EnvVars, _> = serde_yaml::from_str("1BAD: x\n");
        assert!(result.is_err());
        let result: std::result::Result<EnvVars, _> = serde_yaml::from_str("HAS-DASH: x\n");
        assert!(result.is_err());
    }

    #[test]
    fn set_replaces_in_place_or_appends() {
        let mut vars: EnvVars = serde_yaml::from_str("A: one\nB: two\n").unwrap();
        vars.set("A", EnvValue::Literal("uno".to_string()));
        vars.set("C", EnvValue::Literal("three".to_string()));
        let resolved = vars.resolve().unwrap();
        assert_eq!(
            resolved,
            [
                ("A".to_string(), "uno".to_string()),
                ("B".to_string(), "two".to_string()),
                ("C".to_string(), "three".to_string()),
            ]
        );
    }

    #[test]
    fn env_reference_parses() {
        let vars: EnvVars =
            serde_yaml::from_str("KEY:\n  env: TANDEM_TEST_UNSET_KEY\n  default: fallback\n")
                .unwrap();
        assert_eq!(
            vars.get("KEY"),
            Some(&EnvValue::FromEnv {
                var: "TANDEM_TEST_UNSET_KEY".to_string(),
                default: Some("fallback".to_string()),
            })
        );
    }

    #[test]
    fn secret_rejects_literal_string() {
        let result: std::result::Result<SecretRef, _> = serde_yaml::from_str("hunter2");
        assert!(result.is_err());
    }

    #[test]
    fn secret_rejects_default() {
        let result: std::result::Result<SecretRef, _> =
            serde_yaml::from_str("env: PW\ndefault: hunter2\n");
        assert!(result.is_err());
    }
}
