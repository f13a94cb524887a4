// ABOUTME: Validated systemd service name.
// ABOUTME: Keeps names safe to splice into unit file paths and systemctl invocations.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceNameError {
    #[error("service name cannot be empty")]
    Empty,

    #[error("service name exceeds maximum length of 64 characters")]
    TooLong,

    #[error("service name cannot start with a hyphen or dot")]
    BadStart,

    #[error("service name must not end in .service (the suffix is added automatically)")]
    HasSuffix,

    #[error("invalid character in service name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(value: &str) -> Result<Self, ServiceNameError> {
        if value.is_empty() {
            return Err(ServiceNameError::Empty);
        }

        if value.len() > 64 {
            return Err(ServiceNameError::TooLong);
        }

        if value.starts_with('-') || value.starts_with('.') {
            return Err(ServiceNameError::BadStart);
        }

        if value.ends_with(".service") {
            return Err(ServiceNameError::HasSuffix);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.') {
                return Err(ServiceNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unit name as systemd knows it.
    pub fn unit(&self) -> String {
        format!("{}.service", self.0)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["kai-chat-web", "worker_1", "api.v2", "Web"] {
            assert!(ServiceName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_path_separators() {
        assert!(matches!(
            ServiceName::new("../etc/passwd"),
            Err(ServiceNameError::BadStart)
        ));
        assert!(matches!(
            ServiceName::new("a/b"),
            Err(ServiceNameError::InvalidChar('/'))
        ));
    }

    #[test]
    fn rejects_explicit_suffix() {
        assert!(matches!(
            ServiceName::new("web.service"),
            Err(ServiceNameError::HasSuffix)
        ));
    }

    #[test]
    fn rejects_empty_and_long() {
        assert!(matches!(ServiceName::new(""), Err(ServiceNameError::Empty)));
        assert!(matches!(
            ServiceName::new(&"a".repeat(65)),
            Err(ServiceNameError::TooLong)
        ));
    }

    #[test]
    fn unit_appends_suffix() {
        let name = ServiceName::new("kai-chat-web").unwrap();
        assert_eq!(name.unit(), "kai-chat-web.service");
    }
}
