//! OpenStack credentials from an openrc file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read openrc {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("openrc is missing {0}")]
    Missing(&'static str),
}

/// Explicit credentials handed to a cloud client by value.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudCredentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    pub region_name: Option<String>,
    pub user_domain_name: Option<String>,
    pub project_domain_name: Option<String>,
    pub interface: Option<String>,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project_name", &self.project_name)
            .field("region_name", &self.region_name)
            .field("user_domain_name", &self.user_domain_name)
            .field("project_domain_name", &self.project_domain_name)
            .field("interface", &self.interface)
            .finish()
    }
}

impl CloudCredentials {
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse `export KEY=VALUE` assignments. Anything else is ignored.
    pub fn parse(content: &str) -> Result<Self, CredentialsError> {
        let vars = parse_assignments(content);
        let required = |key: &'static str| {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(CredentialsError::Missing(key))
        };
        let optional = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            auth_url: required("OS_AUTH_URL")?,
            username: required("OS_USERNAME")?,
            password: required("OS_PASSWORD")?,
            project_name: required("OS_PROJECT_NAME")?,
            region_name: optional("OS_REGION_NAME"),
            user_domain_name: optional("OS_USER_DOMAIN_NAME"),
            project_domain_name: optional("OS_PROJECT_DOMAIN_NAME"),
            interface: optional("OS_INTERFACE"),
        })
    }
}

fn parse_assignments(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    vars
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENRC: &str = r#"#!/usr/bin/env bash
# generated by the dashboard
export OS_AUTH_URL=https://keystone.example.net:5000/v3
export OS_PROJECT_NAME="lab-project"
export OS_USER_DOMAIN_NAME='Default'
export OS_USERNAME=student
echo "Please enter your password: "
export OS_PASSWORD="s3cret=value"
export OS_REGION_NAME=""
OS_INTERFACE=public
"#;

    #[test]
    fn test_parse_openrc() {
        let creds = CloudCredentials::parse(OPENRC).unwrap();
        assert_eq!(creds.auth_url, "https://keystone.example.net:5000/v3");
        assert_eq!(creds.project_name, "lab-project");
        assert_eq!(creds.password, "s3cret=value");
        assert_eq!(creds.user_domain_name.as_deref(), Some("Default"));
        assert_eq!(creds.region_name, None);
        assert_eq!(creds.interface.as_deref(), Some("public"));
    }

    #[test]
    fn test_missing_required_key() {
        let err = CloudCredentials::parse("export OS_AUTH_URL=x\nexport OS_USERNAME=y\n").unwrap_err();
        assert!(matches!(err, CredentialsError::Missing("OS_PASSWORD")));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = CloudCredentials::parse(OPENRC).unwrap();
        let printed = format!("{creds:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("s3cret"));
    }
}
