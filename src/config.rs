//! Provider configuration.
//!
//! The provider block accepts the Jenkins server location and credentials.
//! Every attribute can be omitted from configuration and supplied through the
//! environment instead:
//!
//! | Attribute         | Environment variable |
//! |-------------------|----------------------|
//! | `server_url`      | `JENKINS_URL`        |
//! | `username`        | `JENKINS_USERNAME`   |
//! | `password`        | `JENKINS_PASSWORD`   |
//!
//! Explicit configuration always wins over the environment.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::ProviderError;

/// Environment variable holding the server URL.
pub const ENV_SERVER_URL: &str = "JENKINS_URL";
/// Environment variable holding the username.
pub const ENV_USERNAME: &str = "JENKINS_USERNAME";
/// Environment variable holding the password or API token.
pub const ENV_PASSWORD: &str = "JENKINS_PASSWORD";

/// Request timeout used when `timeout_seconds` is not configured.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Resolved configuration for talking to a Jenkins server.
#[derive(Debug, Clone)]
pub struct JenkinsConfig {
    /// Base URL of the Jenkins server, e.g. `https://ci.example.com/`.
    pub server_url: Url,
    /// Username for HTTP basic authentication.
    pub username: Option<String>,
    /// Password or API token for HTTP basic authentication.
    pub password: Option<SecretString>,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    server_url: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

impl JenkinsConfig {
    /// Decode the provider configuration, falling back to the process
    /// environment for unset attributes.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Decode the provider configuration with a custom environment lookup.
    pub fn from_value_with_env<F>(value: serde_json::Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = if value.is_null() {
            RawConfig::default()
        } else {
            serde_json::from_value(value)
                .map_err(|e| ProviderError::Configuration(e.to_string()))?
        };

        let server_url = non_empty(raw.server_url)
            .or_else(|| non_empty(env(ENV_SERVER_URL)))
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "server_url is required (or set {})",
                    ENV_SERVER_URL
                ))
            })?;
        let server_url = parse_server_url(&server_url)?;

        let username = non_empty(raw.username).or_else(|| non_empty(env(ENV_USERNAME)));
        let password = non_empty(raw.password).or_else(|| non_empty(env(ENV_PASSWORD)));

        if username.is_none() && password.is_some() {
            return Err(ProviderError::Configuration(
                "password is set but username is not".to_string(),
            ));
        }

        let timeout_seconds = raw.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if timeout_seconds == 0 {
            return Err(ProviderError::Configuration(
                "timeout_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server_url,
            username,
            password: password.map(SecretString::from),
            timeout: Duration::from_secs(timeout_seconds),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_server_url(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw)
        .map_err(|e| ProviderError::Configuration(format!("invalid server_url '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProviderError::Configuration(format!(
            "invalid server_url '{}': unsupported scheme '{}'",
            raw, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_explicit_config() {
        let config = JenkinsConfig::from_value_with_env(
            json!({
                "server_url": "https://ci.example.com/",
                "username": "admin",
                "password": "token",
                "timeout_seconds": 5
            }),
            no_env,
        )
        .unwrap();

        assert_eq!(config.server_url.as_str(), "https://ci.example.com/");
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.password.unwrap().expose_secret(), "token");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_environment_fallback() {
        let env = |key: &str| match key {
            ENV_SERVER_URL => Some("http://jenkins:8080".to_string()),
            ENV_USERNAME => Some("bot".to_string()),
            ENV_PASSWORD => Some("secret".to_string()),
            _ => None,
        };

        let config = JenkinsConfig::from_value_with_env(json!({}), env).unwrap();
        assert_eq!(config.server_url.as_str(), "http://jenkins:8080/");
        assert_eq!(config.username.as_deref(), Some("bot"));
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
    }

    #[test]
    fn test_explicit_value_wins_over_environment() {
        let env = |key: &str| (key == ENV_SERVER_URL).then(|| "http://from-env".to_string());
        let config =
            JenkinsConfig::from_value_with_env(json!({"server_url": "http://explicit"}), env)
                .unwrap();
        assert_eq!(config.server_url.host_str(), Some("explicit"));
    }

    #[test]
    fn test_null_config_uses_environment() {
        let env = |key: &str| (key == ENV_SERVER_URL).then(|| "http://jenkins".to_string());
        let config = JenkinsConfig::from_value_with_env(serde_json::Value::Null, env).unwrap();
        assert!(config.username.is_none());
        assert!(config.password.is_none());
    }

    #[test]
    fn test_missing_server_url() {
        let err = JenkinsConfig::from_value_with_env(json!({}), no_env).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("server_url is required"));
    }

    #[test]
    fn test_invalid_server_url() {
        let err = JenkinsConfig::from_value_with_env(json!({"server_url": "not a url"}), no_env)
            .unwrap_err();
        assert!(err.to_string().contains("invalid server_url"));

        let err = JenkinsConfig::from_value_with_env(json!({"server_url": "ftp://host"}), no_env)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_password_requires_username() {
        let err = JenkinsConfig::from_value_with_env(
            json!({"server_url": "http://jenkins", "password": "token"}),
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let err = JenkinsConfig::from_value_with_env(
            json!({"server_url": "http://jenkins", "insecure": true}),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = JenkinsConfig::from_value_with_env(
            json!({"server_url": "http://jenkins", "timeout_seconds": 0}),
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }
}
