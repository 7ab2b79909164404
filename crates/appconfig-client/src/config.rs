// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven helpers for bootstrapping the configuration client.
//!
//! Derives identifiers, endpoint, credentials, and poll cadence from the host
//! process environment while remaining embedder-agnostic: hosts may build
//! [`AppConfigEnv`] from any key/value iterator and adjust it before
//! constructing the provider and service.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::http::{Auth, HttpClientOptions};
use crate::provider::ConfigIdentifiers;
use crate::service::ServiceConfig;

/// Toggles the client entirely.
const ENV_ENABLED: &str = "APPCONFIG_ENABLED";
/// Application identifier.
pub const ENV_APPLICATION_ID: &str = "APPCONFIG_APPLICATION_ID";
/// Environment identifier.
pub const ENV_ENVIRONMENT_ID: &str = "APPCONFIG_ENVIRONMENT_ID";
/// Configuration profile identifier.
pub const ENV_PROFILE_ID: &str = "APPCONFIG_PROFILE_ID";
/// Explicit endpoint overriding the regional default.
const ENV_ENDPOINT: &str = "APPCONFIG_ENDPOINT";
/// Region used to derive the default endpoint.
const ENV_REGION: &str = "AWS_REGION";
/// Bearer token attached to every request.
const ENV_AUTH_TOKEN: &str = "APPCONFIG_AUTH_TOKEN";
/// Fallback poll interval (seconds) when the server does not provide one.
const ENV_POLL_INTERVAL: &str = "APPCONFIG_POLL_INTERVAL_SECONDS";
/// Minimum poll interval (seconds) advertised when opening the session.
const ENV_MIN_POLL_INTERVAL: &str = "APPCONFIG_MIN_POLL_INTERVAL_SECONDS";
/// Allows `http://` endpoints.
const ENV_ALLOW_PLAINTEXT: &str = "APPCONFIG_ALLOW_PLAINTEXT";
/// Disables TLS certificate validation.
const ENV_NO_TLS_VALIDATION: &str = "APPCONFIG_NO_TLS_VALIDATION";

/// Region used when none is supplied.
const DEFAULT_REGION: &str = "us-east-1";

/// Missing or invalid environment settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
}

/// Environment-derived options used to bootstrap the client.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfigEnv {
    /// Whether the client is enabled. Defaults to `true`.
    pub enabled: bool,
    pub application_id: Option<String>,
    pub environment_id: Option<String>,
    pub profile_id: Option<String>,
    /// Explicit endpoint; when absent the regional endpoint is used.
    pub endpoint: Option<String>,
    /// Region used to derive the default endpoint.
    pub region: String,
    pub auth_token: Option<String>,
    /// Fallback poll interval when the server does not provide one.
    pub poll_interval: Option<Duration>,
    /// Minimum poll interval advertised when opening the session.
    pub min_poll_interval: Option<Duration>,
    pub allow_plaintext: bool,
    pub no_tls_validation: bool,
}

impl AppConfigEnv {
    /// Builds settings from the current process environment.
    pub fn from_os_env() -> Self {
        Self::from_env_iter(env::vars())
    }

    /// Builds settings from an iterator of key/value pairs (typically for tests).
    pub fn from_env_iter<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| map.get(key).and_then(|value| sanitize_non_empty(value));

        Self {
            enabled: parse_bool(map.get(ENV_ENABLED).map(String::as_str), true),
            application_id: get(ENV_APPLICATION_ID),
            environment_id: get(ENV_ENVIRONMENT_ID),
            profile_id: get(ENV_PROFILE_ID),
            endpoint: get(ENV_ENDPOINT),
            region: get(ENV_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            auth_token: get(ENV_AUTH_TOKEN),
            poll_interval: parse_seconds(map.get(ENV_POLL_INTERVAL).map(String::as_str)),
            min_poll_interval: parse_seconds(map.get(ENV_MIN_POLL_INTERVAL).map(String::as_str)),
            allow_plaintext: parse_bool(map.get(ENV_ALLOW_PLAINTEXT).map(String::as_str), false),
            no_tls_validation: parse_bool(
                map.get(ENV_NO_TLS_VALIDATION).map(String::as_str),
                false,
            ),
        }
    }

    /// Returns the configured endpoint or the regional AppConfig Data endpoint.
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://appconfigdata.{}.amazonaws.com", self.region),
        }
    }

    /// Returns the profile identifiers, failing on the first missing one.
    pub fn identifiers(&self) -> Result<ConfigIdentifiers, EnvError> {
        let application_id = self
            .application_id
            .clone()
            .ok_or(EnvError::Missing(ENV_APPLICATION_ID))?;
        let environment_id = self
            .environment_id
            .clone()
            .ok_or(EnvError::Missing(ENV_ENVIRONMENT_ID))?;
        let profile_id = self
            .profile_id
            .clone()
            .ok_or(EnvError::Missing(ENV_PROFILE_ID))?;
        Ok(ConfigIdentifiers {
            application_id,
            environment_id,
            profile_id,
        })
    }

    pub fn to_auth(&self) -> Auth {
        Auth {
            bearer_token: self.auth_token.clone(),
            extra_headers: Vec::new(),
        }
    }

    pub fn http_options(&self) -> HttpClientOptions {
        HttpClientOptions {
            allow_plaintext: self.allow_plaintext,
            accept_invalid_certs: self.no_tls_validation,
            request_timeout: None,
        }
    }

    /// Applies the environment overrides on top of the default service config.
    pub fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        if let Some(interval) = self.poll_interval {
            config.default_poll_interval = interval;
        }
        config.required_minimum_poll_interval = self.min_poll_interval;
        config
    }
}

/// Helper trimming whitespace and discarding empty values.
fn sanitize_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses boolean values from strings, falling back to the provided default.
fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(|s| s.trim().to_ascii_lowercase()) {
        Some(ref v) if ["1", "true", "t", "yes", "y"].contains(&v.as_str()) => true,
        Some(ref v) if ["0", "false", "f", "no", "n"].contains(&v.as_str()) => false,
        _ => default,
    }
}

/// Parses a whole number of seconds; blank or malformed input yields `None`.
fn parse_seconds(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appconfig_env_defaults() {
        let env = AppConfigEnv::from_env_iter::<Vec<(String, String)>, _, _>(vec![]);
        assert!(env.enabled);
        assert_eq!(env.region, DEFAULT_REGION);
        assert_eq!(
            env.base_url(),
            "https://appconfigdata.us-east-1.amazonaws.com"
        );
        assert!(!env.allow_plaintext);
        assert!(!env.no_tls_validation);
        assert!(env.auth_token.is_none());
        assert_eq!(env.identifiers(), Err(EnvError::Missing(ENV_APPLICATION_ID)));
    }

    #[test]
    fn parse_bool_permits_common_variants() {
        assert!(parse_bool(Some("true"), false));
        assert!(parse_bool(Some("Yes"), false));
        assert!(parse_bool(Some("1"), false));
        assert!(!parse_bool(Some("false"), true));
        assert!(!parse_bool(Some("0"), true));
        assert!(parse_bool(Some("maybe"), true));
    }

    #[test]
    fn appconfig_env_honours_overrides() {
        let env = AppConfigEnv::from_env_iter([
            (ENV_ENABLED, "no"),
            (ENV_APPLICATION_ID, " app "),
            (ENV_ENVIRONMENT_ID, "prod"),
            (ENV_PROFILE_ID, "flags"),
            (ENV_ENDPOINT, "http://localhost:4566/"),
            (ENV_REGION, "eu-west-1"),
            (ENV_AUTH_TOKEN, "secret"),
            (ENV_POLL_INTERVAL, "45"),
            (ENV_MIN_POLL_INTERVAL, "15"),
            (ENV_ALLOW_PLAINTEXT, "1"),
            (ENV_NO_TLS_VALIDATION, "true"),
        ]);
        assert!(!env.enabled);
        assert_eq!(env.base_url(), "http://localhost:4566");
        assert_eq!(
            env.identifiers(),
            Ok(ConfigIdentifiers::new("app", "prod", "flags"))
        );
        assert_eq!(env.to_auth().bearer_token.as_deref(), Some("secret"));
        let options = env.http_options();
        assert!(options.allow_plaintext);
        assert!(options.accept_invalid_certs);

        let config = env.service_config();
        assert_eq!(config.default_poll_interval, Duration::from_secs(45));
        assert_eq!(
            config.required_minimum_poll_interval,
            Some(Duration::from_secs(15))
        );
    }

    #[test]
    fn region_drives_default_endpoint() {
        let env = AppConfigEnv::from_env_iter([(ENV_REGION, "ap-southeast-2")]);
        assert_eq!(
            env.base_url(),
            "https://appconfigdata.ap-southeast-2.amazonaws.com"
        );
    }

    #[test]
    fn identifiers_report_first_missing_variable() {
        let env = AppConfigEnv::from_env_iter([(ENV_APPLICATION_ID, "app"), (ENV_PROFILE_ID, "p")]);
        assert_eq!(env.identifiers(), Err(EnvError::Missing(ENV_ENVIRONMENT_ID)));
    }

    #[test]
    fn malformed_intervals_are_ignored() {
        let env = AppConfigEnv::from_env_iter([(ENV_POLL_INTERVAL, "soon")]);
        assert!(env.poll_interval.is_none());
        assert_eq!(env.service_config().default_poll_interval, Duration::from_secs(60));
    }
}
