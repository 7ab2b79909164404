// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP implementation of [`ConfigProvider`] for AppConfig Data style endpoints.
//!
//! Handles header construction, status classification, and the mapping of
//! session/poll responses onto [`PollResult`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{ConfigProvider, PollResult, ProviderError, SessionRequest, SessionToken};

/// Endpoint opening a configuration session.
const SESSION_ENDPOINT: &str = "/configurationsessions";
/// Endpoint returning the latest configuration for a token.
const CONFIGURATION_ENDPOINT: &str = "/configuration";
/// Query parameter carrying the continuation token.
const TOKEN_QUERY_PARAM: &str = "configuration_token";
/// Response header carrying the next continuation token.
const NEXT_TOKEN_HEADER: &str = "next-poll-configuration-token";
/// Response header carrying the server-directed poll interval.
const NEXT_INTERVAL_HEADER: &str = "next-poll-interval-in-seconds";

/// Credential material attached to every request.
#[derive(Debug, Clone, Default)]
pub struct Auth {
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer_token: Option<String>,
    /// Additional static headers (e.g. signing-proxy credentials).
    pub extra_headers: Vec<(String, String)>,
}

/// Options governing how the HTTP client is constructed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientOptions {
    /// Whether plaintext (HTTP) endpoints are allowed.
    pub allow_plaintext: bool,
    /// Whether TLS certificate validation should be skipped.
    pub accept_invalid_certs: bool,
    /// Per-request timeout; `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

/// HTTP-layer error taxonomy.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Credentials were rejected by the backend.
    #[error("unauthorized - credentials rejected by the configuration endpoint")]
    Unauthorized,
    /// Request failed due to proxy or malformed input (4xx excluding 401).
    #[error("proxy error or malformed request: status {0}")]
    Proxy(u16),
    /// Backend reported a temporary outage (5xx).
    #[error("transient backend error: status {0}")]
    Retryable(u16),
    /// The provided URL violates the required transport policy.
    #[error("insecure base url requires explicit opt-in: {0}")]
    InsecureUrl(String),
    /// A header name or value could not be encoded.
    #[error("invalid header {0}")]
    InvalidHeader(String),
    /// Transport-level issue (DNS, TLS, socket, etc.).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartSessionBody<'a> {
    application_identifier: &'a str,
    environment_identifier: &'a str,
    configuration_profile_identifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_minimum_poll_interval_in_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartSessionResponse {
    #[serde(default)]
    initial_configuration_token: Option<String>,
}

/// Provider backed by a reusable `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: String,
}

impl HttpProvider {
    /// Builds a provider for `base_url` with the supplied credentials.
    pub fn new(
        base_url: impl Into<String>,
        auth: &Auth,
        agent_version: &str,
        options: HttpClientOptions,
    ) -> Result<Self, HttpError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !options.allow_plaintext && base_url.starts_with("http://") {
            return Err(HttpError::InsecureUrl(base_url));
        }

        let mut headers = HeaderMap::new();
        let user_agent = format!("appconfig-client/{agent_version}");
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|_| HttpError::InvalidHeader(USER_AGENT.to_string()))?,
        );
        if let Some(token) = &auth.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HttpError::InvalidHeader(AUTHORIZATION.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        for (name, value) in &auth.extra_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }
        tracing::debug!(
            base_url = %base_url,
            headers = ?redact_headers(&headers),
            "appconfig HTTP provider configured"
        );

        let mut builder = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(options.accept_invalid_certs);
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, base_url })
    }

    /// Returns the base URL currently configured for the provider.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn open_session(&self, request: &SessionRequest) -> Result<Option<String>, HttpError> {
        let url = format!("{}{}", self.base_url, SESSION_ENDPOINT);
        let body = StartSessionBody {
            application_identifier: &request.identifiers.application_id,
            environment_identifier: &request.identifiers.environment_id,
            configuration_profile_identifier: &request.identifiers.profile_id,
            required_minimum_poll_interval_in_seconds: request
                .required_minimum_poll_interval
                .map(|interval| interval.as_secs()),
        };
        tracing::debug!(
            url = %url,
            application = %request.identifiers.application_id,
            environment = %request.identifiers.environment_id,
            profile = %request.identifiers.profile_id,
            "appconfig HTTP session request"
        );

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_bytes = response.bytes().await.unwrap_or_default();
            tracing::debug!(
                url = %url,
                status = %status,
                body = %String::from_utf8_lossy(&body_bytes),
                "appconfig HTTP session response"
            );
            return Err(classify_status(status));
        }

        let parsed: StartSessionResponse = response.json().await?;
        Ok(parsed.initial_configuration_token)
    }

    async fn fetch_configuration(&self, token: &SessionToken) -> Result<PollResult, HttpError> {
        let url = format!("{}{}", self.base_url, CONFIGURATION_ENDPOINT);
        let response = self
            .client
            .get(&url)
            .query(&[(TOKEN_QUERY_PARAM, token.as_str())])
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let content_type = header_string(&headers, CONTENT_TYPE.as_str());
        let next_token = header_string(&headers, NEXT_TOKEN_HEADER);
        let next_interval = header_string(&headers, NEXT_INTERVAL_HEADER)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let payload = if status.is_success() {
            response.bytes().await?.to_vec()
        } else {
            // The poll loop classifies the status; the body is only useful for diagnostics.
            let body_bytes = response.bytes().await.unwrap_or_default();
            tracing::debug!(
                url = %url,
                status = %status,
                body = %String::from_utf8_lossy(&body_bytes),
                "appconfig HTTP poll rejected"
            );
            Vec::new()
        };

        tracing::debug!(
            url = %url,
            status = %status,
            content_type = ?content_type,
            payload_len = payload.len(),
            next_interval = ?next_interval,
            has_next_token = next_token.is_some(),
            "appconfig HTTP poll response"
        );

        Ok(PollResult {
            status: status.as_u16(),
            content_type,
            payload,
            next_token,
            next_interval,
        })
    }
}

#[async_trait]
impl ConfigProvider for HttpProvider {
    async fn start_session(
        &self,
        request: &SessionRequest,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self.open_session(request).await?)
    }

    async fn poll(&self, token: &SessionToken) -> Result<PollResult, ProviderError> {
        Ok(self.fetch_configuration(token).await?)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Maps a non-success HTTP status onto the error taxonomy.
pub(crate) fn classify_status(status: StatusCode) -> HttpError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return HttpError::Unauthorized;
    }
    if status.is_server_error() {
        return HttpError::Retryable(status.as_u16());
    }
    HttpError::Proxy(status.as_u16())
}

/// Returns a redacted view of request headers suitable for debug logging.
pub(crate) fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "x-amz-security-token", "cookie"];

    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.as_str().to_ascii_lowercase();
            let display = if SENSITIVE_HEADERS.contains(&lower.as_str()) || value.is_sensitive() {
                "<redacted>".to_string()
            } else {
                value
                    .to_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| "<non-utf8>".to_string())
            };
            (lower, display)
        })
        .collect()
}
