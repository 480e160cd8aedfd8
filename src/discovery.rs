//! Fetches and parses the registry's service-discovery document.

use crate::error::{AuthError, Error, Result};
use crate::host::base_url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DISCOVERY_PATH: &str = "/.well-known/bluelink-services.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadAuthScheme {
    Bearer,
    Basic,
    Digest,
}

impl Default for DownloadAuthScheme {
    fn default() -> Self {
        DownloadAuthScheme::Bearer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    ClientCredentials,
    AuthorizationCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "apiKeyHeader", skip_serializing_if = "Option::is_none")]
    pub api_key_header: Option<String>,
    #[serde(rename = "downloadAuth", default)]
    pub download_auth: DownloadAuthScheme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(rename = "grantTypes", default)]
    pub grant_types: Vec<GrantType>,
    #[serde(rename = "authorizePath", default = "default_authorize_path")]
    pub authorize_path: String,
    #[serde(rename = "tokenPath", skip_serializing_if = "Option::is_none")]
    pub token_path: Option<String>,
    #[serde(default)]
    pub pkce: bool,
}

fn default_authorize_path() -> String {
    "/authorize".to_string()
}

impl AuthConfig {
    pub fn supports_api_key(&self) -> bool {
        self.api_key_header.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn supports_client_credentials(&self) -> bool {
        self.endpoint.is_some()
            && self.token_path.is_some()
            && self.grant_types.contains(&GrantType::ClientCredentials)
    }

    pub fn supports_authorization_code(&self) -> bool {
        self.endpoint.is_some()
            && self.token_path.is_some()
            && (self.grant_types.is_empty()
                || self.grant_types.contains(&GrantType::AuthorizationCode))
    }

    pub fn authorize_url(&self) -> Result<url::Url> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::config("auth endpoint not configured"))?;
        Ok(url::Url::parse(&format!("{endpoint}{}", self.authorize_path))?)
    }

    pub fn token_url(&self) -> Result<url::Url> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::config("auth endpoint not configured"))?;
        let token_path = self
            .token_path
            .as_deref()
            .ok_or_else(|| Error::config("token path not configured"))?;
        Ok(url::Url::parse(&format!("{endpoint}{token_path}"))?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub endpoint: String,
    #[serde(
        rename = "downloadAcceptContentType",
        default = "default_accept_content_type"
    )]
    pub download_accept_content_type: String,
}

fn default_accept_content_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(rename = "auth.v1", skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(rename = "provider.v1", skip_serializing_if = "Option::is_none")]
    pub provider: Option<ServiceEndpoint>,
    #[serde(rename = "transformer.v1", skip_serializing_if = "Option::is_none")]
    pub transformer: Option<ServiceEndpoint>,
}

/// Fetches and parses `/.well-known/bluelink-services.json`. One
/// `reqwest::Client` is shared across calls for connection pooling.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl DiscoveryClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn with_http_client(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    #[instrument(skip(self))]
    pub async fn discover(&self, host: &str) -> Result<DiscoveryDocument> {
        let url = format!("{}{}", base_url(host), DISCOVERY_PATH);
        debug!(%url, "fetching discovery document");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AuthError::ServiceDiscoveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::ServiceDiscoveryFailed(format!(
                "unexpected status {}",
                response.status()
            ))
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::ServiceDiscoveryFailed(e.to_string()))?;

        if body.trim().is_empty() {
            return Ok(DiscoveryDocument::default());
        }

        serde_json::from_str(&body)
            .map_err(|e| AuthError::ServiceDiscoveryFailed(format!("invalid JSON: {e}")).into())
    }

    #[instrument(skip(self))]
    pub async fn discover_auth(&self, host: &str) -> Result<AuthConfig> {
        self.discover(host)
            .await?
            .auth
            .ok_or(AuthError::NoAuthMethodsSupported.into())
    }
}
