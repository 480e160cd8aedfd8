use crate::discovery::AuthConfig;
use crate::error::{AuthError, Result};
use crate::storage::{AuthConfigStore, RegistryAuth};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct ClientCredentialsToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth2 `client_credentials` grant: exchanges a client id/secret pair for
/// an access token, and separately persists raw credentials without
/// contacting the server.
pub struct ClientCredentialsAuthenticator {
    http: reqwest::Client,
    store: AuthConfigStore,
    timeout: Duration,
}

impl ClientCredentialsAuthenticator {
    pub fn new(http: reqwest::Client, store: AuthConfigStore, timeout: Duration) -> Self {
        Self {
            http,
            store,
            timeout,
        }
    }

    #[instrument(skip(self, client_secret))]
    pub async fn store(&self, host: &str, client_id: &str, client_secret: &str) -> Result<()> {
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(AuthError::credentials_required(
                "client id and client secret must both be non-empty",
            )
            .into());
        }
        self.store
            .save_registry_auth(
                host,
                RegistryAuth::client_credentials(client_id, client_secret),
            )
            .await
    }

    #[instrument(skip(self, client_secret))]
    pub async fn obtain_token(
        &self,
        auth_config: &AuthConfig,
        client_id: &str,
        client_secret: &str,
    ) -> Result<ClientCredentialsToken> {
        let token_url = auth_config.token_url()?;
        debug!(%token_url, "requesting client_credentials token");

        let response = self
            .http
            .post(token_url)
            .timeout(self.timeout)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| AuthError::authentication_failed(e.to_string()))?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::authentication_failed(e.to_string()))?;

        if let Some(error) = body.error {
            let detail = match body.error_description {
                Some(desc) => format!("{error}: {desc}"),
                None => error,
            };
            return Err(AuthError::authentication_failed(detail).into());
        }
        if body.access_token.is_empty() {
            return Err(AuthError::authentication_failed("empty access token in response").into());
        }

        Ok(ClientCredentialsToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expiry: body
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
    }
}
