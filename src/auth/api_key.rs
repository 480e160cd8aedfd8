use crate::discovery::AuthConfig;
use crate::error::{AuthError, Error, Result};
use crate::host::base_url;
use crate::storage::{AuthConfigStore, RegistryAuth};
use tracing::{debug, instrument};

const DISCOVERY_PATH: &str = "/.well-known/bluelink-services.json";

/// Verifies a static API key by presenting it to the discovery endpoint,
/// then persists it on success.
pub struct ApiKeyAuthenticator {
    http: reqwest::Client,
    store: AuthConfigStore,
}

impl ApiKeyAuthenticator {
    pub fn new(http: reqwest::Client, store: AuthConfigStore) -> Self {
        Self { http, store }
    }

    #[instrument(skip(self, api_key))]
    pub async fn authenticate(
        &self,
        host: &str,
        auth_config: &AuthConfig,
        api_key: &str,
    ) -> Result<()> {
        if api_key.is_empty() {
            return Err(AuthError::credentials_required("API key must not be empty").into());
        }
        let header = auth_config
            .api_key_header
            .as_deref()
            .ok_or_else(|| AuthError::authentication_failed("API key header not configured"))?;

        let url = format!("{}{}", base_url(host), DISCOVERY_PATH);
        debug!(%url, "verifying API key");

        let response = self
            .http
            .get(&url)
            .header(header, api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::authentication_failed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            self.store
                .save_registry_auth(host, RegistryAuth::api_key(api_key))
                .await
                .map_err(|e| AuthError::ConfigSaveFailed(e.to_string()))?;
            return Ok(());
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AuthError::authentication_failed("invalid API key").into());
        }
        Err(AuthError::authentication_failed(format!("unexpected response status {status}")).into())
    }
}
