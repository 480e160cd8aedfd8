use super::models::{PackageMetadata, VersionList};
use crate::auth::{refresh_tokens, ClientCredentialsAuthenticator};
use crate::config::ClientConfig;
use crate::discovery::{AuthConfig, DiscoveryClient, DiscoveryDocument, DownloadAuthScheme, ServiceEndpoint};
use crate::error::{AuthError, Error, Result};
use crate::host::base_url;
use crate::storage::{AuthConfigStore, TokenStore};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Invoked once with `(0, total)` and then after every chunk written.
/// `total` is `-1` when the server did not report `Content-Length`.
pub type ProgressFn<'a> = Box<dyn FnMut(u64, i64) + Send + 'a>;

/// Authenticated request pipeline for the registry's plugin service:
/// listing versions, fetching package metadata, and streaming downloads.
/// Every call resolves the auth header fresh via the fallback chain in
/// [`RegistryClient::resolve_token`] before issuing the request.
pub struct RegistryClient {
    http: reqwest::Client,
    discovery: DiscoveryClient,
    auth_store: AuthConfigStore,
    token_store: TokenStore,
    client_credentials: ClientCredentialsAuthenticator,
    config: ClientConfig,
}

impl RegistryClient {
    pub fn new(config: ClientConfig) -> Self {
        let http = reqwest::Client::new();
        Self {
            http: http.clone(),
            discovery: DiscoveryClient::with_http_client(http.clone(), config.discovery_timeout),
            auth_store: AuthConfigStore::new(config.auth_config_path.clone()),
            token_store: TokenStore::new(config.tokens_path.clone()),
            client_credentials: ClientCredentialsAuthenticator::new(
                http,
                AuthConfigStore::new(config.auth_config_path.clone()),
                config.token_exchange_timeout,
            ),
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_versions(&self, host: &str, namespace: &str, plugin: &str) -> Result<VersionList> {
        let doc = self.discovery.discover(host).await?;
        let service = Self::resolve_service_endpoint(&doc)?;
        let url = format!(
            "{}{}/{namespace}/{plugin}/versions",
            base_url(host),
            service.endpoint
        );

        let request = self.authed_request(&url, host, doc.auth.as_ref()).await?;
        let response = request.send().await?;

        match response.status().as_u16() {
            200 => Ok(response.json().await?),
            404 => Err(AuthError::PluginNotFound.into()),
            401 | 403 => Err(AuthError::NoCredentials.into()),
            status => Err(Error::api(status, "unexpected status listing versions", None)),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_package_metadata(
        &self,
        host: &str,
        namespace: &str,
        plugin: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> Result<PackageMetadata> {
        let doc = self.discovery.discover(host).await?;
        let service = Self::resolve_service_endpoint(&doc)?;
        let url = format!(
            "{}{}/{namespace}/{plugin}/{version}/package/{os}/{arch}",
            base_url(host),
            service.endpoint
        );

        let request = self.authed_request(&url, host, doc.auth.as_ref()).await?;
        let response = request.send().await?;

        match response.status().as_u16() {
            200 => Ok(response.json().await?),
            404 => Err(AuthError::VersionNotFound.into()),
            401 | 403 => Err(AuthError::NoCredentials.into()),
            status => Err(Error::api(status, "unexpected status fetching package metadata", None)),
        }
    }

    /// Streams `metadata.download_url` to `dest_path` in chunks of
    /// `config.download_chunk_size`, invoking `progress` with the running
    /// byte count and the declared total (or `-1` if unknown).
    #[instrument(skip(self, progress))]
    pub async fn download_package(
        &self,
        host: &str,
        metadata: &PackageMetadata,
        dest_path: &Path,
        mut progress: ProgressFn<'_>,
    ) -> Result<()> {
        let doc = self.discovery.discover(host).await?;
        let url = self.resolve_download_url(host, &metadata.download_url);
        let download_auth = doc
            .auth
            .as_ref()
            .map(|a| a.download_auth)
            .unwrap_or(DownloadAuthScheme::Bearer);

        let mut request = self.http.get(&url);
        if let Some(token) = self.resolve_token(host, doc.auth.as_ref()).await? {
            request = request.header("Authorization", download_auth_header(download_auth, &token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => AuthError::NoCredentials.into(),
                _ => AuthError::DownloadFailed(format!("unexpected status {status}")).into(),
            });
        }

        let total: i64 = response
            .content_length()
            .map(|n| n as i64)
            .unwrap_or(-1);

        let mut file = tokio::fs::File::create(dest_path).await?;
        let mut downloaded: u64 = 0;
        progress(downloaded, total);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AuthError::DownloadFailed(e.to_string()))?;
            for piece in chunk.chunks(self.config.download_chunk_size) {
                file.write_all(piece).await?;
                downloaded += piece.len() as u64;
                progress(downloaded, total);
            }
        }
        file.flush().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn download_shasums(&self, host: &str, url: &str) -> Result<Vec<u8>> {
        self.download_raw(host, url).await
    }

    #[instrument(skip(self))]
    pub async fn download_signature(&self, host: &str, url: &str) -> Result<Vec<u8>> {
        self.download_raw(host, url).await
    }

    async fn download_raw(&self, host: &str, url: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve_download_url(host, url);
        let response = self.http.get(&resolved).send().await?;
        if !response.status().is_success() {
            return Err(AuthError::DownloadFailed(format!(
                "unexpected status {}",
                response.status()
            ))
            .into());
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Picks whichever of `provider`/`transformer` is configured with a
    /// non-empty endpoint. At most one is expected to be set; if neither
    /// has a non-empty endpoint, there is no plugin service to talk to.
    fn resolve_service_endpoint(doc: &DiscoveryDocument) -> Result<&ServiceEndpoint> {
        doc.provider
            .as_ref()
            .or(doc.transformer.as_ref())
            .filter(|service| !service.endpoint.is_empty())
            .ok_or_else(|| Error::config("no plugin service configured"))
    }

    fn resolve_download_url(&self, host: &str, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", base_url(host), url)
        }
    }

    async fn authed_request(
        &self,
        url: &str,
        host: &str,
        auth_config: Option<&AuthConfig>,
    ) -> Result<reqwest::RequestBuilder> {
        let mut request = self.http.get(url).header("Accept", "application/json");
        if let Some(token) = self.resolve_token(host, auth_config).await? {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        Ok(request)
    }

    /// Five-step fallback chain: fresh cached token, refreshed token, static
    /// API key, on-the-fly client-credentials exchange, or no header at all.
    async fn resolve_token(&self, host: &str, auth_config: Option<&AuthConfig>) -> Result<Option<String>> {
        if let Some(tokens) = self.token_store.get_registry_tokens(host).await? {
            if !tokens.is_expired() {
                return Ok(Some(tokens.access_token));
            }
            if tokens.refresh_token.is_some() {
                if let Some(cfg) = auth_config {
                    match refresh_tokens(
                        &self.http,
                        &self.token_store,
                        self.config.token_exchange_timeout,
                        host,
                        cfg,
                    )
                    .await
                    {
                        Ok(()) => {
                            if let Some(refreshed) = self.token_store.get_registry_tokens(host).await? {
                                return Ok(Some(refreshed.access_token));
                            }
                        }
                        Err(e) => {
                            // A refresh failure demotes to static credentials
                            // rather than failing the request outright.
                            warn!(error = %e, "token refresh failed, falling back to static credentials");
                        }
                    }
                }
            }
        }

        if let Some(auth) = self.auth_store.get_registry_auth(host).await? {
            if let Some(api_key) = auth.api_key {
                return Ok(Some(api_key));
            }
            if let (Some(oauth2), Some(cfg)) = (auth.oauth2, auth_config) {
                debug!("exchanging client credentials for a one-off access token");
                let token = self
                    .client_credentials
                    .obtain_token(cfg, &oauth2.client_id, &oauth2.client_secret)
                    .await?;
                return Ok(Some(token.access_token));
            }
        }

        Ok(None)
    }
}

fn download_auth_header(scheme: DownloadAuthScheme, token: &str) -> String {
    match scheme {
        DownloadAuthScheme::Basic => format!("Basic {token}"),
        DownloadAuthScheme::Bearer | DownloadAuthScheme::Digest => format!("Bearer {token}"),
    }
}
