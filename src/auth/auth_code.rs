//! Drives the full OAuth2 authorization-code + PKCE state machine: stands up
//! the callback server, opens the browser, awaits the redirect, validates
//! CSRF state, exchanges the code for tokens, and persists the result.

use super::browser::BrowserOpener;
use super::callback_server::CallbackServer;
use super::pkce::{generate_state, Pkce};
use crate::discovery::AuthConfig;
use crate::error::{AuthError, Result};
use crate::storage::{RegistryTokens, TokenStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

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

pub struct AuthCodeAuthenticator<B: BrowserOpener> {
    http: reqwest::Client,
    store: TokenStore,
    browser: B,
    callback_timeout: Duration,
    token_exchange_timeout: Duration,
}

impl<B: BrowserOpener> AuthCodeAuthenticator<B> {
    pub fn new(
        http: reqwest::Client,
        store: TokenStore,
        browser: B,
        callback_timeout: Duration,
        token_exchange_timeout: Duration,
    ) -> Self {
        Self {
            http,
            store,
            browser,
            callback_timeout,
            token_exchange_timeout,
        }
    }

    #[instrument(skip(self, auth_config))]
    pub async fn authenticate(&self, host: &str, auth_config: &AuthConfig) -> Result<()> {
        debug!("validating auth-code configuration");
        let client_id = auth_config
            .client_id
            .as_deref()
            .ok_or_else(|| AuthError::authentication_failed("client id not configured"))?;
        let authorize_url = auth_config.authorize_url()?;
        // token_url is resolved lazily during exchange, but validate eagerly
        // so configuration errors surface before the browser ever opens.
        auth_config.token_url()?;

        let callback = CallbackServer::bind().await?;
        info!("callback server up");
        let redirect_uri = callback.redirect_uri();

        let state = generate_state();
        let pkce = auth_config.pkce.then(Pkce::generate);

        let mut url = authorize_url;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("client_id", client_id);
            qp.append_pair("redirect_uri", &redirect_uri);
            qp.append_pair("response_type", "code");
            qp.append_pair("state", &state);
            if let Some(pkce) = &pkce {
                qp.append_pair("code_challenge", &pkce.challenge);
                qp.append_pair("code_challenge_method", pkce.method);
            }
        }

        self.browser
            .open(url.as_str())
            .await
            .map_err(|e| AuthError::BrowserOpenFailed(e.to_string()))?;
        info!("browser opened");

        let callback_result = callback.wait_for_callback(self.callback_timeout).await?;

        if callback_result.state.as_deref() != Some(state.as_str()) {
            return Err(AuthError::StateMismatch.into());
        }

        let verifier = pkce.as_ref().map(|p| p.verifier.clone());
        let token = self
            .exchange_code(auth_config, client_id, &callback_result.code, &redirect_uri, verifier.as_deref())
            .await?;

        self.store
            .save_registry_tokens(
                host,
                RegistryTokens {
                    client_id: client_id.to_string(),
                    access_token: token.0,
                    refresh_token: token.1,
                    token_expiry: token.2,
                },
            )
            .await
            .map_err(|e| AuthError::ConfigSaveFailed(e.to_string()))?;

        info!("authorization code flow complete");
        Ok(())
    }

    #[instrument(skip(self, auth_config))]
    pub async fn refresh_tokens(&self, host: &str, auth_config: &AuthConfig) -> Result<()> {
        refresh_tokens(
            &self.http,
            &self.store,
            self.token_exchange_timeout,
            host,
            auth_config,
        )
        .await
    }

    async fn exchange_code(
        &self,
        auth_config: &AuthConfig,
        client_id: &str,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<(String, Option<String>, Option<DateTime<Utc>>)> {
        let token_url = auth_config.token_url()?;
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(token_url)
            .timeout(self.token_exchange_timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::token_exchange_failed(e.to_string()))?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::token_exchange_failed(e.to_string()))?;

        if let Some(error) = body.error {
            let detail = match body.error_description {
                Some(desc) => format!("{error}: {desc}"),
                None => error,
            };
            return Err(AuthError::token_exchange_failed(detail).into());
        }
        if body.access_token.is_empty() {
            return Err(AuthError::token_exchange_failed("empty access token in response").into());
        }

        Ok((
            body.access_token,
            body.refresh_token,
            body.expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        ))
    }
}

/// Standalone refresh path usable without a [`BrowserOpener`] — the
/// registry client reaches for this directly when a cached token expires
/// mid-request instead of constructing a full [`AuthCodeAuthenticator`].
#[instrument(skip(http, store, auth_config))]
pub async fn refresh_tokens(
    http: &reqwest::Client,
    store: &TokenStore,
    timeout: Duration,
    host: &str,
    auth_config: &AuthConfig,
) -> Result<()> {
    let existing = store
        .get_registry_tokens(host)
        .await?
        .ok_or_else(|| AuthError::token_refresh_failed("no stored tokens for this host"))?;
    let refresh_token = existing
        .refresh_token
        .clone()
        .ok_or_else(|| AuthError::token_refresh_failed("no refresh token available"))?;

    let token_url = auth_config
        .token_url()
        .map_err(|e| AuthError::token_refresh_failed(e.to_string()))?;

    let response = http
        .post(token_url)
        .timeout(timeout)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", existing.client_id.as_str()),
        ])
        .send()
        .await
        .map_err(|e| AuthError::token_refresh_failed(e.to_string()))?;

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::token_refresh_failed(e.to_string()))?;

    if let Some(error) = body.error {
        let detail = match body.error_description {
            Some(desc) => format!("{error}: {desc}"),
            None => error,
        };
        return Err(AuthError::token_refresh_failed(detail).into());
    }

    let refreshed = RegistryTokens {
        client_id: existing.client_id,
        access_token: body.access_token,
        // Server may omit refresh_token on rotation; retain the previous
        // one since it may still be long-lived.
        refresh_token: body.refresh_token.or(existing.refresh_token),
        token_expiry: body
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
    };
    store
        .save_registry_tokens(host, refreshed)
        .await
        .map_err(|e| AuthError::ConfigSaveFailed(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DownloadAuthScheme, GrantType};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CallbackSimulatingOpener {
        captured_state: Mutex<Option<String>>,
        pkce_challenge_present: Mutex<bool>,
    }

    #[async_trait]
    impl BrowserOpener for &CallbackSimulatingOpener {
        async fn open(&self, url: &str) -> Result<()> {
            let parsed = url::Url::parse(url).unwrap();
            let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
            *self.captured_state.lock().unwrap() = pairs.get("state").cloned();
            *self.pkce_challenge_present.lock().unwrap() = pairs.contains_key("code_challenge");
            let redirect_uri = pairs.get("redirect_uri").unwrap().clone();
            let state = pairs.get("state").unwrap().clone();

            let client = reqwest::Client::new();
            client
                .get(format!("{redirect_uri}?code=abc123&state={state}"))
                .send()
                .await
                .unwrap();
            Ok(())
        }
    }

    fn config(endpoint: &str, pkce: bool) -> AuthConfig {
        AuthConfig {
            api_key_header: None,
            download_auth: DownloadAuthScheme::Bearer,
            endpoint: Some(endpoint.to_string()),
            client_id: Some("client-id".to_string()),
            grant_types: vec![GrantType::AuthorizationCode],
            authorize_path: "/authorize".into(),
            token_path: Some("/oauth/token".into()),
            pkce,
        }
    }

    #[tokio::test]
    async fn full_pkce_flow_persists_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        let opener = CallbackSimulatingOpener {
            captured_state: Mutex::new(None),
            pkce_challenge_present: Mutex::new(false),
        };

        let auth = AuthCodeAuthenticator::new(
            reqwest::Client::new(),
            store.clone(),
            &opener,
            Duration::from_secs(5),
            Duration::from_secs(5),
        );

        auth.authenticate("host", &config(&server.uri(), true)).await.unwrap();

        assert!(*opener.pkce_challenge_present.lock().unwrap());
        assert!(opener.captured_state.lock().unwrap().is_some());
        let saved = store.get_registry_tokens("host").await.unwrap().unwrap();
        assert_eq!(saved.access_token, "access-1");
        assert_eq!(saved.client_id, "client-id");
    }

    #[tokio::test]
    async fn state_mismatch_aborts_without_persisting() {
        struct WrongStateOpener;
        #[async_trait]
        impl BrowserOpener for &WrongStateOpener {
            async fn open(&self, url: &str) -> Result<()> {
                let parsed = url::Url::parse(url).unwrap();
                let pairs: std::collections::HashMap<_, _> =
                    parsed.query_pairs().into_owned().collect();
                let redirect_uri = pairs.get("redirect_uri").unwrap().clone();
                reqwest::get(format!("{redirect_uri}?code=abc123&state=WRONG"))
                    .await
                    .unwrap();
                Ok(())
            }
        }

        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        let opener = WrongStateOpener;

        let auth = AuthCodeAuthenticator::new(
            reqwest::Client::new(),
            store.clone(),
            &opener,
            Duration::from_secs(5),
            Duration::from_secs(5),
        );

        let err = auth
            .authenticate("host", &config(&server.uri(), false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Auth(AuthError::StateMismatch)
        ));
        assert!(store.get_registry_tokens("host").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_retains_old_refresh_token_when_server_omits_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-2"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store
            .save_registry_tokens(
                "host",
                RegistryTokens {
                    client_id: "client-id".into(),
                    access_token: "access-1".into(),
                    refresh_token: Some("refresh-1".into()),
                    token_expiry: None,
                },
            )
            .await
            .unwrap();

        struct NeverOpens;
        #[async_trait]
        impl BrowserOpener for &NeverOpens {
            async fn open(&self, _url: &str) -> Result<()> {
                unreachable!("refresh must not open a browser")
            }
        }
        let opener = NeverOpens;

        let auth = AuthCodeAuthenticator::new(
            reqwest::Client::new(),
            store.clone(),
            &opener,
            Duration::from_secs(5),
            Duration::from_secs(5),
        );

        auth.refresh_tokens("host", &config(&server.uri(), false))
            .await
            .unwrap();

        let saved = store.get_registry_tokens("host").await.unwrap().unwrap();
        assert_eq!(saved.access_token, "access-2");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
    }
}
