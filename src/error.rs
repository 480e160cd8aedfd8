//! Error taxonomy for the plugin registry client.
//!
//! Two levels: [`Error`] wraps transport/serialization/io/url failures and a
//! nested [`AuthError`] that tags every domain-specific failure mode named in
//! the design (discovery, authentication, token exchange/refresh, callback
//! handling, and registry request outcomes). Callers branch on variant, never
//! on message text.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("registry returned status {status}: {message}")]
    Api {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Error::Api {
            status,
            message: message.into(),
            retry_after,
        }
    }

    /// True for transient failures a caller might retry after backing off.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            Error::Network(_) => true,
            _ => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::Api { status: 429, .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// True when the failure means stored credentials are no longer usable
    /// and the user must go through an authenticator again.
    pub fn requires_reauth(&self) -> bool {
        match self {
            Error::Auth(inner) => inner.requires_reauth(),
            Error::Api { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    #[error("service discovery failed: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("registry does not advertise any supported authentication method")]
    NoAuthMethodsSupported,

    #[error("credentials required: {0}")]
    CredentialsRequired(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("state parameter mismatch")]
    StateMismatch,

    #[error("timed out waiting for the authorization callback")]
    AuthorizationTimeout,

    #[error("failed to open the system browser: {0}")]
    BrowserOpenFailed(String),

    #[error("failed to persist credentials: {0}")]
    ConfigSaveFailed(String),

    #[error("plugin not found")]
    PluginNotFound,

    #[error("plugin version not found")]
    VersionNotFound,

    #[error("no credentials available for this registry")]
    NoCredentials,

    #[error("download failed: {0}")]
    DownloadFailed(String),
}

impl AuthError {
    /// Failures after which a cached access token (and, depending on kind,
    /// refresh token) should no longer be trusted.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AuthError::StateMismatch
                | AuthError::TokenRefreshFailed(_)
                | AuthError::NoCredentials
                | AuthError::AuthenticationFailed(_)
        )
    }

    pub fn credentials_required(msg: impl Into<String>) -> Self {
        AuthError::CredentialsRequired(msg.into())
    }

    pub fn authentication_failed(msg: impl Into<String>) -> Self {
        AuthError::AuthenticationFailed(msg.into())
    }

    pub fn token_exchange_failed(msg: impl Into<String>) -> Self {
        AuthError::TokenExchangeFailed(msg.into())
    }

    pub fn token_refresh_failed(msg: impl Into<String>) -> Self {
        AuthError::TokenRefreshFailed(msg.into())
    }
}
