//! Plugin registry discovery, authentication, and client core.
//!
//! Ties together host normalization, service discovery, three
//! authenticators (API key, OAuth2 client-credentials, OAuth2
//! authorization-code with PKCE), on-disk credential/token stores, and an
//! authenticated registry client for listing versions, fetching package
//! metadata, and streaming downloads.
//!
//! ```no_run
//! use bluelink_plugin_registry::{ClientConfig, DiscoveryClient};
//!
//! # async fn example() -> bluelink_plugin_registry::Result<()> {
//! let config = ClientConfig::default();
//! let discovery = DiscoveryClient::new(config.discovery_timeout);
//! let auth = discovery.discover_auth("registry.example.com").await?;
//! if auth.supports_api_key() {
//!     // drive ApiKeyAuthenticator::authenticate
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod host;
pub mod registry;
pub mod storage;

pub use config::ClientConfig;
pub use discovery::{AuthConfig, DiscoveryClient, DiscoveryDocument, DownloadAuthScheme, GrantType, ServiceEndpoint};
pub use error::{AuthError, Error, Result};
pub use host::{base_url, is_localhost, normalize};
pub use registry::{PackageMetadata, ProgressFn, RegistryClient, VersionInfo, VersionList};
pub use storage::{AuthConfigStore, OAuth2Credentials, RegistryAuth, RegistryTokens, TokenStore};
