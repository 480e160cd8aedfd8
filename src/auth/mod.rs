//! Authenticators for the three protocols the registry may advertise:
//! static API key, OAuth2 client-credentials, and OAuth2 authorization-code
//! with PKCE driven through an ephemeral loopback callback server.

mod api_key;
mod auth_code;
mod browser;
mod callback_server;
mod client_credentials;
mod pkce;

pub use api_key::ApiKeyAuthenticator;
pub use auth_code::{refresh_tokens, AuthCodeAuthenticator};
pub use browser::{BrowserOpener, SystemBrowserOpener};
pub use callback_server::{CallbackResult, CallbackServer};
pub use client_credentials::{ClientCredentialsAuthenticator, ClientCredentialsToken};
pub use pkce::{generate_state, Pkce};
