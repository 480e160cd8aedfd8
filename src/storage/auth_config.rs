use super::{load_map, save_map};
use crate::error::Result;
use crate::host::normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::instrument;

/// Static, non-expiring credentials for one registry host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryAuth {
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "oauth2", skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuth2Credentials {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

impl RegistryAuth {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            oauth2: None,
        }
    }

    pub fn client_credentials(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            api_key: None,
            oauth2: Some(OAuth2Credentials {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            }),
        }
    }
}

/// Read-modify-write persistence for [`RegistryAuth`] records, keyed by
/// normalized registry host. Mirrors [`super::TokenStore`]'s file layout and
/// atomic-write discipline.
#[derive(Debug, Clone)]
pub struct AuthConfigStore {
    path: PathBuf,
}

impl AuthConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<HashMap<String, RegistryAuth>> {
        load_map(&self.path).await
    }

    #[instrument(skip(self, map))]
    pub async fn save(&self, map: &HashMap<String, RegistryAuth>) -> Result<()> {
        save_map(&self.path, map).await
    }

    #[instrument(skip(self))]
    pub async fn get_registry_auth(&self, host: &str) -> Result<Option<RegistryAuth>> {
        let map = self.load().await?;
        Ok(map.get(&normalize(host)).cloned())
    }

    #[instrument(skip(self, auth))]
    pub async fn save_registry_auth(&self, host: &str, auth: RegistryAuth) -> Result<()> {
        let mut map = self.load().await?;
        map.insert(normalize(host), auth);
        self.save(&map).await
    }

    #[instrument(skip(self))]
    pub async fn remove_registry_auth(&self, host: &str) -> Result<()> {
        let mut map = self.load().await?;
        if map.remove(&normalize(host)).is_some() {
            self.save(&map).await?;
        }
        Ok(())
    }

    pub async fn has_registry_auth(&self, host: &str) -> Result<bool> {
        Ok(self.get_registry_auth(host).await?.is_some())
    }
}
