use super::{load_map, save_map};
use crate::error::Result;
use crate::host::normalize;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::instrument;

/// OAuth2 access/refresh tokens for one registry host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryTokens {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(rename = "tokenExpiry", skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<DateTime<Utc>>,
}

/// Clock-skew guard applied by [`RegistryTokens::is_expired`].
const EXPIRY_SKEW: ChronoDuration = ChronoDuration::seconds(30);

impl RegistryTokens {
    /// True iff `token_expiry` is set and `now + 30s >= token_expiry`.
    /// Tokens with no expiry are treated as never expiring.
    pub fn is_expired(&self) -> bool {
        match self.token_expiry {
            Some(expiry) => Utc::now() + EXPIRY_SKEW >= expiry,
            None => false,
        }
    }
}

/// Read-modify-write persistence for [`RegistryTokens`], keyed by normalized
/// registry host.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<HashMap<String, RegistryTokens>> {
        load_map(&self.path).await
    }

    #[instrument(skip(self, map))]
    pub async fn save(&self, map: &HashMap<String, RegistryTokens>) -> Result<()> {
        save_map(&self.path, map).await
    }

    #[instrument(skip(self))]
    pub async fn get_registry_tokens(&self, host: &str) -> Result<Option<RegistryTokens>> {
        let map = self.load().await?;
        Ok(map.get(&normalize(host)).cloned())
    }

    /// Like [`Self::get_registry_tokens`], but returns `None` for an expired
    /// record rather than surfacing it — callers must refresh or
    /// re-authenticate instead of using stale tokens.
    #[instrument(skip(self))]
    pub async fn get_valid_tokens(&self, host: &str) -> Result<Option<RegistryTokens>> {
        Ok(self
            .get_registry_tokens(host)
            .await?
            .filter(|t| !t.is_expired()))
    }

    #[instrument(skip(self, tokens))]
    pub async fn save_registry_tokens(&self, host: &str, tokens: RegistryTokens) -> Result<()> {
        let mut map = self.load().await?;
        map.insert(normalize(host), tokens);
        self.save(&map).await
    }

    #[instrument(skip(self))]
    pub async fn remove_registry_tokens(&self, host: &str) -> Result<()> {
        let mut map = self.load().await?;
        if map.remove(&normalize(host)).is_some() {
            self.save(&map).await?;
        }
        Ok(())
    }

    pub async fn has_registry_tokens(&self, host: &str) -> Result<bool> {
        Ok(self.get_registry_tokens(host).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("plugins.tokens.json"))
    }

    fn sample(expiry: Option<DateTime<Utc>>) -> RegistryTokens {
        RegistryTokens {
            client_id: "cid".into(),
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            token_expiry: expiry,
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store
            .save_registry_tokens("host", sample(None))
            .await
            .unwrap();
        let loaded = store.get_registry_tokens("host").await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "at");
    }

    #[test]
    fn is_expired_true_at_29_seconds_remaining() {
        let expiry = Utc::now() + ChronoDuration::seconds(29);
        let tokens = sample(Some(expiry));
        assert!(tokens.is_expired());
    }

    #[test]
    fn is_expired_false_at_31_seconds_remaining() {
        let expiry = Utc::now() + ChronoDuration::seconds(31);
        let tokens = sample(Some(expiry));
        assert!(!tokens.is_expired());
    }

    #[test]
    fn is_expired_false_when_unset() {
        let tokens = sample(None);
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn get_valid_tokens_hides_expired_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let expired = sample(Some(Utc::now() - ChronoDuration::seconds(5)));
        store.save_registry_tokens("host", expired).await.unwrap();

        assert!(store.get_valid_tokens("host").await.unwrap().is_none());
        assert!(store.get_registry_tokens("host").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_preserves_other_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save_registry_tokens("a.com", sample(None)).await.unwrap();
        store.save_registry_tokens("b.com", sample(None)).await.unwrap();
        store.remove_registry_tokens("a.com").await.unwrap();

        assert!(store.get_registry_tokens("a.com").await.unwrap().is_none());
        assert!(store.get_registry_tokens("b.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_retains_old_refresh_token_when_response_omits_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.save_registry_tokens("host", sample(None)).await.unwrap();

        let mut updated = store.get_registry_tokens("host").await.unwrap().unwrap();
        let previous_refresh = updated.refresh_token.clone();
        updated.access_token = "new-access".into();
        // Simulate a refresh response with no refresh_token field: caller
        // is responsible for retaining the old value before saving.
        store.save_registry_tokens("host", updated).await.unwrap();

        let reloaded = store.get_registry_tokens("host").await.unwrap().unwrap();
        assert_eq!(reloaded.access_token, "new-access");
        assert_eq!(reloaded.refresh_token, previous_refresh);
    }
}
