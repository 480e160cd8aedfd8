//! Host-keyed persistence for static credentials and OAuth2 tokens.
//!
//! Both stores share the same file shape (a flat JSON object keyed by
//! normalized host) and the same atomic-write discipline: write to a sibling
//! `.tmp` path, set restrictive permissions, then rename over the real path.

mod auth_config;
mod tokens;

pub use auth_config::{AuthConfigStore, OAuth2Credentials, RegistryAuth};
pub use tokens::{RegistryTokens, TokenStore};

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Loads a `HashMap<host, V>` from `path`. A missing file, or a file whose
/// contents parse to JSON `null`, both yield an empty map rather than an
/// error.
#[instrument(skip_all, fields(path = %path.display()))]
pub(crate) async fn load_map<V: DeserializeOwned>(path: &Path) -> Result<HashMap<String, V>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(Error::Io(e)),
    };
    if contents.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| Error::storage(format!("parsing {}: {e}", path.display())))?;
    if value.is_null() {
        return Ok(HashMap::new());
    }
    serde_json::from_value(value)
        .map_err(|e| Error::storage(format!("decoding {}: {e}", path.display())))
}

/// Writes `map` to `path` atomically: parent directory created with `0700`
/// if absent, contents written to a `.tmp` sibling with `0600`, then
/// renamed into place.
#[instrument(skip(map), fields(path = %path.display()))]
pub(crate) async fn save_map<V: Serialize>(
    path: &Path,
    map: &HashMap<String, V>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(parent, std::fs::Permissions::from_mode(DIR_MODE))
                    .await?;
            }
        }
    }

    let body = serde_json::to_string_pretty(map)?;
    let tmp_path: PathBuf = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, body).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(FILE_MODE)).await
        {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::Io(e));
        }
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Io(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rec {
        value: String,
    }

    #[tokio::test]
    async fn missing_file_yields_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let map: HashMap<String, Rec> = load_map(&path).await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("store.json");
        let mut map = HashMap::new();
        map.insert(
            "example.com".to_string(),
            Rec {
                value: "hi".to_string(),
            },
        );
        save_map(&path, &map).await.unwrap();
        let loaded: HashMap<String, Rec> = load_map(&path).await.unwrap();
        assert_eq!(loaded, map);
    }

    #[tokio::test]
    async fn null_json_body_yields_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("null.json");
        tokio::fs::write(&path, "null").await.unwrap();
        let map: HashMap<String, Rec> = load_map(&path).await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn whitespace_body_yields_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ws.json");
        tokio::fs::write(&path, "   \n").await.unwrap();
        let map: HashMap<String, Rec> = load_map(&path).await.unwrap();
        assert!(map.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn save_sets_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let map: HashMap<String, Rec> = HashMap::new();
        save_map(&path, &map).await.unwrap();
        let perms = tokio::fs::metadata(&path).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn save_does_not_disturb_other_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut map = HashMap::new();
        map.insert("a.com".to_string(), Rec { value: "a".into() });
        map.insert("b.com".to_string(), Rec { value: "b".into() });
        save_map(&path, &map).await.unwrap();

        let mut reloaded: HashMap<String, Rec> = load_map(&path).await.unwrap();
        reloaded.insert("a.com".to_string(), Rec { value: "a2".into() });
        save_map(&path, &reloaded).await.unwrap();

        let final_map: HashMap<String, Rec> = load_map(&path).await.unwrap();
        assert_eq!(final_map.get("b.com").unwrap().value, "b");
        assert_eq!(final_map.get("a.com").unwrap().value, "a2");
    }
}
