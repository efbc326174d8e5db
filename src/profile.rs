//! Local identity and its persistence.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::ProfileError;

const AVATAR_URL: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

/// The user's own identity
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    /// Remote URL or embedded `data:` URI
    pub avatar: String,
    /// Whether the avatar was supplied by the user
    pub is_custom_image: bool,
}

impl Profile {
    /// Profile with a generated avatar seeded by the name.
    pub fn new(username: &str) -> Result<Self, ProfileError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ProfileError::EmptyUsername);
        }
        Ok(Self {
            username: username.to_string(),
            avatar: format!("{AVATAR_URL}{username}"),
            is_custom_image: false,
        })
    }

    pub fn with_custom_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = avatar.into();
        self.is_custom_image = true;
        self
    }
}

/// String storage under fixed keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

/// In-process store, nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        values.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        // create dir if it doesn't already exist
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("unable to read '{key}'")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        // write to tempfile
        let (file, temp_file_path) = tempfile::NamedTempFile::new_in(&self.dir)
            .context("unable to create tempfile")?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(value.as_bytes())
            .await
            .context("unable to write value")?;
        file.flush().await?;
        drop(file);

        // move file
        tokio::fs::rename(temp_file_path, self.path(key))
            .await
            .context("failed to rename value file")?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(key)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                Err(e).with_context(|| format!("unable to remove '{key}'"))
            }
            _ => Ok(()),
        }
    }
}

/// Reads and writes the profile blob under one key.
pub struct ProfileStore<S: KeyValueStore> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> ProfileStore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Load the saved profile.
    ///
    /// A blob that does not parse is deleted and treated as no profile.
    pub async fn load(&self) -> Result<Option<Profile>, ProfileError> {
        let Some(blob) = self.store.get(&self.key).await.map_err(storage)? else {
            return Ok(None);
        };
        match serde_json::from_str(&blob) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!(key = %self.key, "discarding unreadable profile: {e}");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    pub async fn save(&self, profile: &Profile) -> Result<(), ProfileError> {
        let blob = serde_json::to_string(profile)?;
        self.store.set(&self.key, &blob).await.map_err(storage)?;
        debug!(username = %profile.username, "profile saved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), ProfileError> {
        self.store.clear(&self.key).await.map_err(storage)
    }
}

fn storage(err: anyhow::Error) -> ProfileError {
    ProfileError::Storage(format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_and_logout() -> anyhow::Result<()> {
        let profiles = ProfileStore::new(MemoryStore::new(), "kiwia_profile");
        assert_eq!(profiles.load().await?, None);

        let me = Profile::new("  Mateo ")?;
        assert_eq!(me.username, "Mateo");
        assert_eq!(me.avatar, "https://api.dicebear.com/7.x/avataaars/svg?seed=Mateo");
        profiles.save(&me).await?;
        assert_eq!(profiles.load().await?, Some(me));

        profiles.clear().await?;
        assert_eq!(profiles.load().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn blob_uses_camel_case_fields() -> anyhow::Result<()> {
        let profiles = ProfileStore::new(MemoryStore::new(), "p");
        let me = Profile::new("Elena")?.with_custom_avatar("data:image/png;base64,AAAA");
        profiles.save(&me).await?;
        let blob = profiles.inner().get("p").await?.unwrap();
        assert!(blob.contains("\"isCustomImage\":true"));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_blob_is_discarded() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set("p", "{ not json").await?;
        let profiles = ProfileStore::new(store, "p");
        assert_eq!(profiles.load().await?, None);
        assert_eq!(profiles.inner().get("p").await?, None);
        Ok(())
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(matches!(Profile::new("   "), Err(ProfileError::EmptyUsername)));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path().join("storage")).await?;
        let profiles = ProfileStore::new(store.clone(), "kiwia_profile");
        profiles.save(&Profile::new("Sofia")?).await?;

        let reopened = ProfileStore::new(FileStore::new(store.dir().to_path_buf()).await?, "kiwia_profile");
        assert_eq!(reopened.load().await?.map(|p| p.username), Some("Sofia".to_string()));

        reopened.clear().await?;
        reopened.clear().await?;
        assert_eq!(reopened.load().await?, None);
        Ok(())
    }
}
