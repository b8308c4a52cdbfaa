//! Folder-path resolution for Drive keys.

use super::client::DriveClient;
use super::FOLDER_MIME_TYPE;
use crate::{StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Bounded retry for read-path lookups.
///
/// Drive listings lag behind writes, so a folder created a moment ago may not be
/// listed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> StorageResult<Self> {
        if max_attempts == 0 {
            return Err(StorageError::ConfigError(
                "Drive retry attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub parent_id: String,
    pub name: String,
    pub mime_type: Option<String>,
}

impl CacheKey {
    pub fn new(parent_id: &str, name: &str, mime_type: Option<&str>) -> Self {
        Self {
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.map(String::from),
        }
    }
}

/// Append-only map of resolved Drive ids, shared across storages.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<CacheKey, String>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from known ids, e.g. folders resolved by an earlier run.
    pub fn with_entries(entries: impl IntoIterator<Item = (CacheKey, String)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, id: String) {
        self.entries.write().await.insert(key, id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Missing folders are an error (after retries).
    Read,
    /// Missing folders are created.
    Write,
}

/// Walks `/`-separated paths down from a root folder.
#[derive(Clone)]
pub struct PathResolver {
    client: Arc<dyn DriveClient>,
    cache: Arc<ResolutionCache>,
    retry: RetryPolicy,
}

impl PathResolver {
    pub fn new(
        client: Arc<dyn DriveClient>,
        cache: Arc<ResolutionCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            cache,
            retry,
        }
    }

    pub fn client(&self) -> &Arc<dyn DriveClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Resolve a chain of folder names to the id of the innermost folder.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn resolve_folders(
        &self,
        root_id: &str,
        folders: &[&str],
        mode: ResolveMode,
    ) -> StorageResult<String> {
        let mut parent = root_id.to_string();
        for name in folders {
            parent = self.lookup(&parent, name, Some(FOLDER_MIME_TYPE), mode).await?;
        }
        Ok(parent)
    }

    /// Resolve a file name inside an already resolved folder.
    pub async fn resolve_file(&self, parent_id: &str, filename: &str) -> StorageResult<String> {
        self.lookup(parent_id, filename, None, ResolveMode::Read).await
    }

    /// Record the id of a file this process just created.
    pub async fn remember(&self, parent_id: &str, name: &str, mime_type: Option<&str>, id: String) {
        self.cache
            .insert(CacheKey::new(parent_id, name, mime_type), id)
            .await;
    }

    async fn lookup(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: Option<&str>,
        mode: ResolveMode,
    ) -> StorageResult<String> {
        let cache_key = CacheKey::new(parent_id, name, mime_type);
        if let Some(id) = self.cache.get(&cache_key).await {
            return Ok(id);
        }

        let attempts = match mode {
            ResolveMode::Read => self.retry.max_attempts,
            ResolveMode::Write => 1,
        };

        for attempt in 1..=attempts {
            let matches = self.client.list_children(parent_id, name, mime_type).await?;
            // Duplicate names are legal in Drive; the last one listed wins
            if let Some(found) = matches.into_iter().last() {
                self.cache.insert(cache_key, found.id.clone()).await;
                return Ok(found.id);
            }

            if attempt < attempts {
                tracing::debug!(
                    parent_id = %parent_id,
                    name = %name,
                    attempt = attempt,
                    max_attempts = attempts,
                    "Drive item not listed yet, retrying"
                );
                tokio::time::sleep(self.retry.interval).await;
            }
        }

        match mode {
            ResolveMode::Read => Err(StorageError::NotFound(format!(
                "'{}' not found in Drive folder {}",
                name, parent_id
            ))),
            ResolveMode::Write => {
                let id = self.client.create_folder(parent_id, name).await?;
                tracing::info!(
                    parent_id = %parent_id,
                    name = %name,
                    folder_id = %id,
                    "Created Drive folder"
                );
                self.cache.insert(cache_key, id.clone()).await;
                Ok(id)
            }
        }
    }
}
