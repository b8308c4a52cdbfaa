use crate::keys;
use crate::traits::{Storage, StorageError, StorageResult, UploadOptions};
use crate::{StorageBackend, Visibility};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: Option<String>,
    folder: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for archived files (e.g., "/var/lib/archivist")
    /// * `base_url` - Optional base URL the directory is served from; without it
    ///   `get_cdn_url` returns `file://` URLs
    /// * `folder` - Run folder prepended to every key
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: Option<String>,
        folder: impl Into<String>,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            folder: folder.into(),
        })
    }

    /// Same directory, different run folder.
    pub fn with_folder(&self, folder: impl Into<String>) -> Self {
        LocalStorage {
            base_path: self.base_path.clone(),
            base_url: self.base_url.clone(),
            folder: folder.into(),
        }
    }

    /// Convert a logical key to a filesystem path with security validation
    ///
    /// Rejects keys whose resolved path would escape the base storage directory.
    fn key_to_path(&self, key: &str) -> StorageResult<(String, PathBuf)> {
        let full_key = keys::full_key(&self.folder, key)?;
        let path = self.base_path.join(&full_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok((full_key, path))
    }

    /// Generate public URL for file
    fn generate_url(&self, full_key: &str, path: &Path) -> String {
        match self.base_url {
            Some(ref base_url) => format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                keys::encode_url_path(full_key)
            ),
            None => format!("file://{}", path.display()),
        }
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let (_, path) = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        let (full_key, path) = self.key_to_path(key)?;

        if options.visibility == Some(Visibility::Private) && self.base_url.is_some() {
            tracing::warn!(
                key = %full_key,
                "Private upload requested but local storage cannot restrict access to files under its base URL"
            );
        }

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let size = fs::copy(local_path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                local_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %full_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn get_cdn_url(&self, key: &str) -> StorageResult<String> {
        let (full_key, path) = self.key_to_path(key)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(full_key));
        }
        Ok(self.generate_url(&full_key, &path))
    }

    fn folder(&self) -> &str {
        &self.folder
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn source_file(dir: &Path, data: &[u8]) -> PathBuf {
        let path = dir.join("source.bin");
        fs::write(&path, data).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_local_storage_upload_exists_url() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let storage = LocalStorage::new(
            dir.path(),
            Some("http://localhost:3000/archive".to_string()),
            "sheet-a",
        )
        .await
        .unwrap();
        let file = source_file(scratch.path(), b"test data").await;

        storage
            .upload(&file, "youtube_dl_abc.mp4", &UploadOptions::default())
            .await
            .unwrap();

        assert!(storage.exists("youtube_dl_abc.mp4").await.unwrap());
        assert_eq!(
            storage.get_cdn_url("youtube_dl_abc.mp4").await.unwrap(),
            "http://localhost:3000/archive/sheet-a/youtube_dl_abc.mp4"
        );

        let copied = fs::read(dir.path().join("sheet-a/youtube_dl_abc.mp4"))
            .await
            .unwrap();
        assert_eq!(copied, b"test data");
    }

    #[tokio::test]
    async fn test_file_url_without_base_url() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None, "").await.unwrap();
        let file = source_file(scratch.path(), b"x").await;

        storage
            .upload(&file, "nested/a.mp4", &UploadOptions::default())
            .await
            .unwrap();

        let url = storage.get_cdn_url("nested/a.mp4").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("nested/a.mp4"));
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None, "sheet-a")
            .await
            .unwrap();

        assert!(!storage.exists("nonexistent.mp4").await.unwrap());
        assert!(matches!(
            storage.get_cdn_url("nonexistent.mp4").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_not_a_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None, "sheet-a")
            .await
            .unwrap();
        // A regular file where a directory is expected fails with ENOTDIR
        fs::create_dir_all(dir.path().join("sheet-a")).await.unwrap();
        fs::write(dir.path().join("sheet-a/blocker"), b"x")
            .await
            .unwrap();

        assert!(matches!(
            storage.exists("blocker/a.mp4").await,
            Err(StorageError::IoError(_))
        ));
        assert!(matches!(
            storage.get_cdn_url("blocker/a.mp4").await,
            Err(StorageError::IoError(_))
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None, "").await.unwrap();

        let result = storage.get_cdn_url("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_upload_same_key_twice() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None, "sheet-a")
            .await
            .unwrap();
        let file = source_file(scratch.path(), b"first").await;

        storage
            .upload(&file, "a.mp4", &UploadOptions::default())
            .await
            .unwrap();
        storage
            .upload(&file, "a.mp4", &UploadOptions::private())
            .await
            .unwrap();

        assert!(storage.exists("a.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_with_folder() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None, "sheet-a")
            .await
            .unwrap();
        let other = storage.with_folder("sheet-b");
        let file = source_file(scratch.path(), b"x").await;

        other
            .upload(&file, "a.mp4", &UploadOptions::default())
            .await
            .unwrap();

        assert!(other.exists("a.mp4").await.unwrap());
        assert!(!storage.exists("a.mp4").await.unwrap());
    }
}
