//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::{StorageBackend, Visibility};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Per-upload options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Overrides the backend's default visibility when set.
    pub visibility: Option<Visibility>,
}

impl UploadOptions {
    pub fn public() -> Self {
        Self {
            visibility: Some(Visibility::Public),
        }
    }

    pub fn private() -> Self {
        Self {
            visibility: Some(Visibility::Private),
        }
    }

    pub(crate) fn resolve(&self, default: Visibility) -> Visibility {
        self.visibility.unwrap_or(default)
    }
}

/// Storage abstraction trait
///
/// All storage backends (S3, Google Drive, local filesystem) implement this trait
/// so archivers can persist media without knowing how the backend addresses it.
///
/// **Key format:** keys are logical, `/`-separated paths. Each backend prepends its
/// run folder before translating the key. See the crate root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check whether a key exists.
    ///
    /// Returns `Ok(false)` when the key cannot be resolved. Transport and
    /// authentication failures are still returned as errors.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.get_cdn_url(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Upload a local file under `key`.
    ///
    /// Uploading the same key twice is not an error; duplicate handling is
    /// backend specific (overwrite for S3 and local, a second file for Drive).
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()>;

    /// Resolve the URL at which the stored object can be viewed.
    ///
    /// Returns [`StorageError::NotFound`] when the key cannot be resolved.
    async fn get_cdn_url(&self, key: &str) -> StorageResult<String>;

    /// The run folder prepended to every key.
    fn folder(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
