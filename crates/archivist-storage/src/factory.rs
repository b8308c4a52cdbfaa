#[cfg(feature = "storage-gdrive")]
use crate::gdrive::{
    GDriveStorage, HttpDriveClient, PathResolver, ResolutionCache, RetryPolicy,
    ServiceAccountAuth,
};
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::{S3Config, S3Storage};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use archivist_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend();
    tracing::debug!(
        backend = %backend,
        folder = %config.storage_folder(),
        "Creating storage backend"
    );

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config
                .s3_region()
                .or_else(|| config.aws_region())
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
                })?;

            let storage = S3Storage::new(S3Config {
                bucket,
                region,
                endpoint_url: config.s3_endpoint().map(String::from),
                cdn_url: config.s3_cdn_url().map(String::from),
                visibility: config.s3_visibility(),
                folder: config.storage_folder().to_string(),
            })
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-gdrive")]
        StorageBackend::GoogleDrive => {
            let root_folder_id = config.gd_root_folder_id().ok_or_else(|| {
                StorageError::ConfigError("GD_ROOT_FOLDER_ID not configured".to_string())
            })?;
            let retry = RetryPolicy::new(
                config.gd_retry_attempts(),
                std::time::Duration::from_secs(config.gd_retry_interval_secs()),
            )?;

            let auth = ServiceAccountAuth::from_file(config.gd_service_account()).await?;
            let client = HttpDriveClient::new(Arc::new(auth));
            let resolver =
                PathResolver::new(Arc::new(client), Arc::new(ResolutionCache::new()), retry);

            let storage = GDriveStorage::new(resolver, root_folder_id, config.storage_folder());
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-gdrive"))]
        StorageBackend::GoogleDrive => Err(StorageError::ConfigError(
            "Google Drive storage backend not available (storage-gdrive feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(
                base_path,
                config.local_storage_base_url().map(String::from),
                config.storage_folder(),
            )
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let inner = archivist_core::config::ArchivistConfig::from_lookup(|k| vars.get(k).cloned())
            .unwrap();
        Config(Box::new(inner))
    }

    #[tokio::test]
    async fn creates_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let config = config(&[
            ("STORAGE_BACKEND", "local"),
            ("STORAGE_FOLDER", "sheet-a"),
            ("LOCAL_STORAGE_PATH", &path),
        ]);

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert_eq!(storage.folder(), "sheet-a");
    }

    #[cfg(feature = "storage-gdrive")]
    #[tokio::test]
    async fn gdrive_requires_readable_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json").to_string_lossy().to_string();
        let config = config(&[
            ("STORAGE_BACKEND", "gd"),
            ("GD_ROOT_FOLDER_ID", "root123"),
            ("GD_SERVICE_ACCOUNT", &missing),
        ]);

        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
