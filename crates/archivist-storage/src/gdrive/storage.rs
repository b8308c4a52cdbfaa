use super::resolver::{PathResolver, ResolveMode};
use crate::keys;
use crate::traits::{Storage, StorageResult, UploadOptions};
use crate::{StorageBackend, Visibility};
use async_trait::async_trait;
use std::path::Path;

/// Google Drive storage implementation
///
/// Keys map to a folder chain under `root_folder_id`; the last segment is the
/// file name.
#[derive(Clone)]
pub struct GDriveStorage {
    resolver: PathResolver,
    root_folder_id: String,
    folder: String,
}

impl GDriveStorage {
    pub fn new(
        resolver: PathResolver,
        root_folder_id: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            root_folder_id: root_folder_id.into(),
            folder: folder.into(),
        }
    }

    /// Same resolver and cache, different run folder.
    pub fn with_folder(&self, folder: impl Into<String>) -> Self {
        let mut storage = self.clone();
        storage.folder = folder.into();
        storage
    }

    pub fn root_folder_id(&self) -> &str {
        &self.root_folder_id
    }

    fn view_url(file_id: &str) -> String {
        format!("https://drive.google.com/file/d/{}/view?usp=sharing", file_id)
    }
}

#[async_trait]
impl Storage for GDriveStorage {
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        let full_key = keys::full_key(&self.folder, key)?;
        let (folders, filename) = keys::split_path(&full_key);
        let start = std::time::Instant::now();

        let parent_id = self
            .resolver
            .resolve_folders(&self.root_folder_id, &folders, ResolveMode::Write)
            .await?;

        let file_id = self
            .resolver
            .client()
            .create_file(&parent_id, filename, local_path)
            .await?;
        self.resolver
            .remember(&parent_id, filename, None, file_id.clone())
            .await;

        // Files inherit the sharing of their folder unless asked to be public
        let visibility = options.resolve(Visibility::Private);
        if visibility == Visibility::Public {
            self.resolver.client().share_publicly(&file_id).await?;
        }

        tracing::info!(
            key = %full_key,
            file_id = %file_id,
            private = visibility.is_private(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Drive upload successful"
        );

        Ok(())
    }

    async fn get_cdn_url(&self, key: &str) -> StorageResult<String> {
        let full_key = keys::full_key(&self.folder, key)?;
        let (folders, filename) = keys::split_path(&full_key);

        let parent_id = self
            .resolver
            .resolve_folders(&self.root_folder_id, &folders, ResolveMode::Read)
            .await?;
        let file_id = self.resolver.resolve_file(&parent_id, filename).await?;

        Ok(Self::view_url(&file_id))
    }

    fn folder(&self) -> &str {
        &self.folder
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::GoogleDrive
    }
}
