//! The archive pipeline shared by every platform.

use crate::archiver::{ArchiveOutcome, Archiver};
use crate::extractor::{ExtractError, MediaExtractor, MediaItem, MediaListing};
use crate::hashing::ContentHasher;
use crate::screenshot::ScreenshotCapturer;
use crate::thumbnails::ThumbnailGenerator;
use anyhow::{Context, Result};
use archivist_core::{ArchiveResult, ArchiveStatus};
use archivist_storage::{Storage, UploadOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const THUMBNAIL_ERROR: &str = "error creating thumbnails";
const TWITTER_DOMAINS: &[&str] = &["twitter.com", "x.com"];

/// External tools an archiver drives.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn MediaExtractor>,
    pub thumbnailer: Arc<dyn ThumbnailGenerator>,
    pub hasher: Arc<dyn ContentHasher>,
    pub screenshots: Arc<dyn ScreenshotCapturer>,
}

/// Archiver for one platform, identified by the domains it accepts.
pub struct PlatformArchiver {
    name: String,
    /// Empty means every URL is attempted.
    domains: Vec<String>,
    storage: Arc<dyn Storage>,
    collaborators: Collaborators,
    scratch_dir: PathBuf,
}

impl PlatformArchiver {
    pub fn new(
        name: impl Into<String>,
        domains: Vec<String>,
        storage: Arc<dyn Storage>,
        collaborators: Collaborators,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            domains,
            storage,
            collaborators,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// TikTok videos only.
    pub fn tiktok(
        storage: Arc<dyn Storage>,
        collaborators: Collaborators,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            "tiktok",
            vec!["tiktok.com".to_string()],
            storage,
            collaborators,
            scratch_dir,
        )
    }

    /// Catch-all for anything the extractor understands. Put it last in a chain.
    pub fn youtube_dl(
        storage: Arc<dyn Storage>,
        collaborators: Collaborators,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new("youtube_dl", Vec::new(), storage, collaborators, scratch_dir)
    }

    fn handles(&self, url: &str) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        match host_of(url) {
            Some(host) => self.domains.iter().any(|d| host_matches(&host, d)),
            None => false,
        }
    }

    /// Storage key for an item: `{archiver}_{id}.{ext}`.
    pub fn key_for(&self, item: &MediaItem) -> String {
        let id = item.id.replace(['/', '\\'], "_");
        format!("{}_{}.{}", self.name, id, item.extension)
    }

    async fn scratch(&self) -> Result<tempfile::TempDir> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .with_context(|| {
                format!("Failed to create scratch dir {}", self.scratch_dir.display())
            })?;
        tempfile::Builder::new()
            .prefix(&format!("{}_", self.name))
            .tempdir_in(&self.scratch_dir)
            .context("Failed to create attempt scratch dir")
    }

    async fn archive_item(
        &self,
        url: &str,
        item: &MediaItem,
        key: &str,
        check_if_exists: bool,
        scratch: &Path,
    ) -> Result<ArchiveResult> {
        let already_archived = check_if_exists && self.storage.exists(key).await?;
        let mut cdn_url = if already_archived {
            tracing::info!(key = %key, "Media already archived");
            Some(self.storage.get_cdn_url(key).await?)
        } else {
            None
        };

        tracing::info!(key = %key, "Downloading media");
        let local_file = match self.collaborators.extractor.fetch(url, item, scratch).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Could not download media");
                return Ok(ArchiveResult::builder(ArchiveStatus::CouldNotDownload {
                    already_archived,
                })
                .cdn_url(cdn_url)
                .title(item.title.clone())
                .timestamp(item.created_at)
                .build());
            }
        };

        if !already_archived {
            tracing::info!(key = %key, "Uploading media");
            self.storage
                .upload(&local_file, key, &UploadOptions::default())
                .await?;
            cdn_url = Some(self.storage.get_cdn_url(key).await?);
        }

        let hash = match self.collaborators.hasher.hash(&local_file).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Failed to hash media");
                None
            }
        };

        let (thumbnail, thumbnail_index) = match self
            .collaborators
            .thumbnailer
            .make_thumbnails(&local_file, key, item.duration_seconds)
            .await
        {
            Ok(set) => (set.thumbnail, set.index),
            Err(e) => {
                tracing::error!(
                    error = %format!("{:#}", e),
                    key = %key,
                    "Failed to create thumbnails"
                );
                (String::new(), THUMBNAIL_ERROR.to_string())
            }
        };

        let screenshot = match self.collaborators.screenshots.capture(url).await {
            Ok(screenshot) => screenshot,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to capture screenshot");
                None
            }
        };

        let status = if already_archived {
            ArchiveStatus::AlreadyArchived
        } else {
            ArchiveStatus::Success
        };

        Ok(ArchiveResult::builder(status)
            .cdn_url(cdn_url)
            .thumbnail(thumbnail)
            .thumbnail_index(thumbnail_index)
            .duration(item.duration_seconds)
            .title(item.title.clone())
            .timestamp(item.created_at)
            .hash(hash)
            .screenshot(screenshot)
            .build())
    }
}

fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()?
        .host_str()
        .map(str::to_ascii_lowercase)
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// A tweet whose media lives elsewhere (a linked YouTube video, say).
fn is_linked_video(url: &str, item: &MediaItem) -> bool {
    let on_twitter = |u: &str| {
        host_of(u)
            .map(|host| TWITTER_DOMAINS.iter().any(|d| host_matches(&host, d)))
            .unwrap_or(false)
    };
    match item.webpage_url {
        Some(ref page) => on_twitter(url) && !on_twitter(page),
        None => false,
    }
}

#[async_trait]
impl Archiver for PlatformArchiver {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self), fields(archiver = %self.name))]
    async fn download(&self, url: &str, check_if_exists: bool) -> ArchiveOutcome {
        if !self.handles(url) {
            return ArchiveOutcome::NotApplicable;
        }

        let item = match self.collaborators.extractor.probe(url).await {
            Ok(MediaListing::Single(item)) => item,
            Ok(MediaListing::Multiple(items)) => {
                tracing::warn!(
                    count = items.len(),
                    "Cannot archive pages with multiple videos"
                );
                return ArchiveOutcome::NotApplicable;
            }
            Err(ExtractError::NoMedia(reason)) => {
                tracing::debug!(reason = %reason, "No media found");
                return ArchiveOutcome::NotApplicable;
            }
            Err(ExtractError::InvalidUrl(reason)) => {
                tracing::warn!(reason = %reason, "Invalid URL");
                return ArchiveOutcome::Completed(ArchiveResult::with_status(
                    ArchiveStatus::InvalidUrl,
                ));
            }
            Err(ExtractError::Live) => {
                tracing::warn!("Live streaming media, not archiving now");
                return ArchiveOutcome::Completed(ArchiveResult::with_status(
                    ArchiveStatus::NotArchivableYet,
                ));
            }
            Err(ExtractError::Failed(detail)) => {
                tracing::warn!(error = %detail, "Media extraction failed");
                return ArchiveOutcome::Completed(ArchiveResult::with_status(
                    ArchiveStatus::Failed(detail),
                ));
            }
        };

        if is_linked_video(url, &item) {
            tracing::info!("Linked video in a tweet, leaving it to other archivers");
            return ArchiveOutcome::NotApplicable;
        }

        let key = self.key_for(&item);
        tracing::info!(key = %key, "Found media");

        let scratch = match self.scratch().await {
            Ok(dir) => dir,
            Err(e) => {
                return ArchiveOutcome::Completed(ArchiveResult::with_status(
                    ArchiveStatus::Failed(format!("{:#}", e)),
                ))
            }
        };

        let result = match self
            .archive_item(url, &item, &key, check_if_exists, scratch.path())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), key = %key, "Archiving failed");
                ArchiveResult::with_status(ArchiveStatus::Failed(format!("{:#}", e)))
            }
        };

        if let Err(e) = scratch.close() {
            tracing::debug!(error = %e, "Scratch dir already removed");
        }

        ArchiveOutcome::Completed(result)
    }
}
