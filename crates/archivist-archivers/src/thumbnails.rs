//! Thumbnail generation.

use anyhow::{anyhow, bail, Context, Result};
use archivist_storage::{Storage, UploadOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// Frame rate used when the media duration is unknown.
const DEFAULT_FPS: f64 = 0.5;
const THUMBNAIL_WIDTH: u32 = 512;

/// Stored thumbnails for one media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSet {
    /// URL of the representative frame.
    pub thumbnail: String,
    /// URL of an HTML page listing every frame.
    pub index: String,
}

#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn make_thumbnails(
        &self,
        local_file: &Path,
        base_key: &str,
        duration: Option<f64>,
    ) -> Result<ThumbnailSet>;
}

/// Extracts frames with `ffmpeg` and stores them next to the media under
/// `{key without extension}/`.
pub struct FfmpegThumbnailer {
    ffmpeg_path: String,
    storage: Arc<dyn Storage>,
    count: usize,
}

impl FfmpegThumbnailer {
    pub fn new(ffmpeg_path: impl Into<String>, storage: Arc<dyn Storage>, count: usize) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            storage,
            count: count.max(1),
        }
    }

    fn fps(&self, duration: Option<f64>) -> f64 {
        match duration {
            Some(d) if d.is_finite() && d > 0.0 => self.count as f64 / d,
            _ => DEFAULT_FPS,
        }
    }

    async fn extract_frames(&self, local_file: &Path, out_dir: &Path, fps: f64) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(local_file)
            .arg("-vf")
            .arg(format!("fps={},scale={}:-1", fps, THUMBNAIL_WIDTH))
            .arg("-frames:v")
            .arg(self.count.to_string())
            .arg(out_dir.join("out%d.jpg"))
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffmpeg failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(())
    }

    async fn store(&self, local: &Path, key: &str) -> Result<String> {
        self.storage
            .upload(local, key, &UploadOptions::default())
            .await
            .with_context(|| format!("Failed to upload {}", key))?;
        self.storage
            .get_cdn_url(key)
            .await
            .with_context(|| format!("Failed to resolve URL for {}", key))
    }
}

/// Frames written by ffmpeg, in frame order.
async fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jpg") {
            frames.push(path);
        }
    }
    frames.sort_by_key(|p| frame_number(p));
    Ok(frames)
}

fn frame_number(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("out"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

fn key_stem(base_key: &str) -> &str {
    match base_key.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() && !stem.ends_with('/') => stem,
        _ => base_key,
    }
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub(crate) fn index_page(title: &str, urls: &[String]) -> String {
    let mut page = format!(
        "<html><head><title>{}</title><meta charset=\"UTF-8\"></head><body>",
        html_escape(title)
    );
    for url in urls {
        page.push_str(&format!("<img src=\"{}\" />", html_escape(url)));
    }
    page.push_str("</body></html>");
    page
}

#[async_trait]
impl ThumbnailGenerator for FfmpegThumbnailer {
    #[tracing::instrument(skip(self, local_file), fields(process.executable.name = "ffmpeg"))]
    async fn make_thumbnails(
        &self,
        local_file: &Path,
        base_key: &str,
        duration: Option<f64>,
    ) -> Result<ThumbnailSet> {
        let stem = key_stem(base_key);
        let out_dir = local_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}_thumbnails", stem.replace('/', "_")));
        tokio::fs::create_dir_all(&out_dir)
            .await
            .context("Failed to create thumbnail directory")?;

        self.extract_frames(local_file, &out_dir, self.fps(duration))
            .await?;

        let frames = list_frames(&out_dir).await?;
        if frames.is_empty() {
            bail!("ffmpeg produced no frames for {}", local_file.display());
        }

        let mut urls = Vec::with_capacity(frames.len());
        for frame in &frames {
            let name = frame
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Invalid frame file name"))?;
            urls.push(self.store(frame, &format!("{}/{}", stem, name)).await?);
        }

        let index_path = out_dir.join("index.html");
        let title = local_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        tokio::fs::write(&index_path, index_page(&title, &urls))
            .await
            .context("Failed to write thumbnail index")?;
        let index = self
            .store(&index_path, &format!("{}/index.html", stem))
            .await?;

        tracing::debug!(frames = urls.len(), "Thumbnails stored");

        Ok(ThumbnailSet {
            thumbnail: urls[urls.len() / 10].clone(),
            index,
        })
    }
}
