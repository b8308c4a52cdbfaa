//! Archive result contract shared by every archiver.
//!
//! An [`ArchiveResult`] is produced exactly once per archive attempt and is never
//! mutated afterwards. Construct one through [`ArchiveResult::builder`].

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Outcome status of one archive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// Media fetched and uploaded.
    Success,
    /// The storage key already existed; nothing was uploaded.
    AlreadyArchived,
    /// The extractor rejected the URL as malformed.
    InvalidUrl,
    /// Live or streaming content that cannot be archived yet.
    NotArchivableYet,
    /// Metadata was found but the media itself could not be fetched.
    CouldNotDownload { already_archived: bool },
    /// Transport or unexpected failure, with diagnostic detail.
    Failed(String),
}

impl ArchiveStatus {
    /// Whether the attempt left the media in storage.
    pub fn is_archived(&self) -> bool {
        matches!(
            self,
            ArchiveStatus::Success
                | ArchiveStatus::AlreadyArchived
                | ArchiveStatus::CouldNotDownload {
                    already_archived: true
                }
        )
    }
}

impl Display for ArchiveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ArchiveStatus::Success => write!(f, "success"),
            ArchiveStatus::AlreadyArchived => write!(f, "already archived"),
            ArchiveStatus::InvalidUrl => write!(f, "Invalid URL"),
            ArchiveStatus::NotArchivableYet => {
                write!(f, "Streaming media: not archivable yet")
            }
            ArchiveStatus::CouldNotDownload {
                already_archived: false,
            } => write!(f, "Could not download media"),
            ArchiveStatus::CouldNotDownload {
                already_archived: true,
            } => write!(f, "Could not download media, but already archived"),
            ArchiveStatus::Failed(detail) => write!(f, "Archiver error: {}", detail),
        }
    }
}

impl Serialize for ArchiveStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Immutable record describing the outcome of one archive attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveResult {
    status: ArchiveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    cdn_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screenshot: Option<String>,
}

impl ArchiveResult {
    pub fn builder(status: ArchiveStatus) -> ArchiveResultBuilder {
        ArchiveResultBuilder {
            inner: ArchiveResult {
                status,
                cdn_url: None,
                thumbnail: None,
                thumbnail_index: None,
                duration: None,
                title: None,
                timestamp: None,
                hash: None,
                screenshot: None,
            },
        }
    }

    /// Terminal result carrying only a status.
    pub fn with_status(status: ArchiveStatus) -> Self {
        Self::builder(status).build()
    }

    pub fn status(&self) -> &ArchiveStatus {
        &self.status
    }

    pub fn cdn_url(&self) -> Option<&str> {
        self.cdn_url.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn thumbnail_index(&self) -> Option<&str> {
        self.thumbnail_index.as_deref()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn screenshot(&self) -> Option<&str> {
        self.screenshot.as_deref()
    }
}

/// Builder for [`ArchiveResult`]. Consumed by [`ArchiveResultBuilder::build`].
#[derive(Debug, Clone)]
pub struct ArchiveResultBuilder {
    inner: ArchiveResult,
}

impl ArchiveResultBuilder {
    pub fn cdn_url(mut self, cdn_url: Option<String>) -> Self {
        self.inner.cdn_url = cdn_url;
        self
    }

    pub fn thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.inner.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn thumbnail_index(mut self, thumbnail_index: impl Into<String>) -> Self {
        self.inner.thumbnail_index = Some(thumbnail_index.into());
        self
    }

    /// Negative or non-finite durations are dropped.
    pub fn duration(mut self, duration: Option<f64>) -> Self {
        self.inner.duration = duration.filter(|d| d.is_finite() && *d >= 0.0);
        self
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.inner.title = title;
        self
    }

    pub fn timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.inner.timestamp = timestamp;
        self
    }

    pub fn hash(mut self, hash: Option<String>) -> Self {
        self.inner.hash = hash;
        self
    }

    pub fn screenshot(mut self, screenshot: Option<String>) -> Self {
        self.inner.screenshot = screenshot;
        self
    }

    pub fn build(self) -> ArchiveResult {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_strings_match_sheet_values() {
        assert_eq!(ArchiveStatus::Success.to_string(), "success");
        assert_eq!(ArchiveStatus::AlreadyArchived.to_string(), "already archived");
        assert_eq!(ArchiveStatus::InvalidUrl.to_string(), "Invalid URL");
        assert_eq!(
            ArchiveStatus::CouldNotDownload {
                already_archived: true
            }
            .to_string(),
            "Could not download media, but already archived"
        );
        assert!(ArchiveStatus::Failed("timeout".to_string())
            .to_string()
            .ends_with("timeout"));
    }

    #[test]
    fn archived_statuses() {
        assert!(ArchiveStatus::Success.is_archived());
        assert!(ArchiveStatus::AlreadyArchived.is_archived());
        assert!(!ArchiveStatus::InvalidUrl.is_archived());
        assert!(!ArchiveStatus::NotArchivableYet.is_archived());
        assert!(!ArchiveStatus::CouldNotDownload {
            already_archived: false
        }
        .is_archived());
    }

    #[test]
    fn builder_drops_negative_duration() {
        let result = ArchiveResult::builder(ArchiveStatus::Success)
            .duration(Some(-1.0))
            .build();
        assert_eq!(result.duration(), None);

        let result = ArchiveResult::builder(ArchiveStatus::Success)
            .duration(Some(12.5))
            .build();
        assert_eq!(result.duration(), Some(12.5));
    }

    #[test]
    fn serializes_status_as_string_and_skips_empty_fields() {
        let timestamp = Utc.with_ymd_and_hms(2022, 3, 1, 12, 0, 0).unwrap();
        let result = ArchiveResult::builder(ArchiveStatus::AlreadyArchived)
            .cdn_url(Some("https://cdn.example.com/a.mp4".to_string()))
            .timestamp(Some(timestamp))
            .build();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "already archived");
        assert_eq!(json["cdn_url"], "https://cdn.example.com/a.mp4");
        assert_eq!(json["timestamp"], "2022-03-01T12:00:00Z");
        assert!(json.get("hash").is_none());
        assert!(json.get("thumbnail").is_none());
    }
}
