//! Media extraction: metadata probing and media download.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Nothing downloadable behind the URL (a text post, an image gallery, ...).
    #[error("No media found: {0}")]
    NoMedia(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Live stream that has not finished yet.
    #[error("Media is live")]
    Live,

    #[error("Extraction failed: {0}")]
    Failed(String),
}

/// One downloadable media item.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub id: String,
    pub extension: String,
    pub duration_seconds: Option<f64>,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Canonical page the media was extracted from.
    pub webpage_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaListing {
    Single(MediaItem),
    /// Playlists, channels and multi-video posts.
    Multiple(Vec<MediaItem>),
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Read metadata without downloading.
    async fn probe(&self, url: &str) -> Result<MediaListing, ExtractError>;

    /// Download `item` into `dest_dir` and return the local file path.
    async fn fetch(&self, url: &str, item: &MediaItem, dest_dir: &Path)
        -> Result<PathBuf, ExtractError>;
}

/// [`MediaExtractor`] that shells out to `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    ytdlp_path: String,
    facebook_cookie: Option<String>,
}

impl YtDlpExtractor {
    pub fn new(ytdlp_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            facebook_cookie: None,
        }
    }

    /// Cookie header sent with facebook.com requests.
    pub fn with_facebook_cookie(mut self, cookie: Option<String>) -> Self {
        self.facebook_cookie = cookie;
        self
    }

    fn command(&self, url: &str) -> Command {
        let mut command = Command::new(&self.ytdlp_path);
        command.args(["--no-warnings", "--no-progress"]);
        if let Some(ref cookie) = self.facebook_cookie {
            if is_facebook(url) {
                tracing::debug!("Using Facebook cookie");
                command.arg("--add-header").arg(format!("Cookie:{}", cookie));
            }
        }
        command
    }
}

fn is_facebook(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .map(|host| host == "facebook.com" || host.ends_with(".facebook.com"))
        .unwrap_or(false)
}

/// yt-dlp messages meaning the page was reachable but holds no media.
const NO_MEDIA_MARKERS: &[&str] = &[
    "Unsupported URL",
    "No video formats found",
    "There's no video",
    "No video could be found",
    "No media found",
    "does not contain any video",
    "This tweet does not contain",
];

/// Map a failed yt-dlp run to an error from its stderr.
///
/// Only messages about the page itself count as "no media". Network and
/// HTTP failures stay `Failed` so they surface in the result.
fn classify_failure(stderr: &str) -> ExtractError {
    let message = stderr
        .lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .unwrap_or_else(|| stderr.trim())
        .to_string();

    if message.contains("is not a valid URL") {
        ExtractError::InvalidUrl(message)
    } else if message.contains("live event will begin") || message.contains("Premieres in") {
        ExtractError::Live
    } else if NO_MEDIA_MARKERS.iter().any(|m| message.contains(m)) {
        ExtractError::NoMedia(message)
    } else {
        ExtractError::Failed(message)
    }
}

fn string_field(info: &Value, field: &str) -> Option<String> {
    match info.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_created_at(info: &Value) -> Option<DateTime<Utc>> {
    if let Some(ts) = info.get("timestamp").and_then(Value::as_f64) {
        return Utc.timestamp_opt(ts.trunc() as i64, 0).single();
    }
    let upload_date = info.get("upload_date").and_then(Value::as_str)?;
    let date = NaiveDate::parse_from_str(upload_date, "%Y%m%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn parse_item(info: &Value) -> Result<MediaItem, ExtractError> {
    let id = string_field(info, "id")
        .ok_or_else(|| ExtractError::Failed("yt-dlp output has no id".to_string()))?;

    Ok(MediaItem {
        id,
        extension: string_field(info, "ext").unwrap_or_else(|| "mp4".to_string()),
        duration_seconds: info.get("duration").and_then(Value::as_f64),
        title: string_field(info, "title"),
        created_at: parse_created_at(info),
        webpage_url: string_field(info, "webpage_url"),
    })
}

fn is_live(info: &Value) -> bool {
    info.get("is_live").and_then(Value::as_bool).unwrap_or(false)
}

/// Turn `--dump-single-json` output into a listing.
pub(crate) fn parse_listing(info: &Value) -> Result<MediaListing, ExtractError> {
    if is_live(info) {
        return Err(ExtractError::Live);
    }

    match info.get("entries").and_then(Value::as_array) {
        None => Ok(MediaListing::Single(parse_item(info)?)),
        Some(entries) => {
            let entries: Vec<&Value> = entries.iter().filter(|e| !e.is_null()).collect();
            match entries.as_slice() {
                [] => Err(ExtractError::NoMedia("playlist has no entries".to_string())),
                [entry] => {
                    if is_live(entry) {
                        return Err(ExtractError::Live);
                    }
                    Ok(MediaListing::Single(parse_item(entry)?))
                }
                many => Ok(MediaListing::Multiple(
                    many.iter()
                        .map(|e| parse_item(e))
                        .collect::<Result<Vec<_>, _>>()?,
                )),
            }
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    #[tracing::instrument(skip(self), fields(process.executable.name = "yt-dlp"))]
    async fn probe(&self, url: &str) -> Result<MediaListing, ExtractError> {
        let output = self
            .command(url)
            .args(["--dump-single-json", "--skip-download", "--"])
            .arg(url)
            .output()
            .await
            .map_err(|e| ExtractError::Failed(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = classify_failure(&String::from_utf8_lossy(&output.stderr));
            tracing::debug!(error = %error, "yt-dlp probe failed");
            return Err(error);
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractError::Failed(format!("Invalid yt-dlp JSON: {}", e)))?;
        parse_listing(&info)
    }

    #[tracing::instrument(
        skip(self, item),
        fields(process.executable.name = "yt-dlp", media.id = %item.id)
    )]
    async fn fetch(
        &self,
        url: &str,
        item: &MediaItem,
        dest_dir: &Path,
    ) -> Result<PathBuf, ExtractError> {
        let template = dest_dir.join("%(id)s.%(ext)s");
        let output = self
            .command(url)
            .arg("--no-playlist")
            .arg("--output")
            .arg(&template)
            .arg("--")
            .arg(url)
            .output()
            .await
            .map_err(|e| ExtractError::Failed(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        let expected = dest_dir.join(format!("{}.{}", item.id, item.extension));
        if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Ok(expected);
        }

        // Merged formats can end up in a different container than probed
        let mut entries = tokio::fs::read_dir(dest_dir)
            .await
            .map_err(|e| ExtractError::Failed(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ExtractError::Failed(e.to_string()))?
        {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(item.id.as_str()) {
                return Ok(path);
            }
        }

        Err(ExtractError::Failed(format!(
            "yt-dlp finished but no file for {} was written",
            item.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_video() {
        let info = json!({
            "id": "dQw4w9WgXcQ",
            "ext": "webm",
            "title": "A video",
            "duration": 212.0,
            "timestamp": 1256453460,
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        });

        let listing = parse_listing(&info).unwrap();
        let MediaListing::Single(item) = listing else {
            panic!("expected a single item");
        };
        assert_eq!(item.id, "dQw4w9WgXcQ");
        assert_eq!(item.extension, "webm");
        assert_eq!(item.duration_seconds, Some(212.0));
        assert_eq!(item.title.as_deref(), Some("A video"));
        assert_eq!(
            item.created_at,
            Utc.timestamp_opt(1256453460, 0).single()
        );
    }

    #[test]
    fn upload_date_used_without_timestamp() {
        let info = json!({ "id": "1", "upload_date": "20220315" });
        let MediaListing::Single(item) = parse_listing(&info).unwrap() else {
            panic!("expected a single item");
        };
        assert_eq!(
            item.created_at,
            Utc.with_ymd_and_hms(2022, 3, 15, 0, 0, 0).single()
        );
        assert_eq!(item.extension, "mp4");
    }

    #[test]
    fn single_entry_playlist_is_unwrapped() {
        let info = json!({ "_type": "playlist", "entries": [{ "id": "only", "ext": "mp4" }] });
        assert!(matches!(
            parse_listing(&info).unwrap(),
            MediaListing::Single(item) if item.id == "only"
        ));
    }

    #[test]
    fn multiple_entries() {
        let info = json!({ "entries": [{ "id": "a" }, { "id": "b" }] });
        assert!(matches!(
            parse_listing(&info).unwrap(),
            MediaListing::Multiple(items) if items.len() == 2
        ));
    }

    #[test]
    fn empty_playlist_has_no_media() {
        let info = json!({ "entries": [] });
        assert!(matches!(parse_listing(&info), Err(ExtractError::NoMedia(_))));
    }

    #[test]
    fn live_stream() {
        let info = json!({ "id": "x", "is_live": true });
        assert!(matches!(parse_listing(&info), Err(ExtractError::Live)));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let info = json!({ "id": 7012345678_u64 });
        let MediaListing::Single(item) = parse_listing(&info).unwrap() else {
            panic!("expected a single item");
        };
        assert_eq!(item.id, "7012345678");
    }

    #[test]
    fn classifies_stderr() {
        assert!(matches!(
            classify_failure("ERROR: [generic] 'nope' is not a valid URL."),
            ExtractError::InvalidUrl(_)
        ));
        assert!(matches!(
            classify_failure("WARNING: x\nERROR: Unsupported URL: https://example.com"),
            ExtractError::NoMedia(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: [youtube] x: This live event will begin in 3 hours."),
            ExtractError::Live
        ));
        assert!(matches!(
            classify_failure("ERROR: [twitter] 1: No video could be found in this tweet"),
            ExtractError::NoMedia(_)
        ));
        assert!(matches!(classify_failure("Segmentation fault"), ExtractError::Failed(_)));
    }

    #[test]
    fn network_errors_are_failures() {
        for stderr in [
            "ERROR: [youtube] abc: Unable to download webpage: <urlopen error [Errno -3] \
             Temporary failure in name resolution> (caused by TransportError)",
            "ERROR: [tiktok] 7012: Unable to download webpage: HTTP Error 503: Service Unavailable",
            "ERROR: [generic] Unable to download webpage: The read operation timed out",
        ] {
            let error = classify_failure(stderr);
            assert!(matches!(error, ExtractError::Failed(_)), "{stderr}: {error:?}");
        }
    }

    #[test]
    fn facebook_detection() {
        assert!(is_facebook("https://www.facebook.com/watch?v=1"));
        assert!(is_facebook("https://facebook.com/x"));
        assert!(!is_facebook("https://notfacebook.com/x"));
        assert!(!is_facebook("not a url"));
    }
}
