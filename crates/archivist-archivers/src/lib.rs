//! Archivist Archivers
//!
//! Platform archivers turn a URL into an [`ArchiveResult`]: they probe the URL
//! through a [`MediaExtractor`], persist the media to a [`Storage`] backend and
//! collect the hash, thumbnails and screenshot that go with it.
//!
//! The collaborators (extractor, thumbnailer, hasher, screenshot capturer) are
//! traits so each can be replaced independently; the default adapters shell out
//! to `yt-dlp` and `ffmpeg`.
//!
//! [`ArchiveResult`]: archivist_core::ArchiveResult
//! [`Storage`]: archivist_storage::Storage

pub mod archiver;
pub mod chain;
pub mod extractor;
pub mod hashing;
pub mod platform;
pub mod screenshot;
pub mod thumbnails;

pub use archiver::{ArchiveOutcome, Archiver};
pub use chain::ArchiverChain;
pub use extractor::{ExtractError, MediaExtractor, MediaItem, MediaListing, YtDlpExtractor};
pub use hashing::{ContentHasher, Sha256Hasher};
pub use platform::{Collaborators, PlatformArchiver};
pub use screenshot::{DisabledScreenshots, ScreenshotCapturer};
pub use thumbnails::{FfmpegThumbnailer, ThumbnailGenerator, ThumbnailSet};
