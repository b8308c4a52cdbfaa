//! Archivist Storage Library
//!
//! This crate provides the storage abstraction used by archivers and its three
//! implementations: a flat-key object store (S3), a hierarchical folder store
//! (Google Drive) and a local filesystem mirror.
//!
//! # Storage key format
//!
//! Callers pass logical keys such as `tiktok_7012345.mp4`. Every backend prepends
//! its run folder, so the backend sees `{folder}/{key}`:
//!
//! - **S3**: the full key is the object path.
//! - **Google Drive**: each `/`-separated segment but the last is a folder under
//!   the configured root folder; the last segment is the file name.
//! - **Local**: the full key is a path relative to the storage directory.
//!
//! Keys must not contain `..`, a leading `/` or empty segments. Key handling is
//! centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-gdrive")]
pub mod gdrive;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use archivist_core::{StorageBackend, Visibility};
pub use factory::create_storage;
#[cfg(feature = "storage-gdrive")]
pub use gdrive::{
    DriveClient, DriveFile, GDriveStorage, HttpDriveClient, PathResolver, ResolutionCache,
    ResolveMode, RetryPolicy, ServiceAccountAuth,
};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Config, S3Storage};
pub use traits::{Storage, StorageError, StorageResult, UploadOptions};
