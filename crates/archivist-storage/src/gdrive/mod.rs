//! Google Drive backend.
//!
//! Drive has no flat key space: every key is walked folder by folder from the
//! configured root, which is what [`PathResolver`] does. Folder lookups are
//! cached in a [`ResolutionCache`] shared by every storage built from it.

mod auth;
mod client;
mod resolver;
mod storage;

pub use auth::{ServiceAccountAuth, TokenProvider};
pub use client::{DriveClient, DriveFile, HttpDriveClient};
pub use resolver::{CacheKey, PathResolver, ResolutionCache, ResolveMode, RetryPolicy};
pub use storage::GDriveStorage;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
