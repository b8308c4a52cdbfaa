//! Archivist Core Library
//!
//! This crate provides the domain types shared by every Archivist component:
//! the archive result contract, the storage backend enum, and configuration.

pub mod config;
pub mod result;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use result::{ArchiveResult, ArchiveResultBuilder, ArchiveStatus};
pub use storage_types::{StorageBackend, Visibility};
// Note: Storage, StorageError, StorageResult live in the archivist-storage crate
