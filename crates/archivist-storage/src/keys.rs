//! Shared key handling for storage backends.
//!
//! Full key format: `{folder}/{key}`, or just `{key}` when the run folder is empty.

use crate::{StorageError, StorageResult};

/// Join the run folder and a logical key, validating both.
pub fn full_key(folder: &str, key: &str) -> StorageResult<String> {
    let folder = folder.trim_matches('/');
    let full = if folder.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", folder, key)
    };
    validate(&full)?;
    Ok(full)
}

fn validate(full: &str) -> StorageResult<()> {
    if full.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if full.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {}",
            full
        )));
    }
    if full.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains an empty or '..' segment: {}",
            full
        )));
    }
    Ok(())
}

/// Split a validated full key into its folder segments and file name.
pub fn split_path(full: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = full.split('/').collect();
    let filename = parts.pop().unwrap_or_default();
    (parts, filename)
}

/// Percent-encode each segment of a key for use in a URL path.
pub fn encode_url_path(full: &str) -> String {
    full.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
