use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[async_trait]
pub trait ContentHasher: Send + Sync {
    /// Hex digest of a local file.
    async fn hash(&self, local_file: &Path) -> Result<String>;
}

/// SHA-256 over the file contents, streamed in chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

#[async_trait]
impl ContentHasher for Sha256Hasher {
    async fn hash(&self, local_file: &Path) -> Result<String> {
        let mut file = tokio::fs::File::open(local_file)
            .await
            .with_context(|| format!("Failed to open {} for hashing", local_file.display()))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .context("Failed to read file for hashing")?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let digest = Sha256Hasher.hash(&path).await.unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Sha256Hasher.hash(&dir.path().join("missing")).await.is_err());
    }
}
