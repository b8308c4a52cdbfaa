//! Configuration module
//!
//! Configuration is read once from the environment (optionally seeded from a
//! `.env` file) and validated before any storage backend or archiver is built.
//! Optional settings are explicit `Option` fields; nothing is probed later.

use std::env;

use crate::storage_types::{StorageBackend, Visibility};

const SCRATCH_DIR: &str = "tmp";
const GD_SERVICE_ACCOUNT: &str = "service_account.json";
const GD_RETRY_ATTEMPTS: u32 = 1;
const GD_RETRY_INTERVAL_SECS: u64 = 10;
const THUMBNAIL_COUNT: usize = 5;

/// Archivist settings, grouped by concern.
#[derive(Clone, Debug)]
pub struct ArchivistConfig {
    pub environment: String,
    // Execution
    pub storage_backend: StorageBackend,
    pub storage_folder: String,
    pub check_if_exists: bool,
    pub scratch_dir: String,
    // S3 storage
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub s3_cdn_url: Option<String>,
    pub s3_private: bool,
    pub aws_region: Option<String>,
    // Google Drive storage
    pub gd_root_folder_id: Option<String>,
    pub gd_service_account: String,
    pub gd_retry_attempts: u32,
    pub gd_retry_interval_secs: u64,
    // Local storage
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // External tools
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    pub thumbnail_count: usize,
    pub facebook_cookie: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ArchivistConfig>);

impl Config {
    fn inner(&self) -> &ArchivistConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = ArchivistConfig::from_lookup(|key| env::var(key).ok())?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Override the per-run folder prepended to every storage key.
    pub fn set_folder(&mut self, folder: impl Into<String>) {
        self.0.storage_folder = folder.into();
    }

    pub fn set_check_if_exists(&mut self, check_if_exists: bool) {
        self.0.check_if_exists = check_if_exists;
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn storage_folder(&self) -> &str {
        &self.inner().storage_folder
    }

    pub fn check_if_exists(&self) -> bool {
        self.inner().check_if_exists
    }

    pub fn scratch_dir(&self) -> &str {
        &self.inner().scratch_dir
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn s3_cdn_url(&self) -> Option<&str> {
        self.inner().s3_cdn_url.as_deref()
    }

    pub fn s3_visibility(&self) -> Visibility {
        Visibility::from_private_flag(self.inner().s3_private)
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn gd_root_folder_id(&self) -> Option<&str> {
        self.inner().gd_root_folder_id.as_deref()
    }

    pub fn gd_service_account(&self) -> &str {
        &self.inner().gd_service_account
    }

    pub fn gd_retry_attempts(&self) -> u32 {
        self.inner().gd_retry_attempts
    }

    pub fn gd_retry_interval_secs(&self) -> u64 {
        self.inner().gd_retry_interval_secs
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn ytdlp_path(&self) -> &str {
        &self.inner().ytdlp_path
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn thumbnail_count(&self) -> usize {
        self.inner().thumbnail_count
    }

    pub fn facebook_cookie(&self) -> Option<&str> {
        self.inner().facebook_cookie.as_deref()
    }
}

fn parse_number<T: std::str::FromStr>(
    value: Option<String>,
    default: T,
    message: &'static str,
) -> Result<T, anyhow::Error> {
    match value {
        Some(s) => s.trim().parse().map_err(|_| anyhow::anyhow!(message)),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|s| s.trim().to_lowercase())
        .and_then(|s| match s.as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl ArchivistConfig {
    /// Build the configuration from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(s) => s.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let gd_retry_attempts = parse_number(
            non_empty("GD_RETRY_ATTEMPTS"),
            GD_RETRY_ATTEMPTS,
            "GD_RETRY_ATTEMPTS must be a positive integer",
        )?;
        let gd_retry_interval_secs = parse_number(
            non_empty("GD_RETRY_INTERVAL_SECS"),
            GD_RETRY_INTERVAL_SECS,
            "GD_RETRY_INTERVAL_SECS must be a whole number of seconds",
        )?;
        let thumbnail_count = parse_number(
            non_empty("THUMBNAIL_COUNT"),
            THUMBNAIL_COUNT,
            "THUMBNAIL_COUNT must be a positive integer",
        )?;

        let config = ArchivistConfig {
            environment: non_empty("ENVIRONMENT")
                .or_else(|| non_empty("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            storage_backend,
            storage_folder: lookup("STORAGE_FOLDER")
                .map(|s| s.trim().trim_matches('/').to_string())
                .unwrap_or_default(),
            check_if_exists: parse_bool(lookup("CHECK_IF_EXISTS"), false),
            scratch_dir: non_empty("SCRATCH_DIR").unwrap_or_else(|| SCRATCH_DIR.to_string()),
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION"),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            s3_cdn_url: non_empty("S3_CDN_URL"),
            s3_private: parse_bool(lookup("S3_PRIVATE"), false),
            aws_region: non_empty("AWS_REGION"),
            gd_root_folder_id: non_empty("GD_ROOT_FOLDER_ID"),
            gd_service_account: non_empty("GD_SERVICE_ACCOUNT")
                .unwrap_or_else(|| GD_SERVICE_ACCOUNT.to_string()),
            gd_retry_attempts,
            gd_retry_interval_secs,
            local_storage_path: non_empty("LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty("LOCAL_STORAGE_BASE_URL"),
            ytdlp_path: non_empty("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            ffmpeg_path: non_empty("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            thumbnail_count,
            facebook_cookie: non_empty("FACEBOOK_COOKIE"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage_folder.contains("..") {
            return Err(anyhow::anyhow!("STORAGE_FOLDER must not contain '..'"));
        }
        if self.thumbnail_count == 0 {
            return Err(anyhow::anyhow!("THUMBNAIL_COUNT must be at least 1"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::GoogleDrive => {
                if self.gd_root_folder_id.is_none() {
                    return Err(anyhow::anyhow!(
                        "GD_ROOT_FOLDER_ID must be set when using Google Drive storage backend"
                    ));
                }
                if self.gd_retry_attempts == 0 {
                    return Err(anyhow::anyhow!("GD_RETRY_ATTEMPTS must be at least 1"));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ArchivistConfig, anyhow::Error> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ArchivistConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_s3_and_requires_bucket() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));

        let config = config_from(&[("S3_BUCKET", "media"), ("AWS_REGION", "eu-west-1")]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::S3);
        assert!(!config.s3_private);
        assert!(!config.check_if_exists);
        assert_eq!(config.scratch_dir, "tmp");
    }

    #[test]
    fn google_drive_settings() {
        let config = config_from(&[
            ("STORAGE_BACKEND", "gd"),
            ("GD_ROOT_FOLDER_ID", "root-123"),
            ("GD_RETRY_ATTEMPTS", "3"),
            ("GD_RETRY_INTERVAL_SECS", "2"),
            ("STORAGE_FOLDER", "/sheet-a/"),
        ])
        .unwrap();

        assert_eq!(config.storage_backend, StorageBackend::GoogleDrive);
        assert_eq!(config.gd_root_folder_id.as_deref(), Some("root-123"));
        assert_eq!(config.gd_service_account, "service_account.json");
        assert_eq!(config.gd_retry_attempts, 3);
        assert_eq!(config.gd_retry_interval_secs, 2);
        assert_eq!(config.storage_folder, "sheet-a");
    }

    #[test]
    fn google_drive_rejects_zero_attempts() {
        let err = config_from(&[
            ("STORAGE_BACKEND", "gd"),
            ("GD_ROOT_FOLDER_ID", "root-123"),
            ("GD_RETRY_ATTEMPTS", "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let base = [("STORAGE_BACKEND", "gd"), ("GD_ROOT_FOLDER_ID", "root-123")];
        for (key, value) in [
            ("GD_RETRY_ATTEMPTS", "three"),
            ("GD_RETRY_INTERVAL_SECS", "1.5"),
            ("GD_RETRY_INTERVAL_SECS", "-2"),
            ("THUMBNAIL_COUNT", "many"),
            ("THUMBNAIL_COUNT", "0"),
        ] {
            let mut pairs = base.to_vec();
            pairs.push((key, value));
            let err = config_from(&pairs).unwrap_err();
            assert!(err.to_string().contains(key), "{key}={value}: {err}");
        }
    }

    #[test]
    fn local_requires_path() {
        assert!(config_from(&[("STORAGE_BACKEND", "local")]).is_err());

        let config = config_from(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/var/archive"),
            ("CHECK_IF_EXISTS", "true"),
        ])
        .unwrap();
        assert!(config.check_if_exists);
        assert_eq!(config.local_storage_base_url, None);
    }

    #[test]
    fn rejects_traversal_in_folder() {
        let err = config_from(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/var/archive"),
            ("STORAGE_FOLDER", "../etc"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("STORAGE_FOLDER"));
    }

    #[test]
    fn config_overrides() {
        let inner = config_from(&[("S3_BUCKET", "media"), ("S3_REGION", "us-east-1")]).unwrap();
        let mut config = Config(Box::new(inner));
        config.set_folder("run-42");
        config.set_check_if_exists(true);
        assert_eq!(config.storage_folder(), "run-42");
        assert!(config.check_if_exists());
        assert_eq!(config.s3_visibility(), Visibility::Public);
    }
}
