use crate::keys;
use crate::traits::{Storage, StorageError, StorageResult, UploadOptions};
use crate::{StorageBackend, Visibility};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue};
use http::Method;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ClientOptions, ObjectStore, ObjectStoreExt, PutPayload};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of presigned URLs handed out for private buckets.
const PRESIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// S3 storage settings
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers
    /// (e.g. "http://localhost:9000" for MinIO, "https://nyc3.digitaloceanspaces.com" for DigitalOcean Spaces)
    pub endpoint_url: Option<String>,
    /// Public URL template. `{bucket}`, `{region}` and `{key}` are substituted;
    /// without a `{key}` placeholder the key is appended as a path.
    pub cdn_url: Option<String>,
    pub visibility: Visibility,
    pub folder: String,
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    // Same bucket, every request carrying `x-amz-acl: public-read`
    public_store: Option<Arc<dyn ObjectStore>>,
    signer: Option<Arc<dyn Signer>>,
    config: S3Config,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Credentials are taken from the environment (`AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY`, ...).
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let private_store = Arc::new(
            Self::builder(&config)
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-amz-acl", HeaderValue::from_static("public-read"));
        let public_store = Self::builder(&config)
            .with_client_options(ClientOptions::new().with_default_headers(headers))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store: private_store.clone(),
            public_store: Some(Arc::new(public_store) as Arc<dyn ObjectStore>),
            signer: Some(private_store as Arc<dyn Signer>),
            config,
        })
    }

    /// Build on top of an existing object store (S3-compatible gateways, tests).
    ///
    /// Such a store cannot set ACLs, so uploads stay private and URLs are built
    /// from the configuration.
    pub fn with_store(store: Arc<dyn ObjectStore>, config: S3Config) -> Self {
        S3Storage {
            store,
            public_store: None,
            signer: None,
            config,
        }
    }

    /// Same bucket and stores, different run folder.
    pub fn with_folder(&self, folder: impl Into<String>) -> Self {
        let mut storage = self.clone();
        storage.config.folder = folder.into();
        storage
    }

    fn builder(config: &S3Config) -> AmazonS3Builder {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone());

        if let Some(ref endpoint) = config.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        builder
    }

    /// Generate public URL for an S3 object
    ///
    /// Uses the CDN template when configured, the endpoint URL (path-style) for
    /// S3-compatible providers, otherwise the standard AWS virtual-hosted format.
    fn generate_url(&self, full_key: &str) -> String {
        let encoded = keys::encode_url_path(full_key);
        if let Some(ref cdn) = self.config.cdn_url {
            if cdn.contains("{key}") {
                cdn.replace("{bucket}", &self.config.bucket)
                    .replace("{region}", &self.config.region)
                    .replace("{key}", &encoded)
            } else {
                format!("{}/{}", cdn.trim_end_matches('/'), encoded)
            }
        } else if let Some(ref endpoint) = self.config.endpoint_url {
            format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.config.bucket,
                encoded
            )
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket, self.config.region, encoded
            )
        }
    }

    async fn head(&self, full_key: &str) -> StorageResult<bool> {
        let location = ObjectPath::from(full_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let full_key = keys::full_key(&self.config.folder, key)?;
        self.head(&full_key).await
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()> {
        let full_key = keys::full_key(&self.config.folder, key)?;
        let data = tokio::fs::read(local_path).await?;
        let size = data.len() as u64;
        let location = ObjectPath::from(full_key.clone());

        let visibility = options.resolve(self.config.visibility);
        let store = match (visibility, &self.public_store) {
            (Visibility::Public, Some(public_store)) => public_store,
            (Visibility::Public, None) => {
                tracing::warn!(
                    bucket = %self.config.bucket,
                    key = %full_key,
                    "Public upload requested but this store cannot set ACLs; object stays private"
                );
                &self.store
            }
            (Visibility::Private, _) => &self.store,
        };

        let start = std::time::Instant::now();

        store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %full_key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.config.bucket,
            key = %full_key,
            size_bytes = size,
            private = visibility.is_private(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn get_cdn_url(&self, key: &str) -> StorageResult<String> {
        let full_key = keys::full_key(&self.config.folder, key)?;
        if !self.head(&full_key).await? {
            return Err(StorageError::NotFound(full_key));
        }

        if self.config.visibility.is_private() {
            if let Some(ref signer) = self.signer {
                let location = ObjectPath::from(full_key.clone());
                let url = signer
                    .signed_url(Method::GET, &location, PRESIGNED_URL_TTL)
                    .await
                    .map_err(|e| StorageError::BackendError(e.to_string()))?;
                return Ok(url.to_string());
            }
        }

        Ok(self.generate_url(&full_key))
    }

    fn folder(&self) -> &str {
        &self.config.folder
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
