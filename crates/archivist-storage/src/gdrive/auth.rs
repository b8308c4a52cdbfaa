//! Service-account authentication for the Drive API.

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN_SECONDS: i64 = 60;
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;

/// Supplies bearer tokens for Drive requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> StorageResult<String>;
}

/// Fields read from a service-account key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// OAuth2 JWT-bearer flow for a Google service account.
pub struct ServiceAccountAuth {
    client_email: String,
    encoding_key: EncodingKey,
    token_uri: String,
    http: reqwest::Client,
    cache: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Load a service-account JSON key file (the one downloaded from the
    /// Google Cloud console).
    pub async fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to read service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &[u8]) -> StorageResult<Self> {
        let key: ServiceAccountKey = serde_json::from_slice(raw).map_err(|e| {
            StorageError::ConfigError(format!("Invalid service account file: {}", e))
        })?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            StorageError::ConfigError(format!("Invalid service account private key: {}", e))
        })?;

        Ok(Self {
            client_email: key.client_email,
            encoding_key,
            token_uri: key
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            http: reqwest::Client::new(),
            cache: RwLock::new(None),
        })
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> StorageResult<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECONDS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| StorageError::Auth(format!("Failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self) -> StorageResult<CachedToken> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("Failed to parse token response: {}", e)))?;

        tracing::debug!(
            client_email = %self.client_email,
            expires_in = token.expires_in,
            "Obtained Drive access token"
        );

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> StorageResult<String> {
        let fresh_until = Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECONDS);

        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.expires_at > fresh_until {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(ref cached) = *cache {
            if cached.expires_at > fresh_until {
                return Ok(cached.token.clone());
            }
        }

        let fetched = self.fetch_token().await?;
        let token = fetched.token.clone();
        *cache = Some(fetched);
        Ok(token)
    }
}
