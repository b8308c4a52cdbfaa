//! Thin Drive v3 REST client.

use super::auth::TokenProvider;
use super::FOLDER_MIME_TYPE;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const MULTIPART_BOUNDARY: &str = "archivist_multipart_boundary";

/// A file or folder as returned by a Drive listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// The Drive operations the storage backend needs.
#[async_trait]
pub trait DriveClient: Send + Sync {
    /// Children of `parent_id` named exactly `name`, in listing order.
    async fn list_children(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: Option<&str>,
    ) -> StorageResult<Vec<DriveFile>>;

    /// Create a folder and return its id.
    async fn create_folder(&self, parent_id: &str, name: &str) -> StorageResult<String>;

    /// Upload a local file and return its id.
    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        local_path: &Path,
    ) -> StorageResult<String>;

    /// Grant `anyone` reader access to a file.
    async fn share_publicly(&self, file_id: &str) -> StorageResult<()>;
}

/// Build the `q` parameter for a child lookup.
pub(crate) fn build_query(parent_id: &str, name: &str, mime_type: Option<&str>) -> String {
    let mut query = format!(
        "'{}' in parents and name = '{}' and trashed = false",
        escape_query_value(parent_id),
        escape_query_value(name)
    );
    if let Some(mime) = mime_type {
        query.push_str(&format!(" and mimeType = '{}'", escape_query_value(mime)));
    }
    query
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Content type sent with uploads, from the file extension.
pub(crate) fn guess_mime_type(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// [`DriveClient`] backed by the Drive v3 REST API.
#[derive(Clone)]
pub struct HttpDriveClient {
    http: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    api_base: String,
    upload_base: String,
}

impl HttpDriveClient {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_urls(auth, DEFAULT_API_BASE, DEFAULT_UPLOAD_BASE)
    }

    /// Point the client at another API host (used by tests).
    pub fn with_base_urls(
        auth: Arc<dyn TokenProvider>,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> StorageResult<Response> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(format!("Drive {} failed: {}", operation, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            operation = operation,
            status = %status,
            body = %body,
            "Drive API request failed"
        );

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StorageError::Auth(format!(
                "Drive {} returned {}: {}",
                operation, status, body
            ))),
            _ => Err(StorageError::BackendError(format!(
                "Drive {} returned {}: {}",
                operation, status, body
            ))),
        }
    }

    async fn created_id(response: Response, operation: &str) -> StorageResult<String> {
        let created: CreatedFile = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Invalid Drive {} response: {}", operation, e))
        })?;
        Ok(created.id)
    }
}

#[async_trait]
impl DriveClient for HttpDriveClient {
    async fn list_children(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: Option<&str>,
    ) -> StorageResult<Vec<DriveFile>> {
        let query = build_query(parent_id, name, mime_type);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        // Follow every page so "last listed" means last overall
        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .query(&[
                    ("q", query.as_str()),
                    ("spaces", "drive"),
                    ("fields", "nextPageToken, files(id, name)"),
                ]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = self.send(request, "list").await?;
            let list: FileList = response.json().await.map_err(|e| {
                StorageError::BackendError(format!("Invalid Drive list response: {}", e))
            })?;
            files.extend(list.files);

            match list.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> StorageResult<String> {
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });
        let request = self
            .http
            .post(format!("{}/files", self.api_base))
            .query(&[("fields", "id")])
            .json(&metadata);

        let response = self.send(request, "create folder").await?;
        Self::created_id(response, "create folder").await
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        local_path: &Path,
    ) -> StorageResult<String> {
        let content = tokio::fs::read(local_path).await?;
        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id],
        });

        let mut body = Vec::with_capacity(content.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
                b = MULTIPART_BOUNDARY,
                meta = metadata,
                mime = guess_mime_type(name),
            )
            .as_bytes(),
        );
        body.extend_from_slice(&content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

        let request = self
            .http
            .post(format!("{}/files", self.upload_base))
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body);

        let response = self.send(request, "upload").await?;
        Self::created_id(response, "upload").await
    }

    async fn share_publicly(&self, file_id: &str) -> StorageResult<()> {
        let request = self
            .http
            .post(format!("{}/files/{}/permissions", self.api_base, file_id))
            .json(&serde_json::json!({ "type": "anyone", "role": "reader" }));

        self.send(request, "share").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_filters_parent_name_and_trash() {
        assert_eq!(
            build_query("root123", "videos", None),
            "'root123' in parents and name = 'videos' and trashed = false"
        );
    }

    #[test]
    fn query_adds_mime_filter() {
        assert_eq!(
            build_query("p", "f", Some(FOLDER_MIME_TYPE)),
            "'p' in parents and name = 'f' and trashed = false and mimeType = 'application/vnd.google-apps.folder'"
        );
    }

    #[test]
    fn query_escapes_quotes_and_backslashes() {
        assert_eq!(
            build_query("p", "it's a\\b", None),
            "'p' in parents and name = 'it\\'s a\\\\b' and trashed = false"
        );
    }

    #[test]
    fn mime_guess_by_extension() {
        assert_eq!(guess_mime_type("tiktok_1.mp4"), "video/mp4");
        assert_eq!(guess_mime_type("thumb.JPG"), "image/jpeg");
        assert_eq!(guess_mime_type("index.html"), "text/html");
        assert_eq!(guess_mime_type("noext"), "application/octet-stream");
    }
}
