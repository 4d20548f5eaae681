//! Google Drive API client.

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

use drivekeeper_common::{Error, Result};

use super::auth::TokenManager;
use crate::remote::{RemoteStorage, FOLDER_MIME_TYPE};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Chunk size for resumable uploads (256KB minimum, must be multiple of 256KB).
const CHUNK_SIZE: usize = 256 * 1024; // 256KB

/// Files above this size go through a resumable upload.
const SIMPLE_UPLOAD_LIMIT: usize = 5 * 1024 * 1024;

/// Metadata fields requested for every file resource.
const FILE_FIELDS: &str = "id,name,mimeType,parents";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    files: Vec<DriveFile>,
}

/// Escape a value for use inside a single-quoted Drive search term.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Search query for a non-folder object by name inside a folder.
fn file_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and mimeType != '{}' and trashed = false",
        escape_query_value(name),
        escape_query_value(parent_id),
        FOLDER_MIME_TYPE
    )
}

/// Search query for a folder by name inside a parent, or the Drive root.
fn folder_query(name: &str, parent_id: Option<&str>) -> String {
    let mut query = format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escape_query_value(name),
        FOLDER_MIME_TYPE
    );
    let parent = parent_id.unwrap_or("root");
    query.push_str(&format!(" and '{}' in parents", escape_query_value(parent)));
    query
}

/// Yield `content` in upload-sized pieces, copying one chunk at a time.
fn chunk_stream(content: Vec<u8>) -> impl Stream<Item = Result<Vec<u8>>> + Send + 'static {
    let total = content.len();
    stream::iter((0..total).step_by(CHUNK_SIZE)).map(move |start| {
        let end = (start + CHUNK_SIZE).min(total);
        Ok(content[start..end].to_vec())
    })
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    token_manager: Arc<TokenManager>,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(token_manager: Arc<TokenManager>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("DriveKeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_manager,
        })
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.token_manager.access_token().await?;
        Ok(format!("Bearer {}", token))
    }

    /// Run a search and return the first match.
    async fn search_first(&self, query: &str) -> Result<Option<DriveFile>> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[
                ("q", query),
                ("fields", "files(id,name,mimeType,parents)"),
                ("pageSize", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to query files: {}", e)))?;

        let list_response: FileListResponse = self.handle_response(response).await?;
        Ok(list_response.files.into_iter().next())
    }

    /// Find a file by name in a folder.
    pub async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<DriveFile>> {
        self.search_first(&file_query(name, parent_id)).await
    }

    /// Find a folder by name inside `parent_id`, or directly under the root.
    pub async fn find_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Option<DriveFile>> {
        self.search_first(&folder_query(name, parent_id)).await
    }

    /// Create a folder.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<DriveFile> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let auth = self.auth_header().await?;

        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE
        });

        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create folder: {}", e)))?;

        self.handle_response(response).await
    }

    /// Upload a small file (< 5MB).
    pub async fn upload_simple(
        &self,
        name: &str,
        parent_id: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files?uploadType=multipart", DRIVE_UPLOAD_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });

        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| Error::Serialization(format!("Failed to serialize metadata: {}", e)))?;

        // Build multipart request
        let boundary = "DriveKeeperBoundary";
        let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

        // Metadata part
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        // Data part
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");

        // End boundary
        body.extend_from_slice(format!("--{}--", boundary).as_bytes());

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response).await
    }

    /// Replace the content of an existing file.
    pub async fn update_content(&self, file_id: &str, data: Vec<u8>) -> Result<DriveFile> {
        let url = format!("{}/files/{}?uploadType=media", DRIVE_UPLOAD_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .patch(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .query(&[("fields", FILE_FIELDS)])
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to update file: {}", e)))?;

        self.handle_response(response).await
    }

    /// Start a resumable upload session.
    pub async fn start_resumable_upload(
        &self,
        name: &str,
        parent_id: &str,
        total_size: u64,
    ) -> Result<String> {
        let url = format!("{}/files?uploadType=resumable", DRIVE_UPLOAD_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Upload-Content-Length", total_size.to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to start resumable upload: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "Failed to start resumable upload: {} - {}",
                status, body
            )));
        }

        // Extract upload URI from Location header
        let upload_uri = response
            .headers()
            .get(header::LOCATION)
            .ok_or_else(|| Error::Network("No upload URI in response".to_string()))?
            .to_str()
            .map_err(|e| Error::Network(format!("Invalid upload URI: {}", e)))?
            .to_string();

        Ok(upload_uri)
    }

    /// Upload a chunk to a resumable upload session.
    pub async fn upload_chunk(
        &self,
        upload_uri: &str,
        data: &[u8],
        start_byte: u64,
        total_size: u64,
    ) -> Result<Option<DriveFile>> {
        let end_byte = start_byte + data.len() as u64 - 1;
        let content_range = format!("bytes {}-{}/{}", start_byte, end_byte, total_size);

        let response = self
            .http
            .put(upload_uri)
            .header(header::CONTENT_LENGTH, data.len().to_string())
            .header(header::CONTENT_RANGE, content_range)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload chunk: {}", e)))?;

        let status = response.status();

        if status == StatusCode::OK || status == StatusCode::CREATED {
            // Upload complete
            let file: DriveFile = response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse upload response: {}", e)))?;
            Ok(Some(file))
        } else if status == StatusCode::PERMANENT_REDIRECT {
            // More chunks needed (308 Resume Incomplete)
            Ok(None)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!(
                "Chunk upload failed: {} - {}",
                status, body
            )))
        }
    }

    /// Upload a large file using resumable upload with streaming.
    pub async fn upload_resumable(
        &self,
        name: &str,
        parent_id: &str,
        mut stream: Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>,
        total_size: u64,
    ) -> Result<DriveFile> {
        let upload_uri = self
            .start_resumable_upload(name, parent_id, total_size)
            .await?;

        let mut bytes_uploaded = 0u64;
        let mut buffer = Vec::with_capacity(CHUNK_SIZE);

        while let Some(chunk) = stream.next().await {
            let data = chunk?;
            buffer.extend_from_slice(&data);

            while buffer.len() >= CHUNK_SIZE {
                let chunk_to_upload: Vec<u8> = buffer.drain(..CHUNK_SIZE).collect();
                let result = self
                    .upload_chunk(&upload_uri, &chunk_to_upload, bytes_uploaded, total_size)
                    .await?;

                bytes_uploaded += chunk_to_upload.len() as u64;

                if let Some(file) = result {
                    return Ok(file);
                }
            }
        }

        // Upload remaining bytes
        if !buffer.is_empty() {
            let result = self
                .upload_chunk(&upload_uri, &buffer, bytes_uploaded, total_size)
                .await?;

            if let Some(file) = result {
                return Ok(file);
            }
        }

        Err(Error::Network("Upload did not complete".to_string()))
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("Resource not found".to_string()))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Authentication(
                "Invalid or expired token".to_string(),
            ))
        } else if status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            Err(Error::PermissionDenied(format!("Access denied: {}", body)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!("API error: {} - {}", status, body)))
        }
    }
}

#[async_trait]
impl RemoteStorage for DriveClient {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn create_file(&self, name: &str, parent_id: &str, content: Vec<u8>) -> Result<String> {
        let file = if content.len() > SIMPLE_UPLOAD_LIMIT {
            let total_size = content.len() as u64;
            self.upload_resumable(name, parent_id, Box::pin(chunk_stream(content)), total_size)
                .await?
        } else {
            self.upload_simple(name, parent_id, content).await?
        };

        tracing::debug!("Created {} as {}", name, file.id);
        Ok(file.id)
    }

    async fn update_file(&self, file_id: &str, content: Vec<u8>) -> Result<String> {
        let file = self.update_content(file_id, content).await?;
        Ok(file.id)
    }

    async fn find_file(&self, name: &str, parent_id: &str) -> Result<Option<String>> {
        Ok(DriveClient::find_file(self, name, parent_id).await?.map(|f| f.id))
    }

    async fn find_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Option<String>> {
        Ok(DriveClient::find_folder(self, name, parent_id)
            .await?
            .map(|f| f.id))
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let folder = DriveClient::create_folder(self, name, parent_id).await?;
        tracing::debug!("Created folder {} as {}", name, folder.id);
        Ok(folder.id)
    }
}
