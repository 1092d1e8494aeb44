//! Google Drive API connector implementation
//!
//! Uploads media files into one Drive folder, creating the folder and
//! sharing it with the configured addresses when the backend connects.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{BackendKind, StorageBackend};
use bytes::Bytes;
use core_auth::AccessTokenProvider;
use core_runtime::config::GoogleDriveSettings;
use core_runtime::logging::redact_if_sensitive;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result};
use crate::types::{
    DriveFile, FilesListResponse, NewFile, Permission, PermissionsListResponse, FOLDER_MIME_TYPE,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload endpoint for media content
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Bytes sent per resumable upload request (a multiple of 256 KiB)
pub const UPLOAD_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// OAuth scope limited to files created by the service account
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Google Drive storage backend
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveBackend;
///
/// let backend = GoogleDriveBackend::connect(http_client, authenticator, &settings).await?;
/// let link = backend.upload(&path, "images/img2.jpg").await?;
/// ```
pub struct GoogleDriveBackend {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenProvider>,
    folder_id: String,
    chunk_size: u64,
}

impl GoogleDriveBackend {
    /// Resolve (or create) the target folder and share it.
    #[instrument(skip(http_client, tokens, settings), fields(folder = %settings.folder))]
    pub async fn connect(
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn AccessTokenProvider>,
        settings: &GoogleDriveSettings,
    ) -> Result<Self> {
        let mut backend = Self {
            http_client,
            tokens,
            folder_id: String::new(),
            chunk_size: UPLOAD_CHUNK_SIZE,
        };

        backend.folder_id = match backend.find_folder(&settings.folder).await? {
            Some(id) => id,
            None => backend.create_folder(&settings.folder).await?,
        };

        for email in &settings.share_with {
            backend.share_with(email).await?;
        }

        info!(folder_id = %backend.folder_id, "Google Drive folder ready");
        Ok(backend)
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    async fn authorized(&self, request: HttpRequest) -> Result<HttpRequest> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_token(token))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(self.authorized(request).await?).await?;
        if !response.is_success() {
            warn!("API request failed: status={}", response.status);
            return Err(GoogleDriveError::ApiError {
                status_code: response.status,
                message: error_message(&response),
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .map_err(|e| GoogleDriveError::ParseError(e.to_string()))
    }

    async fn find_folder(&self, name: &str) -> Result<Option<String>> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_literal(name),
            FOLDER_MIME_TYPE
        );
        let url = format!(
            "{}/files?q={}&fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(&query),
            urlencoding::encode("files(id,name)")
        );

        let listing: FilesListResponse =
            self.send_json(HttpRequest::new(HttpMethod::Get, url)).await?;
        if listing.files.len() > 1 {
            warn!(
                matches = listing.files.len(),
                "Multiple folders with name '{}' found. Using the first one found.", name
            );
        }
        Ok(listing.files.into_iter().next().map(|folder| folder.id))
    }

    async fn create_folder(&self, name: &str) -> Result<String> {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/files?fields=id", DRIVE_API_BASE))
            .json(&NewFile {
                name,
                mime_type: Some(FOLDER_MIME_TYPE),
                parents: vec![],
            })?;

        let folder: DriveFile = self.send_json(request).await?;
        info!(folder_id = %folder.id, "Created Google Drive folder");
        Ok(folder.id)
    }

    async fn share_with(&self, email: &str) -> Result<()> {
        let url = format!(
            "{}/files/{}/permissions?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(&self.folder_id),
            urlencoding::encode("permissions(id,emailAddress,role,type)")
        );
        let existing: PermissionsListResponse =
            self.send_json(HttpRequest::new(HttpMethod::Get, url)).await?;

        let already_shared = existing.permissions.iter().any(|permission| {
            permission
                .email_address
                .as_deref()
                .is_some_and(|address| address.eq_ignore_ascii_case(email))
        });
        if already_shared {
            debug!(grantee = %redact_if_sensitive("email", email), "Folder already shared");
            return Ok(());
        }

        let url = format!(
            "{}/files/{}/permissions",
            DRIVE_API_BASE,
            urlencoding::encode(&self.folder_id)
        );
        let request = HttpRequest::new(HttpMethod::Post, url).json(&Permission {
            kind: "user".to_string(),
            role: "writer".to_string(),
            email_address: Some(email.to_string()),
        })?;
        self.send(request).await?;

        info!(grantee = %redact_if_sensitive("email", email), "Shared Google Drive folder");
        Ok(())
    }

    /// Open a resumable upload session and return its URL.
    async fn start_upload(&self, logical_path: &str, content_type: &str, size: u64) -> Result<String> {
        let url = format!(
            "{}/files?uploadType=resumable&fields={}",
            DRIVE_UPLOAD_BASE,
            urlencoding::encode("id,webViewLink")
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&NewFile {
                name: logical_path,
                mime_type: None,
                parents: vec![self.folder_id.as_str()],
            })?
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", size.to_string());

        let response = self.send(request).await?;
        response
            .header("Location")
            .map(str::to_string)
            .ok_or_else(|| GoogleDriveError::ParseError("No upload session URL returned".to_string()))
    }

    /// Upload the file in chunks through a resumable session.
    ///
    /// Drive answers 308 until the last chunk, which returns the file.
    async fn upload_file(&self, local_path: &Path, logical_path: &str) -> Result<String> {
        let mut source = tokio::fs::File::open(local_path).await?;
        let size = source.metadata().await?.len();
        let content_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();
        let session_url = self.start_upload(logical_path, &content_type, size).await?;

        let mut offset = 0;
        loop {
            let length = self.chunk_size.min(size - offset);
            let mut chunk = vec![0u8; length as usize];
            source.read_exact(&mut chunk).await?;

            let request = HttpRequest::new(HttpMethod::Put, session_url.as_str())
                .header("Content-Range", content_range(offset, length, size))
                .body(Bytes::from(chunk));
            let response = self
                .http_client
                .execute(self.authorized(request).await?)
                .await?;
            offset += length;

            match response.status {
                308 if offset < size => {
                    debug!(path = logical_path, offset, size, "Uploaded chunk");
                }
                200 | 201 => {
                    let file: DriveFile = response
                        .json()
                        .map_err(|e| GoogleDriveError::ParseError(e.to_string()))?;
                    debug!(file_id = %file.id, path = logical_path, "Uploaded file");
                    return file.web_view_link.ok_or_else(|| {
                        GoogleDriveError::ParseError(format!(
                            "No webViewLink returned for file {}",
                            file.id
                        ))
                    });
                }
                status => {
                    warn!("Upload request failed: status={}", status);
                    return Err(GoogleDriveError::ApiError {
                        status_code: status,
                        message: error_message(&response),
                    });
                }
            }
        }
    }
}

/// Escape `\` and `'` inside a single-quoted Drive query literal
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `Content-Range` of a chunk starting at `offset`
fn content_range(offset: u64, length: u64, size: u64) -> String {
    if length == 0 {
        format!("bytes */{}", size)
    } else {
        format!("bytes {}-{}/{}", offset, offset + length - 1, size)
    }
}

fn error_message(response: &HttpResponse) -> String {
    response
        .json::<serde_json::Value>()
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(&response.body).to_string())
}

#[async_trait]
impl StorageBackend for GoogleDriveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudDrive
    }

    async fn upload(&self, local_path: &Path, logical_path: &str) -> BridgeResult<String> {
        Ok(self.upload_file(local_path, logical_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use core_auth::StaticToken;
    use mockall::mock;
    use std::collections::HashMap;
    use tempfile::TempDir;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn settings(share_with: &[&str]) -> GoogleDriveSettings {
        GoogleDriveSettings {
            service_account_file: "service_account.json".into(),
            folder: "media's".to_string(),
            share_with: share_with.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn token() -> Arc<dyn AccessTokenProvider> {
        Arc::new(StaticToken("ya29.token".to_string()))
    }

    fn body_json(request: &HttpRequest) -> serde_json::Value {
        request
            .body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or_default()
    }

    #[test]
    fn test_escape_query_literal() {
        assert_eq!(escape_query_literal("media's"), "media\\'s");
        assert_eq!(escape_query_literal("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_content_range() {
        assert_eq!(content_range(0, 3, 3), "bytes 0-2/3");
        assert_eq!(content_range(8, 4, 12), "bytes 8-11/12");
        assert_eq!(content_range(0, 0, 0), "bytes */0");
    }

    #[tokio::test]
    async fn test_connect_uses_first_existing_folder() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url.starts_with("https://www.googleapis.com/drive/v3/files?q=")
                    && req.url.contains(&*urlencoding::encode("name = 'media\\'s'"))
                    && req.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer ya29.token")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    serde_json::json!({"files": [{"id": "folder-1"}, {"id": "folder-2"}]}),
                ))
            });

        let backend = GoogleDriveBackend::connect(Arc::new(http), token(), &settings(&[]))
            .await
            .unwrap();

        assert_eq!(backend.folder_id(), "folder-1");
        assert_eq!(backend.kind(), BackendKind::CloudDrive);
    }

    #[tokio::test]
    async fn test_connect_creates_folder_and_shares() {
        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(200, serde_json::json!({"files": []}))));
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "https://www.googleapis.com/drive/v3/files?fields=id"
                    && body_json(req)["mimeType"] == FOLDER_MIME_TYPE
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(200, serde_json::json!({"id": "new-folder"}))));
        // Existing permission matches case-insensitively, so only the second address is shared.
        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Get && req.url.contains("/files/new-folder/permissions"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json_response(
                    200,
                    serde_json::json!({"permissions": [
                        {"type": "user", "role": "writer", "emailAddress": "Owner@Example.com"}
                    ]}),
                ))
            });
        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Get && req.url.contains("/files/new-folder/permissions"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(200, serde_json::json!({"permissions": []}))));
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "https://www.googleapis.com/drive/v3/files/new-folder/permissions"
                    && body_json(req)
                        == serde_json::json!({
                            "type": "user", "role": "writer", "emailAddress": "viewer@example.com"
                        })
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(200, serde_json::json!({"id": "perm-1"}))));

        let backend = GoogleDriveBackend::connect(
            Arc::new(http),
            token(),
            &settings(&["owner@example.com", "viewer@example.com"]),
        )
        .await
        .unwrap();

        assert_eq!(backend.folder_id(), "new-folder");
    }

    fn folder_listing() -> HttpResponse {
        json_response(200, serde_json::json!({"files": [{"id": "folder-1"}]}))
    }

    fn session_response() -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert(
            "location".to_string(),
            "https://www.googleapis.com/upload/drive/v3/files?upload_id=xyz".to_string(),
        );
        HttpResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        }
    }

    fn uploaded_file() -> HttpResponse {
        json_response(
            200,
            serde_json::json!({
                "id": "file-1",
                "webViewLink": "https://drive.google.com/file/d/file-1/view"
            }),
        )
    }

    fn is_chunk(req: &HttpRequest, range: &str, content: &[u8]) -> bool {
        req.method == HttpMethod::Put
            && req.url == "https://www.googleapis.com/upload/drive/v3/files?upload_id=xyz"
            && req.headers.get("Content-Range").map(String::as_str) == Some(range)
            && req.body.as_deref() == Some(content)
    }

    #[tokio::test]
    async fn test_upload_returns_web_view_link() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("img2.jpg");
        std::fs::write(&file, b"jpg").unwrap();

        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(folder_listing()));
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url.starts_with(
                        "https://www.googleapis.com/upload/drive/v3/files?uploadType=resumable",
                    )
                    && req.headers.get("X-Upload-Content-Type").map(String::as_str) == Some("image/jpeg")
                    && req.headers.get("X-Upload-Content-Length").map(String::as_str) == Some("3")
                    && body_json(req)
                        == serde_json::json!({"name": "images/img2.jpg", "parents": ["folder-1"]})
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(session_response()));
        http.expect_execute()
            .withf(|req| {
                is_chunk(req, "bytes 0-2/3", b"jpg")
                    && req.headers.get("Authorization").map(String::as_str) == Some("Bearer ya29.token")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(uploaded_file()));

        let backend = GoogleDriveBackend::connect(Arc::new(http), token(), &settings(&[]))
            .await
            .unwrap();
        let link = backend.upload(&file, "images/img2.jpg").await.unwrap();

        assert_eq!(link, "https://drive.google.com/file/d/file-1/view");
    }

    #[tokio::test]
    async fn test_upload_sends_file_in_chunks() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("img1.png");
        std::fs::write(&file, b"abcde").unwrap();

        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(folder_listing()));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(session_response()));
        for (range, content) in [("bytes 0-1/5", &b"ab"[..]), ("bytes 2-3/5", &b"cd"[..])] {
            http.expect_execute()
                .withf(move |req| is_chunk(req, range, content))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(json_response(308, serde_json::json!({}))));
        }
        http.expect_execute()
            .withf(|req| is_chunk(req, "bytes 4-4/5", b"e"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(uploaded_file()));

        let mut backend = GoogleDriveBackend::connect(Arc::new(http), token(), &settings(&[]))
            .await
            .unwrap();
        backend.chunk_size = 2;

        let link = backend.upload(&file, "img1.png").await.unwrap();
        assert_eq!(link, "https://drive.google.com/file/d/file-1/view");
    }

    #[tokio::test]
    async fn test_rejected_chunk_fails_upload() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("img1.png");
        std::fs::write(&file, b"png").unwrap();

        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(folder_listing()));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(session_response()));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json_response(
                    403,
                    serde_json::json!({"error": {"code": 403, "message": "The user's Drive storage quota has been exceeded."}}),
                ))
            });

        let backend = GoogleDriveBackend::connect(Arc::new(http), token(), &settings(&[]))
            .await
            .unwrap();
        let err = backend.upload(&file, "img1.png").await.unwrap_err();

        assert!(matches!(err, BridgeError::Backend(msg) if msg.contains("storage quota")));
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|_| {
            Ok(json_response(
                403,
                serde_json::json!({"error": {"code": 403, "message": "Insufficient permissions"}}),
            ))
        });

        let err = GoogleDriveBackend::connect(Arc::new(http), token(), &settings(&[]))
            .await
            .err()
            .unwrap();
        let bridge: BridgeError = err.into();

        assert!(matches!(bridge, BridgeError::Backend(msg) if msg.contains("Insufficient permissions")));
    }
}
