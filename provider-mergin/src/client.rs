//! Mergin API client
//!
//! Implements `VersionControl` on top of the Mergin v1 REST API.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::vcs::{ChangeSet, ProjectInfo, VcsConnector, VersionControl};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use core_auth::SessionToken;
use serde::de::DeserializeOwned;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{MerginError, Result};
use crate::project::{compare, WorkingCopy};
use crate::types::{
    LoginRequest, LoginResponse, ProjectFile, ProjectMetadata, ProjectResponse, PushChanges,
    PushFile, PushRequest, PushResponse,
};

/// Size of upload chunks
pub const UPLOAD_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Authenticated Mergin session
///
/// # Example
///
/// ```ignore
/// use provider_mergin::MerginClient;
///
/// let client = MerginClient::login(http_client, "https://app.merginmaps.com", "user", "pass").await?;
/// let info = client.project_info("team/survey").await?;
/// ```
pub struct MerginClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    session: SessionToken,
}

impl MerginClient {
    /// Log in and create a session
    #[instrument(skip(http_client, password))]
    pub async fn login(
        http_client: Arc<dyn HttpClient>,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/v1/auth/login", base_url))
            .json(&LoginRequest {
                login: username,
                password,
            })?;

        let response = http_client.execute(request).await?;
        if !response.is_success() {
            return Err(MerginError::AuthenticationFailed(format!(
                "login as {} rejected (status {}): {}. Have you specified correct credentials?",
                username,
                response.status,
                error_detail(&response)
            )));
        }

        let login: LoginResponse = response
            .json()
            .map_err(|e| MerginError::ParseError(e.to_string()))?;
        let expires_at = parse_expiry(&login.session.expire)?;

        info!(%expires_at, "Logged in to Mergin");
        Ok(Self::with_session(
            http_client,
            &base_url,
            SessionToken::new(login.session.token, expires_at),
        ))
    }

    /// Use an existing session
    pub fn with_session(
        http_client: Arc<dyn HttpClient>,
        base_url: &str,
        session: SessionToken,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url).header("Authorization", self.session.authorization_header())
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(status_error(&response))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .map_err(|e| MerginError::ParseError(e.to_string()))
    }

    /// Project detail including the file list of the latest version
    #[instrument(skip(self))]
    pub async fn fetch_project(&self, project: &str) -> Result<ProjectResponse> {
        let (namespace, name) = split_project_name(project)?;
        let url = self.api_url(&format!(
            "project/{}/{}",
            urlencoding::encode(namespace),
            urlencoding::encode(name)
        ));
        self.send_json(self.request(HttpMethod::Get, url)).await
    }

    async fn download_file(
        &self,
        project: &ProjectResponse,
        file: &ProjectFile,
        copy: &WorkingCopy,
    ) -> Result<()> {
        let url = format!(
            "{}?file={}&version={}",
            self.api_url(&format!(
                "project/raw/{}/{}",
                urlencoding::encode(&project.namespace),
                urlencoding::encode(&project.name)
            )),
            urlencoding::encode(&file.path),
            urlencoding::encode(&project.version)
        );

        let mut response = self
            .http_client
            .execute_streaming(self.request(HttpMethod::Get, url))
            .await?;
        if !response.is_success() {
            return Err(status_error(&response.into_response().await?));
        }

        let target = copy.file_path(&file.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = target.with_file_name(format!(
            "{}.part",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        let mut output = tokio::fs::File::create(&partial).await?;
        let bytes = tokio::io::copy(&mut response.body, &mut output).await?;
        output.flush().await?;
        drop(output);
        tokio::fs::rename(&partial, &target).await?;

        debug!(path = %file.path, bytes, "Downloaded file");
        Ok(())
    }

    fn metadata_for(project: &ProjectResponse) -> ProjectMetadata {
        ProjectMetadata {
            name: project.name.clone(),
            namespace: project.namespace.clone(),
            version: project.version.clone(),
            files: project.files.clone(),
        }
    }

    async fn upload_chunks(&self, transaction: &str, copy: &WorkingCopy, file: &PushFile) -> Result<()> {
        let chunks = file.chunks.as_deref().unwrap_or_default();
        let mut handle = tokio::fs::File::open(copy.file_path(&file.path)).await?;

        for (index, chunk_id) in chunks.iter().enumerate() {
            let offset = index as u64 * UPLOAD_CHUNK_SIZE;
            let length = UPLOAD_CHUNK_SIZE.min(file.size.saturating_sub(offset));
            handle.seek(SeekFrom::Start(offset)).await?;
            let mut buffer = vec![0u8; length as usize];
            handle.read_exact(&mut buffer).await?;

            let url = self.api_url(&format!("project/push/chunk/{}/{}", transaction, chunk_id));
            let request = self
                .request(HttpMethod::Post, url)
                .header("Content-Type", "application/octet-stream")
                .body(Bytes::from(buffer));
            self.send(request).await?;

            debug!(path = %file.path, chunk = index + 1, of = chunks.len(), "Uploaded chunk");
        }

        Ok(())
    }
}

/// `<namespace>/<name>` split into its parts
pub fn split_project_name(project: &str) -> Result<(&str, &str)> {
    match project.split_once('/') {
        Some((namespace, name))
            if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((namespace, name))
        }
        _ => Err(MerginError::InvalidProjectName(project.to_string())),
    }
}

/// Session expiry as sent by the server (RFC 3339, or naive UTC timestamp)
pub fn parse_expiry(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| MerginError::ParseError(format!("Invalid session expiry {}: {}", value, e)))
}

fn status_error(response: &HttpResponse) -> MerginError {
    match response.status {
        401 => MerginError::AuthenticationFailed(error_detail(response)),
        status => MerginError::ApiError {
            status_code: status,
            message: error_detail(response),
        },
    }
}

fn error_detail(response: &HttpResponse) -> String {
    #[derive(serde::Deserialize)]
    struct Detail {
        detail: String,
    }

    response
        .json::<Detail>()
        .map(|d| d.detail)
        .or_else(|_| response.text())
        .unwrap_or_default()
}

fn push_entry(file: &ProjectFile, upload: bool) -> PushFile {
    let chunks = upload.then(|| {
        let count = file.size.div_ceil(UPLOAD_CHUNK_SIZE);
        (0..count).map(|_| Uuid::new_v4().to_string()).collect()
    });

    PushFile {
        path: file.path.clone(),
        checksum: file.checksum.clone(),
        size: file.size,
        mtime: file.mtime.clone(),
        chunks,
    }
}

#[async_trait]
impl VersionControl for MerginClient {
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    async fn download(&self, project: &str, dir: &Path) -> BridgeResult<ProjectInfo> {
        let copy = WorkingCopy::new(dir);
        if copy.is_initialized() {
            return Err(MerginError::WorkingCopy(format!(
                "{} already contains a Mergin project",
                dir.display()
            ))
            .into());
        }

        let remote = self.fetch_project(project).await?;
        tokio::fs::create_dir_all(dir).await?;
        for file in &remote.files {
            self.download_file(&remote, file, &copy).await?;
        }
        copy.write_metadata(&Self::metadata_for(&remote)).await?;

        info!(version = %remote.version, files = remote.files.len(), "Project downloaded");
        Ok(remote.to_info())
    }

    async fn project_info(&self, project: &str) -> BridgeResult<ProjectInfo> {
        Ok(self.fetch_project(project).await?.to_info())
    }

    fn has_working_copy(&self, dir: &Path) -> bool {
        WorkingCopy::new(dir).is_initialized()
    }

    async fn local_version(&self, dir: &Path) -> BridgeResult<String> {
        Ok(WorkingCopy::new(dir).read_metadata().await?.version)
    }

    async fn pending_changes(&self, dir: &Path) -> BridgeResult<ChangeSet> {
        Ok(WorkingCopy::new(dir).pending_changes().await?)
    }

    async fn pull_changes(&self, dir: &Path, server: &ProjectInfo) -> BridgeResult<ChangeSet> {
        let local = WorkingCopy::new(dir).read_metadata().await?;
        let server_files: Vec<ProjectFile> = server
            .files
            .iter()
            .map(|record| ProjectFile {
                path: record.path.clone(),
                checksum: record.checksum.clone().unwrap_or_default(),
                size: record.size.unwrap_or_default(),
                mtime: None,
            })
            .collect();
        Ok(compare(&local.files, &server_files))
    }

    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    async fn pull(&self, dir: &Path) -> BridgeResult<String> {
        let copy = WorkingCopy::new(dir);
        let local = copy.read_metadata().await?;
        let remote = self.fetch_project(&local.full_name()).await?;

        if remote.version == local.version {
            return Ok(local.version);
        }

        let changes = compare(&local.files, &remote.files);
        for record in changes.incoming() {
            if let Some(file) = remote.files.iter().find(|f| f.path == record.path) {
                self.download_file(&remote, file, &copy).await?;
            }
        }
        for record in &changes.removed {
            let path = copy.file_path(&record.path);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %record.path, "File removed on server was already gone locally");
                }
                Err(e) => return Err(MerginError::Io(e).into()),
            }
        }
        copy.write_metadata(&Self::metadata_for(&remote)).await?;

        info!(
            from = %local.version,
            to = %remote.version,
            changes = changes.len(),
            "Pulled project"
        );
        Ok(remote.version)
    }

    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    async fn push(&self, dir: &Path) -> BridgeResult<String> {
        let copy = WorkingCopy::new(dir);
        let local = copy.read_metadata().await?;
        let current = copy.scan().await?;
        let changes = compare(&local.files, &current);

        if changes.is_empty() {
            debug!("Nothing to push");
            return Ok(local.version);
        }

        let find = |files: &[ProjectFile], path: &str| -> Option<ProjectFile> {
            files.iter().find(|f| f.path == path).cloned()
        };
        let push = PushChanges {
            added: changes
                .added
                .iter()
                .filter_map(|r| find(&current, &r.path))
                .map(|f| push_entry(&f, true))
                .collect(),
            updated: changes
                .updated
                .iter()
                .filter_map(|r| find(&current, &r.path))
                .map(|f| push_entry(&f, true))
                .collect(),
            removed: changes
                .removed
                .iter()
                .filter_map(|r| find(&local.files, &r.path))
                .map(|f| push_entry(&f, false))
                .collect(),
        };

        let (namespace, name) = split_project_name_owned(&local)?;
        let url = self.api_url(&format!(
            "project/push/{}/{}",
            urlencoding::encode(&namespace),
            urlencoding::encode(&name)
        ));
        let request = self.request(HttpMethod::Post, url).json(&PushRequest {
            version: &local.version,
            changes: &push,
        })?;
        let response: PushResponse = self.send_json(request).await?;

        if let Some(transaction) = response.transaction {
            for file in push.added.iter().chain(push.updated.iter()) {
                self.upload_chunks(&transaction, &copy, file).await?;
            }
            let url = self.api_url(&format!("project/push/finish/{}", transaction));
            self.send(self.request(HttpMethod::Post, url)).await?;
        }

        let remote = self.fetch_project(&local.full_name()).await?;
        copy.write_metadata(&Self::metadata_for(&remote)).await?;

        info!(
            from = %local.version,
            to = %remote.version,
            added = push.added.len(),
            updated = push.updated.len(),
            removed = push.removed.len(),
            "Pushed project"
        );
        Ok(remote.version)
    }

    fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        Some(self.session.expires_at)
    }
}

fn split_project_name_owned(metadata: &ProjectMetadata) -> Result<(String, String)> {
    if metadata.namespace.is_empty() || metadata.name.is_empty() {
        return Err(MerginError::WorkingCopy(
            "Project metadata lacks namespace or name".to_string(),
        ));
    }
    Ok((metadata.namespace.clone(), metadata.name.clone()))
}

/// Creates Mergin sessions from stored credentials
pub struct MerginConnector {
    http_client: Arc<dyn HttpClient>,
    url: String,
    username: String,
    password: String,
}

impl MerginConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl VcsConnector for MerginConnector {
    async fn connect(&self) -> BridgeResult<Arc<dyn VersionControl>> {
        let client = MerginClient::login(
            Arc::clone(&self.http_client),
            &self.url,
            &self.username,
            &self.password,
        )
        .await?;
        Ok(Arc::new(client))
    }
}
