// =============================================================================
// GOOGLE DRIVE CLIENT
// =============================================================================
//
// Minimal Drive v3 REST client exposing only what the core layer needs:
// - list the children of a folder (all pages)
// - download a file's raw bytes (`alt=media`, read chunk by chunk)
// - upload a local file into a folder (resumable upload session)
//
// Native Google formats (Docs, Sheets, folders) cannot be fetched with
// `alt=media`; the fetcher filters them out before downloading.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use crate::core::auth::StoredToken;
use crate::core::drive::{DriveError, DriveService, RemoteFile};
use crate::infra::google_auth::ServiceAccountAuth;

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";
const PAGE_SIZE: &str = "1000";
/// Upper bound on the buffer reserved from a download's Content-Length.
const MAX_PREALLOC: u64 = 8 << 20;

/// How requests are authorized.
pub enum DriveCredentials {
    /// Administrator OAuth token, used as-is for the lifetime of the client.
    OAuth(StoredToken),
    /// Service account; access tokens are minted and cached on demand.
    ServiceAccount(ServiceAccountAuth),
}

impl DriveCredentials {
    async fn bearer(&self) -> Result<String, DriveError> {
        match self {
            DriveCredentials::OAuth(token) => Ok(token.access_token.clone()),
            DriveCredentials::ServiceAccount(auth) => auth
                .get_access_token()
                .await
                .map_err(|e| DriveError::Unauthorized(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DriveErrorBody {
    error: DriveErrorDetail,
}

#[derive(Debug, Deserialize)]
struct DriveErrorDetail {
    message: String,
}

pub struct DriveClient {
    client: Client,
    credentials: DriveCredentials,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(credentials: DriveCredentials) -> Self {
        Self::with_base_urls(credentials, API_BASE, UPLOAD_BASE)
    }

    /// Points the client at other endpoints, e.g. a local mock server.
    pub fn with_base_urls(
        credentials: DriveCredentials,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            credentials,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    /// The `q` expression selecting the live children of a folder.
    pub fn children_query(parent_id: &str) -> String {
        // Single quotes inside the id would end the string literal early.
        let escaped = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{}' in parents and trashed=false", escaped)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DriveError> {
        let token = self.credentials.bearer().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DriveError::Network(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<DriveErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text);
        Err(DriveError::Api(format!("{} - {}", status, message)))
    }
}

/// Content type for an upload, from the file extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Bytes to reserve up front for a body of the advertised length.
fn preallocation(content_length: Option<u64>) -> usize {
    content_length.unwrap_or(0).min(MAX_PREALLOC) as usize
}

#[async_trait]
impl DriveService for DriveClient {
    async fn list(&self, parent_id: &str) -> Result<Vec<RemoteFile>, DriveError> {
        let query = Self::children_query(parent_id);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(format!("{}/files", self.api_base)).query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: FileList = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| DriveError::Api(format!("unexpected listing format: {}", e)))?;

            files.extend(page.files);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::debug!("Listed {} file(s) in folder {}", files.len(), parent_id);
        Ok(files)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let request = self
            .client
            .get(format!("{}/files/{}", self.api_base, file_id))
            .query(&[("alt", "media")]);
        let mut response = self.send(request).await?;

        let mut data = Vec::with_capacity(preallocation(response.content_length()));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DriveError::Network(e.to_string()))?
        {
            data.extend_from_slice(&chunk);
        }

        Ok(data)
    }

    async fn upload(&self, path: &Path, parent_id: &str) -> Result<String, DriveError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DriveError::Io(format!("not a file path: {}", path.display())))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DriveError::Io(format!("{}: {}", path.display(), e)))?;
        let mime = guess_mime(path);

        // Step 1: open a resumable session with the file metadata.
        let start = self
            .client
            .post(format!("{}/files", self.upload_base))
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", mime.as_str())
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&json!({ "name": name, "parents": [parent_id] }));
        let session = self.send(start).await?;
        let session_url = session
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::Api("upload session has no Location header".to_string()))?;

        // Step 2: send the content in one request.
        let put = self
            .client
            .put(session_url)
            .header(reqwest::header::CONTENT_TYPE, mime.as_str())
            .body(bytes);
        let created: CreatedFile = self
            .send(put)
            .await?
            .json()
            .await
            .map_err(|e| DriveError::Api(e.to_string()))?;

        tracing::info!("Uploaded '{}' to folder {} as {}", name, parent_id, created.id);
        Ok(created.id)
    }
}
