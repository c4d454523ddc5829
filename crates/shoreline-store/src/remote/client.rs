//! Minimal Drime Cloud API client.
//!
//! Covers the slice of the Drime drive API the provider needs: file-entry
//! listing, folder creation, streaming uploads and downloads, deletion, and
//! server-side duplication. All calls are workspace-scoped and
//! bearer-authenticated with the configured API key.
//!
//! Connection establishment is bounded by a 10 second timeout and whole
//! requests by 300 seconds; the provider maps both onto `ServiceUnavailable`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::provider::ByteStream;

/// Default API root of the hosted Drime service.
pub const DEFAULT_BASE_URL: &str = "https://app.drime.cloud/api/v1";

/// Connect timeout for remote calls.
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Overall per-request timeout for remote calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Page size used when walking folder listings.
const LIST_PAGE_SIZE: u32 = 1000;

/// Errors from the Drime API.
#[derive(Debug, thiserror::Error)]
pub enum DrimeError {
    /// The name already exists in the destination folder.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The entry does not exist (or is not visible in this workspace).
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other API-level failure.
    #[error("drime API error ({status}): {message}")]
    Api {
        /// The HTTP status returned.
        status: u16,
        /// The response body or a summary of it.
        message: String,
    },
    /// Connection, timeout, or protocol failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DrimeError {
    /// Whether this failure is transient (worth surfacing as 503).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// One file or folder entry as reported by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEntry {
    /// The opaque entry id.
    pub id: i64,
    /// The entry name (one path component).
    pub name: String,
    /// `"folder"` for folders, a file kind otherwise.
    #[serde(rename = "type")]
    pub kind: String,
    /// File size in bytes (zero for folders).
    #[serde(default)]
    pub file_size: i64,
    /// Drime's native content hash. Not MD5-compatible.
    #[serde(default)]
    pub hash: String,
    /// MIME type when known.
    #[serde(default)]
    pub mime: Option<String>,
    /// Parent folder id, absent at the workspace root.
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// Whether this entry is a folder.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == "folder"
    }
}

#[derive(Debug, Deserialize)]
struct EntryPage {
    data: Vec<RemoteEntry>,
    #[serde(default)]
    current_page: u32,
    #[serde(default)]
    last_page: u32,
}

#[derive(Debug, Deserialize)]
struct FolderResponse {
    folder: RemoteEntry,
}

#[derive(Debug, Deserialize)]
struct FileEntryResponse {
    #[serde(rename = "fileEntry")]
    file_entry: RemoteEntry,
}

#[derive(Debug, Deserialize)]
struct DuplicateResponse {
    entries: Vec<RemoteEntry>,
}

/// The Drime API client.
#[derive(Debug, Clone)]
pub struct DrimeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    workspace_id: i64,
}

impl DrimeClient {
    /// Build a client for one workspace.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(
        api_key: impl Into<String>,
        workspace_id: i64,
        base_url: Option<String>,
    ) -> Result<Self, DrimeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            api_key: api_key.into(),
            workspace_id,
        })
    }

    /// The workspace this client is scoped to.
    #[must_use]
    pub fn workspace_id(&self) -> i64 {
        self.workspace_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// List every child of a folder (`None` = the workspace root),
    /// following pagination to the end.
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn list_children(&self, parent: Option<i64>) -> Result<Vec<RemoteEntry>, DrimeError> {
        let mut entries = Vec::new();
        let mut page = 1u32;
        loop {
            let mut request = self
                .http
                .get(self.url("drive/file-entries"))
                .bearer_auth(&self.api_key)
                .query(&[
                    ("workspaceId", self.workspace_id.to_string()),
                    ("perPage", LIST_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ]);
            if let Some(parent) = parent {
                request = request.query(&[("parentIds", parent.to_string())]);
            }

            let response = request.send().await?;
            let body: EntryPage = check(response).await?.json().await?;
            let done = body.last_page == 0 || body.current_page >= body.last_page;
            entries.extend(body.data);
            if done {
                break;
            }
            page += 1;
        }
        Ok(entries)
    }

    /// Find one child of a folder by name.
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn find_child(
        &self,
        parent: Option<i64>,
        name: &str,
    ) -> Result<Option<RemoteEntry>, DrimeError> {
        let children = self.list_children(parent).await?;
        Ok(children.into_iter().find(|entry| entry.name == name))
    }

    /// Create a folder. A duplicate name surfaces as [`DrimeError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn create_folder(
        &self,
        name: &str,
        parent: Option<i64>,
    ) -> Result<RemoteEntry, DrimeError> {
        let response = self
            .http
            .post(self.url("folders"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "name": name,
                "parentId": parent,
                "workspaceId": self.workspace_id,
            }))
            .send()
            .await?;

        let body: FolderResponse = check(response).await?.json().await?;
        debug!(folder = name, id = body.folder.id, "folder created");
        Ok(body.folder)
    }

    /// Upload a file, streaming the body.
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn upload_file(
        &self,
        name: &str,
        parent: Option<i64>,
        content_type: &str,
        body: ByteStream,
    ) -> Result<RemoteEntry, DrimeError> {
        let part = reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(body))
            .file_name(name.to_owned())
            .mime_str(content_type)
            .map_err(DrimeError::Transport)?;

        let mut form = reqwest::multipart::Form::new()
            .text("workspaceId", self.workspace_id.to_string())
            .part("file", part);
        if let Some(parent) = parent {
            form = form.text("parentId", parent.to_string());
        }

        let response = self
            .http
            .post(self.url("uploads"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let body: FileEntryResponse = check(response).await?.json().await?;
        debug!(file = name, id = body.file_entry.id, "file uploaded");
        Ok(body.file_entry)
    }

    /// Open a download stream for a file entry.
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn download_file(&self, id: i64) -> Result<ByteStream, DrimeError> {
        let response = self
            .http
            .get(self.url(&format!("file-entries/{id}/download")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let response = check(response).await?;
        let stream = response
            .bytes_stream()
            .map_ok(Bytes::from)
            .map_err(std::io::Error::other);
        Ok(Box::pin(stream))
    }

    /// Permanently delete entries (files or folders, recursively).
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn delete_entries(&self, ids: &[i64]) -> Result<(), DrimeError> {
        let response = self
            .http
            .delete(self.url("file-entries"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "entryIds": ids,
                "deleteForever": true,
                "workspaceId": self.workspace_id,
            }))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    /// Server-side copy of one entry into a destination folder.
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn duplicate_entry(
        &self,
        id: i64,
        destination: Option<i64>,
    ) -> Result<RemoteEntry, DrimeError> {
        let response = self
            .http
            .post(self.url("file-entries/duplicate"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "entryIds": [id],
                "destinationId": destination,
                "workspaceId": self.workspace_id,
            }))
            .send()
            .await?;

        let mut body: DuplicateResponse = check(response).await?.json().await?;
        body.entries
            .pop()
            .ok_or_else(|| DrimeError::Api {
                status: 200,
                message: "duplicate returned no entries".to_owned(),
            })
    }

    /// Rename an entry in place.
    ///
    /// # Errors
    ///
    /// Returns a [`DrimeError`] on transport or API failure.
    pub async fn rename_entry(&self, id: i64, name: &str) -> Result<RemoteEntry, DrimeError> {
        let response = self
            .http
            .patch(self.url(&format!("file-entries/{id}")))
            .bearer_auth(&self.api_key)
            .json(&json!({ "name": name, "workspaceId": self.workspace_id }))
            .send()
            .await?;

        let body: FileEntryResponse = check(response).await?.json().await?;
        Ok(body.file_entry)
    }
}

/// Map non-success statuses onto typed errors.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, DrimeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => DrimeError::NotFound(message),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => DrimeError::Conflict(message),
        _ => DrimeError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_classify_transient_failures() {
        let err = DrimeError::Api {
            status: 503,
            message: "maintenance".to_owned(),
        };
        assert!(err.is_transient());

        let err = DrimeError::Api {
            status: 404,
            message: String::new(),
        };
        assert!(!err.is_transient());

        assert!(!DrimeError::Conflict("dup".to_owned()).is_transient());
    }

    #[test]
    fn test_should_parse_entry_json() {
        let entry: RemoteEntry = serde_json::from_str(
            r#"{
                "id": 42,
                "name": "report.pdf",
                "type": "pdf",
                "file_size": 1024,
                "hash": "b2:deadbeef",
                "mime": "application/pdf",
                "parent_id": 7
            }"#,
        )
        .unwrap();
        assert_eq!(entry.id, 42);
        assert!(!entry.is_folder());
        assert_eq!(entry.file_size, 1024);

        let folder: RemoteEntry =
            serde_json::from_str(r#"{"id": 1, "name": "backups", "type": "folder"}"#).unwrap();
        assert!(folder.is_folder());
        assert_eq!(folder.file_size, 0);
    }
}
