//! Drive v3 REST adapter
//!
//! Talks to the hosted store with an already-issued bearer token. Token
//! acquisition and refresh happen elsewhere.

use super::{
    ConflictPolicy, FileUpload, RemoteError, RemoteResult, RemoteStore, UploadOutcome,
};
use crate::models::{ChildPage, FolderId, ItemId, ItemKind, ItemMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";
const FILE_FIELDS: &str = "id,name,mimeType";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
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
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct DriveStore {
    client: Client,
    api_base: String,
    access_token: String,
}

impl DriveStore {
    pub fn new(api_base: &str, access_token: String, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason()),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    /// All non-trashed children matching `query`, following pages
    async fn query_all(&self, query: &str) -> RemoteResult<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![("q", query.to_string()), ("fields", LIST_FIELDS.to_string())];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }
            let page: FileList = self
                .send_json(self.client.get(self.url("drive/v3/files")).query(&params))
                .await?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(files),
            }
        }
    }

    async fn find_existing_file(&self, parent: &FolderId, name: &str) -> RemoteResult<Option<ItemId>> {
        let query = format!(
            "'{}' in parents and name = '{}' and mimeType != '{}' and trashed = false",
            escape_query(parent.as_str()),
            escape_query(name),
            FOLDER_MIME_TYPE
        );
        let files = self.query_all(&query).await?;
        Ok(files
            .into_iter()
            .find(|file| file.name == name)
            .map(|file| ItemId::new(file.id)))
    }

    async fn replace_content(&self, item: &ItemId, upload: &FileUpload) -> RemoteResult<()> {
        let parts = upload
            .payload
            .split()
            .ok_or_else(|| RemoteError::Malformed("multipart body".to_string()))?;
        let url = self.url(&format!("upload/drive/v3/files/{}", item));
        let request = self
            .client
            .patch(url)
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, parts.content_type)
            .body(parts.content.to_vec());
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn download(&self, item: &ItemId) -> RemoteResult<Bytes> {
        debug!(item = %item, "drive: download");
        let url = self.url(&format!("drive/v3/files/{}", item));
        self.send(self.client.get(url).query(&[("alt", "media")]))
            .await?
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))
    }

    async fn metadata(&self, item: &ItemId) -> RemoteResult<ItemMetadata> {
        debug!(item = %item, "drive: metadata");
        let url = self.url(&format!("drive/v3/files/{}", item));
        let file: DriveFile = self
            .send_json(self.client.get(url).query(&[("fields", FILE_FIELDS)]))
            .await?;
        Ok(to_metadata(file))
    }

    async fn list_children(
        &self,
        folder: &FolderId,
        page_token: Option<&str>,
    ) -> RemoteResult<ChildPage> {
        debug!(folder = %folder, page_token, "drive: list children");
        let query = format!("'{}' in parents and trashed = false", escape_query(folder.as_str()));
        let mut params = vec![("q", query), ("fields", LIST_FIELDS.to_string())];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        let page: FileList = self
            .send_json(self.client.get(self.url("drive/v3/files")).query(&params))
            .await?;
        Ok(ChildPage {
            items: page.files.into_iter().map(|f| ItemId::new(f.id)).collect(),
            next_page_token: page.next_page_token,
        })
    }

    async fn find_child_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> RemoteResult<Option<FolderId>> {
        debug!(parent = %parent, name, "drive: find child folder");
        let query = format!(
            "'{}' in parents and name = '{}' and mimeType = '{}' and trashed = false",
            escape_query(parent.as_str()),
            escape_query(name),
            FOLDER_MIME_TYPE
        );
        // Server-side name matching is not case-sensitive
        let files = self.query_all(&query).await?;
        Ok(files
            .into_iter()
            .find(|file| file.name == name)
            .map(|file| FolderId::new(file.id)))
    }

    async fn create_folder(&self, parent: &FolderId, name: &str) -> RemoteResult<FolderId> {
        debug!(parent = %parent, name, "drive: create folder");
        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent.as_str()],
        });
        let file: DriveFile = self
            .send_json(
                self.client
                    .post(self.url("drive/v3/files"))
                    .query(&[("fields", "id")])
                    .json(&body),
            )
            .await?;
        Ok(FolderId::new(file.id))
    }

    async fn create_file(&self, upload: FileUpload) -> RemoteResult<UploadOutcome> {
        debug!(parent = %upload.parent, name = %upload.name, "drive: create file");
        if upload.conflict != ConflictPolicy::KeepBoth {
            if let Some(existing) = self.find_existing_file(&upload.parent, &upload.name).await? {
                if upload.conflict == ConflictPolicy::Skip {
                    return Ok(UploadOutcome::Skipped(existing));
                }
                self.replace_content(&existing, &upload).await?;
                return Ok(UploadOutcome::Replaced(existing));
            }
        }

        let content_type = upload.payload.content_type_header();
        let (body, _) = upload.payload.into_parts();
        let request = self
            .client
            .post(self.url("upload/drive/v3/files"))
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(CONTENT_TYPE, content_type)
            .body(body);
        let file: DriveFile = self.send_json(request).await?;
        Ok(UploadOutcome::Created(ItemId::new(file.id)))
    }
}

fn to_metadata(file: DriveFile) -> ItemMetadata {
    let kind = if file.mime_type.as_deref() == Some(FOLDER_MIME_TYPE) {
        ItemKind::Folder
    } else {
        ItemKind::File
    };
    ItemMetadata {
        id: ItemId::new(file.id),
        name: file.name,
        kind,
        mime_type: file.mime_type,
    }
}

/// Quote a value for use inside a single-quoted query literal
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Server-provided `error.message`, else the raw body, else the status reason
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    reason.unwrap_or("request failed").to_string()
}
