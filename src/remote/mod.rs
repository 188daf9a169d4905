// Remote Store Layer
pub mod drive;
pub mod memory;

pub use drive::DriveStore;
pub use memory::{MemoryStore, RemoteCall};

use crate::models::{ChildPage, FolderId, ItemId, ItemMetadata};
use crate::system::MultipartPayload;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// What to do when a file with the same name already exists in the target folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Create a second file next to the existing one
    #[default]
    KeepBoth,
    /// Replace the existing file's content
    Overwrite,
    /// Leave the existing file untouched
    Skip,
}

impl ConflictPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep-both" | "keep" => Some(ConflictPolicy::KeepBoth),
            "overwrite" => Some(ConflictPolicy::Overwrite),
            "skip" => Some(ConflictPolicy::Skip),
            _ => None,
        }
    }
}

/// One file upload: a prepared multipart body plus routing information
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub parent: FolderId,
    pub name: String,
    pub mime_type: String,
    pub payload: MultipartPayload,
    pub conflict: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created(ItemId),
    Replaced(ItemId),
    /// An item with the same name existed and `ConflictPolicy::Skip` applied
    Skipped(ItemId),
}

impl UploadOutcome {
    pub fn item(&self) -> &ItemId {
        match self {
            UploadOutcome::Created(id) | UploadOutcome::Replaced(id) | UploadOutcome::Skipped(id) => {
                id
            }
        }
    }
}

/// Hierarchical file store reachable only through flat create/list primitives
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn download(&self, item: &ItemId) -> RemoteResult<Bytes>;

    async fn metadata(&self, item: &ItemId) -> RemoteResult<ItemMetadata>;

    /// One page of a folder's (non-trashed) children
    async fn list_children(
        &self,
        folder: &FolderId,
        page_token: Option<&str>,
    ) -> RemoteResult<ChildPage>;

    /// Non-trashed folder named exactly `name` (case-sensitive) under `parent`
    async fn find_child_folder(&self, parent: &FolderId, name: &str)
        -> RemoteResult<Option<FolderId>>;

    async fn create_folder(&self, parent: &FolderId, name: &str) -> RemoteResult<FolderId>;

    async fn create_file(&self, upload: FileUpload) -> RemoteResult<UploadOutcome>;
}
