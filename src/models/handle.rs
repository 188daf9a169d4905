//! Remote store handles and item metadata

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of any remote item (file or folder)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a remote folder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

impl FolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reinterpret an item already known to be a folder
    pub fn from_item(item: &ItemId) -> Self {
        Self(item.0.clone())
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<FolderId> for ItemId {
    fn from(folder: FolderId) -> Self {
        ItemId(folder.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    File,
}

/// Result of a metadata lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMetadata {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    pub mime_type: Option<String>,
}

impl ItemMetadata {
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}

/// One page of a folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildPage {
    pub items: Vec<ItemId>,
    pub next_page_token: Option<String>,
}
