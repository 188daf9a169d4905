//! In-process remote store
//!
//! Keeps a flat item table with parent links, the way the hosted store does,
//! records every call it receives, and can be told to fail selected calls.

use super::{
    ConflictPolicy, FileUpload, RemoteError, RemoteResult, RemoteStore, UploadOutcome,
};
use crate::models::{ChildPage, FolderId, ItemId, ItemKind, ItemMetadata};
use crate::system::FileMetadata;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const ROOT_ID: &str = "root";
const DEFAULT_PAGE_SIZE: usize = 100;

/// One call received by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Download(ItemId),
    Metadata(ItemId),
    ListChildren {
        folder: FolderId,
        page_token: Option<String>,
    },
    FindChildFolder {
        parent: FolderId,
        name: String,
    },
    CreateFolder {
        parent: FolderId,
        name: String,
    },
    CreateFile {
        parent: FolderId,
        name: String,
        mime_type: String,
    },
}

impl RemoteCall {
    pub fn is_create_folder(&self) -> bool {
        matches!(self, RemoteCall::CreateFolder { .. })
    }

    pub fn is_create_file(&self) -> bool {
        matches!(self, RemoteCall::CreateFile { .. })
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parents: Vec<String>,
    kind: ItemKind,
    mime_type: Option<String>,
    content: Vec<u8>,
    trashed: bool,
    /// Creation order; listings are returned in this order
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<String, Node>,
    next_seq: u64,
    calls: Vec<RemoteCall>,
    failing_uploads: HashSet<String>,
    failing_folder_creates: HashSet<String>,
    failing_downloads: HashSet<String>,
    failing_listings: HashSet<String>,
}

impl State {
    fn insert(&mut self, parent: Option<&str>, name: &str, kind: ItemKind) -> String {
        self.next_seq += 1;
        let prefix = match kind {
            ItemKind::Folder => "folder",
            ItemKind::File => "file",
        };
        let id = format!("{}-{}", prefix, self.next_seq);
        self.nodes.insert(
            id.clone(),
            Node {
                name: name.to_string(),
                parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
                kind,
                mime_type: None,
                content: Vec::new(),
                trashed: false,
                seq: self.next_seq,
            },
        );
        id
    }

    fn live_children(&self, parent: &str) -> Vec<(&String, &Node)> {
        let mut children: Vec<_> = self
            .nodes
            .iter()
            .filter(|(_, node)| !node.trashed && node.parents.iter().any(|p| p == parent))
            .collect();
        children.sort_by_key(|(_, node)| node.seq);
        children
    }

    fn live_child(&self, parent: &str, name: &str, kind: ItemKind) -> Option<String> {
        self.live_children(parent)
            .into_iter()
            .find(|(_, node)| node.kind == kind && node.name == name)
            .map(|(id, _)| id.clone())
    }

    fn live_node(&self, id: &str) -> RemoteResult<&Node> {
        self.nodes
            .get(id)
            .filter(|node| !node.trashed)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn require_folder(&self, id: &str) -> RemoteResult<()> {
        match self.live_node(id)?.kind {
            ItemKind::Folder => Ok(()),
            ItemKind::File => Err(RemoteError::Status {
                status: 400,
                message: format!("{} is not a folder", id),
            }),
        }
    }
}

/// Remote store held entirely in memory
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert(
            ROOT_ID.to_string(),
            Node {
                name: "My Drive".to_string(),
                parents: Vec::new(),
                kind: ItemKind::Folder,
                mime_type: None,
                content: Vec::new(),
                trashed: false,
                seq: 0,
            },
        );
        Self {
            state: Mutex::new(state),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit listing pages to `page_size` items
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn root(&self) -> FolderId {
        FolderId::new(ROOT_ID)
    }

    pub fn add_folder(&self, parent: &FolderId, name: &str) -> FolderId {
        let id = self.lock().insert(Some(parent.as_str()), name, ItemKind::Folder);
        FolderId::new(id)
    }

    pub fn add_file(&self, parent: &FolderId, name: &str, content: &[u8]) -> ItemId {
        let mut state = self.lock();
        let id = state.insert(Some(parent.as_str()), name, ItemKind::File);
        if let Some(node) = state.nodes.get_mut(&id) {
            node.content = content.to_vec();
            node.mime_type = Some(
                mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
            );
        }
        ItemId::new(id)
    }

    /// Also list `item` under `folder`; items may have several parents
    pub fn link(&self, item: &ItemId, folder: &FolderId) {
        if let Some(node) = self.lock().nodes.get_mut(item.as_str()) {
            node.parents.push(folder.as_str().to_string());
        }
    }

    pub fn trash(&self, item: &ItemId) {
        if let Some(node) = self.lock().nodes.get_mut(item.as_str()) {
            node.trashed = true;
        }
    }

    /// Uploads of files with this name fail with HTTP 500
    pub fn fail_uploads_named(&self, name: &str) {
        self.lock().failing_uploads.insert(name.to_string());
    }

    /// Folder creations with this name fail with HTTP 500
    pub fn fail_folder_creates_named(&self, name: &str) {
        self.lock().failing_folder_creates.insert(name.to_string());
    }

    pub fn fail_downloads_of(&self, item: &ItemId) {
        self.lock().failing_downloads.insert(item.as_str().to_string());
    }

    pub fn fail_listings_of(&self, folder: &FolderId) {
        self.lock().failing_listings.insert(folder.as_str().to_string());
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Live file named `name` directly under `parent`
    pub fn find_file(&self, parent: &FolderId, name: &str) -> Option<ItemId> {
        self.lock()
            .live_child(parent.as_str(), name, ItemKind::File)
            .map(ItemId::new)
    }

    pub fn find_folder(&self, parent: &FolderId, name: &str) -> Option<FolderId> {
        self.lock()
            .live_child(parent.as_str(), name, ItemKind::Folder)
            .map(FolderId::new)
    }

    pub fn content(&self, item: &ItemId) -> Option<Vec<u8>> {
        self.lock()
            .nodes
            .get(item.as_str())
            .map(|node| node.content.clone())
    }

    pub fn mime_type(&self, item: &ItemId) -> Option<String> {
        self.lock()
            .nodes
            .get(item.as_str())
            .and_then(|node| node.mime_type.clone())
    }

    /// Names of the live children of `folder`, in creation order
    pub fn child_names(&self, folder: &FolderId) -> Vec<String> {
        self.lock()
            .live_children(folder.as_str())
            .into_iter()
            .map(|(_, node)| node.name.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn download(&self, item: &ItemId) -> RemoteResult<Bytes> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Download(item.clone()));
        if state.failing_downloads.contains(item.as_str()) {
            return Err(RemoteError::Status {
                status: 500,
                message: "Internal Error".to_string(),
            });
        }
        let node = state.live_node(item.as_str())?;
        if node.kind == ItemKind::Folder {
            return Err(RemoteError::Status {
                status: 403,
                message: "Only files with binary content can be downloaded".to_string(),
            });
        }
        Ok(Bytes::from(node.content.clone()))
    }

    async fn metadata(&self, item: &ItemId) -> RemoteResult<ItemMetadata> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Metadata(item.clone()));
        let node = state.live_node(item.as_str())?;
        Ok(ItemMetadata {
            id: item.clone(),
            name: node.name.clone(),
            kind: node.kind,
            mime_type: node.mime_type.clone(),
        })
    }

    async fn list_children(
        &self,
        folder: &FolderId,
        page_token: Option<&str>,
    ) -> RemoteResult<ChildPage> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::ListChildren {
            folder: folder.clone(),
            page_token: page_token.map(str::to_string),
        });
        if state.failing_listings.contains(folder.as_str()) {
            return Err(RemoteError::Status {
                status: 500,
                message: "Internal Error".to_string(),
            });
        }
        state.require_folder(folder.as_str())?;

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RemoteError::Malformed(format!("bad page token '{}'", token)))?,
            None => 0,
        };
        let children = state.live_children(folder.as_str());
        let end = (offset + self.page_size).min(children.len());
        let items = children
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|(id, _)| ItemId::new(id.as_str()))
            .collect();
        let next_page_token = (end < children.len()).then(|| end.to_string());
        Ok(ChildPage {
            items,
            next_page_token,
        })
    }

    async fn find_child_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> RemoteResult<Option<FolderId>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::FindChildFolder {
            parent: parent.clone(),
            name: name.to_string(),
        });
        state.require_folder(parent.as_str())?;
        Ok(state
            .live_child(parent.as_str(), name, ItemKind::Folder)
            .map(FolderId::new))
    }

    async fn create_folder(&self, parent: &FolderId, name: &str) -> RemoteResult<FolderId> {
        // Give concurrent callers a chance to interleave, like a real round trip
        tokio::task::yield_now().await;

        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateFolder {
            parent: parent.clone(),
            name: name.to_string(),
        });
        if state.failing_folder_creates.contains(name) {
            return Err(RemoteError::Status {
                status: 500,
                message: "Internal Error".to_string(),
            });
        }
        state.require_folder(parent.as_str())?;
        let id = state.insert(Some(parent.as_str()), name, ItemKind::Folder);
        debug!(parent = %parent, name, id = %id, "memory store: folder created");
        Ok(FolderId::new(id))
    }

    async fn create_file(&self, upload: FileUpload) -> RemoteResult<UploadOutcome> {
        tokio::task::yield_now().await;

        let mut state = self.lock();
        state.calls.push(RemoteCall::CreateFile {
            parent: upload.parent.clone(),
            name: upload.name.clone(),
            mime_type: upload.mime_type.clone(),
        });
        if state.failing_uploads.contains(&upload.name) {
            return Err(RemoteError::Status {
                status: 500,
                message: "Internal Error".to_string(),
            });
        }
        state.require_folder(upload.parent.as_str())?;

        let parts = upload
            .payload
            .split()
            .ok_or_else(|| RemoteError::Malformed("multipart body".to_string()))?;
        let metadata: FileMetadata = upload
            .payload
            .metadata()
            .ok_or_else(|| RemoteError::Malformed("file metadata".to_string()))?;
        if metadata.name != upload.name {
            return Err(RemoteError::Status {
                status: 400,
                message: format!(
                    "metadata name '{}' does not match '{}'",
                    metadata.name, upload.name
                ),
            });
        }
        let content = parts.content.to_vec();
        let content_type = parts.content_type.to_string();

        let existing = state.live_child(upload.parent.as_str(), &upload.name, ItemKind::File);
        match (existing, upload.conflict) {
            (Some(id), ConflictPolicy::Skip) => Ok(UploadOutcome::Skipped(ItemId::new(id))),
            (Some(id), ConflictPolicy::Overwrite) => {
                if let Some(node) = state.nodes.get_mut(&id) {
                    node.content = content;
                    node.mime_type = Some(content_type);
                }
                Ok(UploadOutcome::Replaced(ItemId::new(id)))
            }
            _ => {
                let id = state.insert(Some(upload.parent.as_str()), &upload.name, ItemKind::File);
                if let Some(node) = state.nodes.get_mut(&id) {
                    node.content = content;
                    node.mime_type = Some(content_type);
                }
                Ok(UploadOutcome::Created(ItemId::new(id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::MultipartPayload;

    fn upload(parent: &FolderId, name: &str, content: &[u8], conflict: ConflictPolicy) -> FileUpload {
        let metadata = FileMetadata {
            name: name.to_string(),
            parents: vec![parent.as_str().to_string()],
            mime_type: None,
        };
        FileUpload {
            parent: parent.clone(),
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            payload: MultipartPayload::build(&metadata, content, "text/plain")
                .expect("build payload"),
            conflict,
        }
    }

    #[tokio::test]
    async fn test_create_file_stores_multipart_content() {
        let store = MemoryStore::new();
        let root = store.root();
        let outcome = store
            .create_file(upload(&root, "a.txt", b"hello", ConflictPolicy::KeepBoth))
            .await
            .expect("create file");

        let id = store.find_file(&root, "a.txt").expect("file exists");
        assert_eq!(outcome, UploadOutcome::Created(id.clone()));
        assert_eq!(store.content(&id), Some(b"hello".to_vec()));
        assert_eq!(store.mime_type(&id).as_deref(), Some("text/plain"));
        assert_eq!(store.download(&id).await.expect("download"), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_create_file_rejects_unreadable_metadata() {
        let store = MemoryStore::new();
        let root = store.root();
        let mut bad = upload(&root, "a.txt", b"hello", ConflictPolicy::KeepBoth);
        let metadata = serde_json::json!({ "title": "a.txt" });
        bad.payload =
            MultipartPayload::build(&metadata, b"hello", "text/plain").expect("build payload");

        let result = store.create_file(bad).await;
        assert!(matches!(result, Err(RemoteError::Malformed(_))));
        assert!(store.find_file(&root, "a.txt").is_none());
    }

    #[tokio::test]
    async fn test_conflict_policies() {
        let store = MemoryStore::new();
        let root = store.root();
        let original = store.add_file(&root, "a.txt", b"old");

        let skipped = store
            .create_file(upload(&root, "a.txt", b"new", ConflictPolicy::Skip))
            .await
            .expect("skip");
        assert_eq!(skipped, UploadOutcome::Skipped(original.clone()));
        assert_eq!(store.content(&original), Some(b"old".to_vec()));

        let replaced = store
            .create_file(upload(&root, "a.txt", b"new", ConflictPolicy::Overwrite))
            .await
            .expect("overwrite");
        assert_eq!(replaced, UploadOutcome::Replaced(original.clone()));
        assert_eq!(store.content(&original), Some(b"new".to_vec()));

        store
            .create_file(upload(&root, "a.txt", b"third", ConflictPolicy::KeepBoth))
            .await
            .expect("keep both");
        assert_eq!(store.child_names(&root), vec!["a.txt", "a.txt"]);
    }

    #[tokio::test]
    async fn test_find_child_folder_is_exact_and_skips_trashed() {
        let store = MemoryStore::new();
        let root = store.root();
        let docs = store.add_folder(&root, "Docs");
        store.add_file(&root, "docs", b"not a folder");

        assert_eq!(
            store.find_child_folder(&root, "Docs").await.expect("find"),
            Some(docs.clone())
        );
        assert_eq!(store.find_child_folder(&root, "docs").await.expect("find"), None);

        store.trash(&ItemId::from(docs));
        assert_eq!(store.find_child_folder(&root, "Docs").await.expect("find"), None);
    }

    #[tokio::test]
    async fn test_list_children_pages() {
        let store = MemoryStore::new().with_page_size(2);
        let root = store.root();
        for name in ["a", "b", "c"] {
            store.add_file(&root, name, b"x");
        }

        let first = store.list_children(&root, None).await.expect("first page");
        assert_eq!(first.items.len(), 2);
        let token = first.next_page_token.expect("more pages");
        let second = store
            .list_children(&root, Some(&token))
            .await
            .expect("second page");
        assert_eq!(second.items.len(), 1);
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_injected_failures_and_call_log() {
        let store = MemoryStore::new();
        let root = store.root();
        let file = store.add_file(&root, "a.zip", b"zip");
        store.fail_downloads_of(&file);
        store.fail_uploads_named("bad.txt");

        let err = store.download(&file).await.expect_err("download fails");
        assert!(matches!(err, RemoteError::Status { status: 500, .. }));
        let err = store
            .create_file(upload(&root, "bad.txt", b"x", ConflictPolicy::KeepBoth))
            .await
            .expect_err("upload fails");
        assert!(matches!(err, RemoteError::Status { status: 500, .. }));

        assert_eq!(
            store.calls(),
            vec![
                RemoteCall::Download(file),
                RemoteCall::CreateFile {
                    parent: root,
                    name: "bad.txt".to_string(),
                    mime_type: "text/plain".to_string(),
                },
            ]
        );
        store.clear_calls();
        assert!(store.calls().is_empty());
    }
}
