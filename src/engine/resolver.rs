//! Remote folder resolution
//!
//! Turns a relative directory path into a folder id, creating missing
//! segments. Results are cached per `(parent, name)` for the lifetime of the
//! resolver (one job) and each key is initialized at most once, even when
//! several uploads ask for the same folder at the same time.

use crate::models::FolderId;
use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::utils::error::{Result, ZipDriveError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

type CacheKey = (FolderId, String);

pub struct FolderResolver<'a> {
    store: &'a dyn RemoteStore,
    cache: Mutex<HashMap<CacheKey, Arc<OnceCell<FolderId>>>>,
    /// Folders this job created; nothing can exist under them yet
    created: Mutex<HashSet<FolderId>>,
}

impl<'a> FolderResolver<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
            created: Mutex::new(HashSet::new()),
        }
    }

    /// Record a folder created outside the resolver (the job's subfolder)
    pub fn mark_created(&self, folder: &FolderId) {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(folder.clone());
    }

    fn is_created(&self, folder: &FolderId) -> bool {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(folder)
    }

    fn cell(&self, parent: &FolderId, name: &str) -> Arc<OnceCell<FolderId>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((parent.clone(), name.to_string()))
            .or_default()
            .clone()
    }

    /// Folder `name` directly under `parent`, found or created
    pub async fn ensure_folder(&self, parent: &FolderId, name: &str) -> RemoteResult<FolderId> {
        let cell = self.cell(parent, name);
        let folder = cell
            .get_or_try_init(|| async {
                if !self.is_created(parent) {
                    if let Some(existing) = self.store.find_child_folder(parent, name).await? {
                        debug!(parent = %parent, name, folder = %existing, "reusing existing folder");
                        return Ok(existing);
                    }
                }
                let folder = self.store.create_folder(parent, name).await?;
                debug!(parent = %parent, name, folder = %folder, "folder created");
                self.mark_created(&folder);
                Ok::<_, RemoteError>(folder)
            })
            .await?;
        Ok(folder.clone())
    }

    /// Folder for the relative directory `dir` under `root`; `""` is `root` itself
    pub async fn ensure_folder_path(&self, root: &FolderId, dir: &str) -> Result<FolderId> {
        let mut current = root.clone();
        let mut resolved = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            if !resolved.is_empty() {
                resolved.push('/');
            }
            resolved.push_str(segment);
            current = self.ensure_folder(&current, segment).await.map_err(|source| {
                ZipDriveError::FolderResolution {
                    path: resolved.clone(),
                    source,
                }
            })?;
        }
        Ok(current)
    }
}
