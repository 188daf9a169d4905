//! Job models
//!
//! State and progress records of extraction and compression jobs

use super::entry::EntryMap;
use super::handle::{FolderId, ItemId};
use crate::system::ArchiveFormat;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Fetching the archive bytes
    Downloading,
    /// Decoding the archive
    Decoding,
    /// Creating the destination subfolder
    CreatingFolder,
    /// Walking remote items to collect their contents
    Enumerating,
    /// Building the archive from collected entries
    Encoding,
    /// Sending files (or the archive) to the store
    Uploading,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Downloading => "Downloading",
            JobStatus::Decoding => "Decoding",
            JobStatus::CreatingFolder => "CreatingFolder",
            JobStatus::Enumerating => "Enumerating",
            JobStatus::Encoding => "Encoding",
            JobStatus::Uploading => "Uploading",
            JobStatus::Succeeded => "Succeeded",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
        }
    }
}

/// Read-only progress record streamed to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub status: JobStatus,
    /// Overall progress (0-100)
    pub progress_percent: u8,
    /// Path or name currently being processed
    pub current_path: String,
    /// Terminal error, set only with `JobStatus::Failed`
    pub error_message: Option<String>,
    /// Files (or items) processed so far, failures included
    pub processed: usize,
    pub total: usize,
    /// Per-file failures so far
    pub failed: usize,
}

/// What the caller asks an extraction to do
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Archive to download
    pub archive: ItemId,
    /// Folder receiving the extracted tree
    pub destination: FolderId,
    /// Create a folder named after the archive inside `destination`
    pub create_subfolder: bool,
}

/// Extraction job state, mutated only by the orchestrator
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub archive: ItemId,
    pub target_root: FolderId,
    pub create_subfolder: bool,
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub progress_percent: u8,
    pub status: JobStatus,
    pub current_path: String,
    pub error_message: Option<String>,
}

impl ExtractionJob {
    pub fn new(request: &ExtractionRequest) -> Self {
        Self {
            archive: request.archive.clone(),
            target_root: request.destination.clone(),
            create_subfolder: request.create_subfolder,
            total_files: 0,
            processed_files: 0,
            failed_files: 0,
            progress_percent: 0,
            status: JobStatus::Downloading,
            current_path: String::new(),
            error_message: None,
        }
    }

    /// Upload-phase progress: 30% + 70% scaled by processed files
    pub fn upload_percent(&self) -> u8 {
        if self.total_files == 0 {
            return 30;
        }
        let ratio = self.processed_files as f64 / self.total_files as f64;
        (30.0 + (70.0 * ratio).round()).min(100.0) as u8
    }

    /// Record one finished file (uploaded or failed)
    pub fn file_processed(&mut self, path: &str, failed: bool) {
        self.processed_files += 1;
        if failed {
            self.failed_files += 1;
        }
        self.current_path = path.to_string();
        self.progress_percent = self.upload_percent();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            progress_percent: self.progress_percent,
            current_path: self.current_path.clone(),
            error_message: self.error_message.clone(),
            processed: self.processed_files,
            total: self.total_files,
            failed: self.failed_files,
        }
    }
}

/// What the caller asks a compression to do
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    /// Files and folders to pack
    pub sources: Vec<ItemId>,
    /// Folder receiving the archive
    pub destination: FolderId,
    /// Archive name; a timestamped name is generated when absent
    pub archive_name: Option<String>,
    pub format: ArchiveFormat,
}

/// Compression job state, mutated only by the orchestrator
#[derive(Debug, Clone)]
pub struct CompressionJob {
    pub sources: Vec<ItemId>,
    pub destination: FolderId,
    pub archive_name: String,
    pub collected_entries: EntryMap,
    pub items_visited: usize,
    /// Items discovered but not visited yet
    pub items_pending: usize,
    pub progress_percent: u8,
    pub status: JobStatus,
    pub current_path: String,
    pub error_message: Option<String>,
}

impl CompressionJob {
    pub fn new(request: &CompressionRequest, archive_name: String) -> Self {
        Self {
            sources: request.sources.clone(),
            destination: request.destination.clone(),
            archive_name,
            collected_entries: EntryMap::new(),
            items_visited: 0,
            items_pending: request.sources.len(),
            progress_percent: 0,
            status: JobStatus::Enumerating,
            current_path: String::new(),
            error_message: None,
        }
    }

    /// Enumeration progress (0-70%), proportional to visited vs. known items
    pub fn enumeration_percent(&self) -> u8 {
        let known = self.items_visited + self.items_pending;
        if known == 0 {
            return 0;
        }
        let ratio = self.items_visited as f64 / known as f64;
        (70.0 * ratio).round() as u8
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            progress_percent: self.progress_percent,
            current_path: self.current_path.clone(),
            error_message: self.error_message.clone(),
            processed: self.items_visited,
            total: self.items_visited + self.items_pending,
            failed: 0,
        }
    }
}

/// Outcome of a finished (or cancelled) extraction
#[derive(Debug, Clone)]
pub struct ExtractionSummary {
    /// Folder the tree was written into (the subfolder when one was created)
    pub target_root: FolderId,
    pub total_files: usize,
    pub uploaded: usize,
    /// Files left alone because of `ConflictPolicy::Skip`
    pub skipped_existing: usize,
    pub failed: usize,
    /// Archive paths dropped by path validation
    pub rejected_paths: Vec<String>,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

/// Outcome of a finished (or cancelled) compression
#[derive(Debug, Clone)]
pub struct CompressionSummary {
    pub archive_name: String,
    /// Uploaded archive (or the kept one when the upload was skipped),
    /// absent when cancelled before upload
    pub archive_item: Option<ItemId>,
    pub file_count: usize,
    pub archive_bytes: u64,
    /// An archive with this name already existed and was left in place
    pub skipped_existing: bool,
    pub cancelled: bool,
}
