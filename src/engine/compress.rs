//! Remote items into a single uploaded archive
//!
//! Enumerating (0-70%) -> Encoding (70-90%) -> Uploading (90-100%).

use super::progress::{should_cancel, ProgressReporter};
use crate::models::entry::is_directory_marker;
use crate::models::{
    CompressionJob, CompressionRequest, CompressionSummary, FolderId, ItemId, JobStatus,
    ProgressSnapshot,
};
use crate::remote::{FileUpload, RemoteError, RemoteStore, UploadOutcome};
use crate::system::archive::{self, with_archive_extension, ArchiveFormat};
use crate::system::{FileMetadata, MultipartPayload};
use crate::utils::config::{EngineOptions, EnumerationLimits};
use crate::utils::error::{Result, ZipDriveError};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

const ENUMERATED_PERCENT: u8 = 70;
const ENCODED_PERCENT: u8 = 90;

/// Pending enumeration work: an item and the archive path prefix it lands under
struct WorkItem {
    item: ItemId,
    prefix: String,
    depth: usize,
}

/// `Compressed_{unix millis}`, used when the caller gives no name
pub fn default_archive_name() -> String {
    format!("Compressed_{}", chrono::Utc::now().timestamp_millis())
}

/// Collect `request.sources` recursively, encode them, and upload the archive to `request.destination`.
pub async fn compress_items(
    store: &dyn RemoteStore,
    request: &CompressionRequest,
    options: &EngineOptions,
    limits: &EnumerationLimits,
    progress_tx: UnboundedSender<ProgressSnapshot>,
    cancel: Arc<AtomicBool>,
) -> Result<CompressionSummary> {
    let requested = request
        .archive_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default_archive_name);
    let archive_name = with_archive_extension(&requested, request.format);

    let mut job = CompressionJob::new(request, archive_name.clone());
    let mut reporter = ProgressReporter::new(progress_tx);
    let mut summary = CompressionSummary {
        archive_name,
        archive_item: None,
        file_count: 0,
        archive_bytes: 0,
        skipped_existing: false,
        cancelled: false,
    };

    match run_compression(
        store,
        request.format,
        options,
        limits,
        &cancel,
        &mut job,
        &mut reporter,
        &mut summary,
    )
    .await
    {
        Ok(()) => Ok(summary),
        Err(err) => {
            warn!(archive = %job.archive_name, error = %err, "compression failed");
            job.status = JobStatus::Failed;
            job.error_message = Some(err.to_string());
            reporter.emit(job.snapshot());
            Err(err)
        }
    }
}

fn report(job: &mut CompressionJob, reporter: &mut ProgressReporter) {
    job.progress_percent = reporter.emit(job.snapshot());
}

fn finish_cancelled(
    job: &mut CompressionJob,
    reporter: &mut ProgressReporter,
    summary: &mut CompressionSummary,
) {
    info!(archive = %job.archive_name, visited = job.items_visited, "compression cancelled");
    job.status = JobStatus::Cancelled;
    summary.cancelled = true;
    report(job, reporter);
}

#[allow(clippy::too_many_arguments)]
async fn run_compression(
    store: &dyn RemoteStore,
    format: ArchiveFormat,
    options: &EngineOptions,
    limits: &EnumerationLimits,
    cancel: &AtomicBool,
    job: &mut CompressionJob,
    reporter: &mut ProgressReporter,
    summary: &mut CompressionSummary,
) -> Result<()> {
    report(job, reporter);
    if !enumerate(store, limits, cancel, job, reporter).await? {
        finish_cancelled(job, reporter, summary);
        return Ok(());
    }

    let file_count = job
        .collected_entries
        .keys()
        .filter(|path| !is_directory_marker(path))
        .count();
    if file_count == 0 {
        return Err(ZipDriveError::NoContent(
            "no files found to compress".to_string(),
        ));
    }
    summary.file_count = file_count;
    info!(
        archive = %job.archive_name,
        files = file_count,
        entries = job.collected_entries.len(),
        "enumeration finished"
    );

    // Encoding
    job.status = JobStatus::Encoding;
    job.progress_percent = ENUMERATED_PERCENT;
    report(job, reporter);
    if should_cancel(cancel) {
        finish_cancelled(job, reporter, summary);
        return Ok(());
    }
    let entries = std::mem::take(&mut job.collected_entries);
    let level = options.compression_level;
    let bytes = tokio::task::spawn_blocking(move || archive::encode(&entries, format, level))
        .await
        .map_err(|e| ZipDriveError::ArchiveEncodeFailed {
            reason: e.to_string(),
        })??;
    summary.archive_bytes = bytes.len() as u64;
    job.progress_percent = ENCODED_PERCENT;
    report(job, reporter);

    // Uploading
    job.status = JobStatus::Uploading;
    job.current_path = job.archive_name.clone();
    report(job, reporter);
    if should_cancel(cancel) {
        finish_cancelled(job, reporter, summary);
        return Ok(());
    }
    let upload_error = |source: RemoteError| ZipDriveError::Upload {
        path: job.archive_name.clone(),
        source,
    };
    let metadata = FileMetadata {
        name: job.archive_name.clone(),
        parents: vec![job.destination.as_str().to_string()],
        mime_type: Some(format.mime_type().to_string()),
    };
    let payload = MultipartPayload::build(&metadata, &bytes, format.mime_type())
        .map_err(|e| upload_error(RemoteError::Malformed(e.to_string())))?;
    let outcome = store
        .create_file(FileUpload {
            parent: job.destination.clone(),
            name: job.archive_name.clone(),
            mime_type: format.mime_type().to_string(),
            payload,
            conflict: options.conflict_policy,
        })
        .await
        .map_err(upload_error)?;
    if let UploadOutcome::Skipped(existing) = &outcome {
        warn!(
            archive = %job.archive_name,
            existing = %existing,
            "archive already exists, upload skipped"
        );
        summary.skipped_existing = true;
    }
    summary.archive_item = Some(outcome.item().clone());

    job.status = JobStatus::Succeeded;
    job.progress_percent = 100;
    report(job, reporter);
    info!(
        archive = %job.archive_name,
        files = summary.file_count,
        bytes = summary.archive_bytes,
        "archive uploaded"
    );
    Ok(())
}

/// Walk the sources breadth-first into `job.collected_entries`.
///
/// Returns `Ok(false)` when cancelled part way.
async fn enumerate(
    store: &dyn RemoteStore,
    limits: &EnumerationLimits,
    cancel: &AtomicBool,
    job: &mut CompressionJob,
    reporter: &mut ProgressReporter,
) -> Result<bool> {
    let mut pending: VecDeque<WorkItem> = job
        .sources
        .iter()
        .map(|item| WorkItem {
            item: item.clone(),
            prefix: String::new(),
            depth: 0,
        })
        .collect();
    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut total_bytes: u64 = 0;

    while let Some(work) = pending.pop_front() {
        if should_cancel(cancel) {
            return Ok(false);
        }
        if !visited.insert(work.item.clone()) {
            debug!(item = %work.item, "already visited, skipping");
            continue;
        }
        if visited.len() > limits.max_items {
            return Err(ZipDriveError::EnumerationLimit {
                limit: "max_items",
                max: limits.max_items as u64,
            });
        }
        if work.depth > limits.max_depth {
            return Err(ZipDriveError::EnumerationLimit {
                limit: "max_depth",
                max: limits.max_depth as u64,
            });
        }

        let enumeration_error = |source: RemoteError| ZipDriveError::Enumeration {
            item: work.item.clone(),
            source,
        };
        let metadata = store.metadata(&work.item).await.map_err(enumeration_error)?;
        let name = entry_name(&metadata.name);

        if metadata.is_folder() {
            let folder = FolderId::from_item(&work.item);
            let children = list_all_children(store, &folder)
                .await
                .map_err(enumeration_error)?;
            let folder_path = claim_path(&mut claimed, &work.prefix, &name, true);
            debug!(folder = %folder_path, children = children.len(), "folder listed");
            if children.is_empty() {
                job.collected_entries.insert(format!("{}/", folder_path), Vec::new());
            }
            let child_prefix = format!("{}/", folder_path);
            pending.extend(children.into_iter().map(|child| WorkItem {
                item: child,
                prefix: child_prefix.clone(),
                depth: work.depth + 1,
            }));
            job.current_path = folder_path;
        } else {
            let bytes = store.download(&work.item).await.map_err(enumeration_error)?;
            total_bytes += bytes.len() as u64;
            if total_bytes > limits.max_total_bytes {
                return Err(ZipDriveError::EnumerationLimit {
                    limit: "max_total_bytes",
                    max: limits.max_total_bytes,
                });
            }
            let path = claim_path(&mut claimed, &work.prefix, &name, false);
            debug!(path = %path, bytes = bytes.len(), "file collected");
            job.collected_entries.insert(path.clone(), bytes.to_vec());
            job.current_path = path;
        }

        job.items_visited += 1;
        job.items_pending = pending.len();
        job.progress_percent = job.enumeration_percent();
        report(job, reporter);
    }
    Ok(true)
}

async fn list_all_children(
    store: &dyn RemoteStore,
    folder: &FolderId,
) -> std::result::Result<Vec<ItemId>, RemoteError> {
    let mut children = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = store.list_children(folder, page_token.as_deref()).await?;
        children.extend(page.items);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(children),
        }
    }
}

/// Remote names may contain separators; inside the archive they would become folders
fn entry_name(name: &str) -> String {
    let cleaned = name.replace(['/', '\\', '\0'], "_");
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// First free path among `prefix + name`, `prefix + stem_(1).ext`, `prefix + stem_(2).ext`, ...
fn claim_path(claimed: &mut HashSet<String>, prefix: &str, name: &str, is_dir: bool) -> String {
    let candidate = format!("{}{}", prefix, name);
    if claimed.insert(candidate.clone()) {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !is_dir && !stem.is_empty() => (stem, format!(".{}", ext)),
        _ => (name, String::new()),
    };
    let mut index = 1;
    loop {
        let candidate = format!("{}{}_({}){}", prefix, stem, index, ext);
        if claimed.insert(candidate.clone()) {
            return candidate;
        }
        index += 1;
    }
}
