//! Archive extraction into the remote store
//!
//! Downloading (0-15%) -> Decoding (15-30%) -> CreatingFolder (optional)
//! -> Uploading (30-100%). Each phase finishes before the next starts; inside
//! Uploading, files go out with bounded parallelism and a single loop owns
//! the counters and the progress channel.

use super::progress::{should_cancel, ProgressReporter};
use super::resolver::FolderResolver;
use crate::models::{
    partition_entries, ArchiveEntry, ExtractionJob, ExtractionRequest, ExtractionSummary,
    FolderId, JobStatus, ProgressSnapshot,
};
use crate::remote::{ConflictPolicy, FileUpload, RemoteError, RemoteStore, UploadOutcome};
use crate::system::archive::{self, archive_base_name};
use crate::system::path_safety::split_entry_path;
use crate::system::{FileMetadata, MultipartPayload};
use crate::utils::config::{EngineOptions, UploadFailurePolicy};
use crate::utils::error::{Result, ZipDriveError};
use futures::stream::{self, StreamExt};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

const DOWNLOADED_PERCENT: u8 = 15;
const DECODED_PERCENT: u8 = 30;

/// Result of one upload unit, as seen by the aggregating loop
enum UnitResult {
    Done(UploadOutcome),
    Failed(ZipDriveError),
    /// Cancellation was observed before the unit made any remote call
    NotStarted,
}

/// Download `request.archive`, decode it, and recreate its tree under `request.destination`.
///
/// Per-file upload failures are collected in the summary and only fail the
/// job as `options.failure_policy` dictates. Cancellation stops dispatching
/// new work and returns `Ok` with `cancelled` set; files already uploaded stay.
pub async fn extract_archive(
    store: &dyn RemoteStore,
    request: &ExtractionRequest,
    options: &EngineOptions,
    progress_tx: UnboundedSender<ProgressSnapshot>,
    cancel: Arc<AtomicBool>,
) -> Result<ExtractionSummary> {
    let mut job = ExtractionJob::new(request);
    let mut reporter = ProgressReporter::new(progress_tx);
    let mut summary = ExtractionSummary {
        target_root: request.destination.clone(),
        total_files: 0,
        uploaded: 0,
        skipped_existing: 0,
        failed: 0,
        rejected_paths: Vec::new(),
        errors: Vec::new(),
        cancelled: false,
    };

    match run_extraction(
        store,
        options,
        &cancel,
        &mut job,
        &mut reporter,
        &mut summary,
    )
    .await
    {
        Ok(()) => Ok(summary),
        Err(err) => {
            warn!(archive = %job.archive, error = %err, "extraction failed");
            job.status = JobStatus::Failed;
            job.error_message = Some(err.to_string());
            reporter.emit(job.snapshot());
            Err(err)
        }
    }
}

fn report(job: &mut ExtractionJob, reporter: &mut ProgressReporter) {
    job.progress_percent = reporter.emit(job.snapshot());
}

fn finish_cancelled(
    job: &mut ExtractionJob,
    reporter: &mut ProgressReporter,
    summary: &mut ExtractionSummary,
) {
    info!(
        archive = %job.archive,
        processed = job.processed_files,
        total = job.total_files,
        "extraction cancelled"
    );
    job.status = JobStatus::Cancelled;
    summary.cancelled = true;
    report(job, reporter);
}

async fn run_extraction(
    store: &dyn RemoteStore,
    options: &EngineOptions,
    cancel: &AtomicBool,
    job: &mut ExtractionJob,
    reporter: &mut ProgressReporter,
    summary: &mut ExtractionSummary,
) -> Result<()> {
    // Downloading
    report(job, reporter);
    if should_cancel(cancel) {
        finish_cancelled(job, reporter, summary);
        return Ok(());
    }
    let download_error = |source: RemoteError| ZipDriveError::Download {
        item: job.archive.clone(),
        source,
    };
    let metadata = store.metadata(&job.archive).await.map_err(download_error)?;
    let bytes = store.download(&job.archive).await.map_err(download_error)?;
    let archive_name = metadata.name;
    info!(archive = %archive_name, bytes = bytes.len(), "archive downloaded");
    job.current_path = archive_name.clone();
    job.progress_percent = DOWNLOADED_PERCENT;
    report(job, reporter);

    // Decoding
    job.status = JobStatus::Decoding;
    report(job, reporter);
    if should_cancel(cancel) {
        finish_cancelled(job, reporter, summary);
        return Ok(());
    }
    let hint_name = archive_name.clone();
    let decoded = tokio::task::spawn_blocking(move || archive::decode(&bytes, &hint_name))
        .await
        .map_err(|e| ZipDriveError::ArchiveDecodeFailed {
            name: archive_name.clone(),
            reason: e.to_string(),
        })??;
    summary.rejected_paths = decoded.rejected;
    let (files, dirs) = partition_entries(decoded.entries);
    if files.is_empty() {
        return Err(ZipDriveError::ArchiveEmpty { name: archive_name });
    }
    job.total_files = files.len();
    summary.total_files = files.len();
    job.progress_percent = DECODED_PERCENT;
    info!(
        archive = %archive_name,
        files = files.len(),
        dirs = dirs.len(),
        rejected = summary.rejected_paths.len(),
        "archive decoded"
    );
    report(job, reporter);

    let resolver = FolderResolver::new(store);

    // CreatingFolder
    if job.create_subfolder {
        job.status = JobStatus::CreatingFolder;
        report(job, reporter);
        if should_cancel(cancel) {
            finish_cancelled(job, reporter, summary);
            return Ok(());
        }
        let folder_name = archive_base_name(&archive_name);
        let subfolder = store
            .create_folder(&job.target_root, &folder_name)
            .await
            .map_err(|source| ZipDriveError::FolderResolution {
                path: folder_name.clone(),
                source,
            })?;
        info!(folder = %folder_name, id = %subfolder, "subfolder created");
        resolver.mark_created(&subfolder);
        job.target_root = subfolder;
        summary.target_root = job.target_root.clone();
        report(job, reporter);
    }

    // Uploading
    job.status = JobStatus::Uploading;
    report(job, reporter);
    let root = job.target_root.clone();

    if options.preserve_empty_dirs {
        for dir in &dirs {
            if should_cancel(cancel) {
                finish_cancelled(job, reporter, summary);
                return Ok(());
            }
            if let Err(err) = resolver.ensure_folder_path(&root, &dir.path).await {
                warn!(path = %dir.path, error = %err, "could not recreate directory");
                summary.errors.push(err.to_string());
            }
        }
    }

    let conflict = options.conflict_policy;
    let resolver = &resolver;
    let root = &root;
    let mut uploads = stream::iter(files)
        .map(|entry| async move {
            let path = entry.path.clone();
            let result = upload_entry(store, resolver, root, entry, conflict, cancel).await;
            (path, result)
        })
        .buffer_unordered(options.upload_concurrency.max(1));

    while let Some((path, result)) = uploads.next().await {
        if should_cancel(cancel) {
            break;
        }
        match result {
            UnitResult::NotStarted => break,
            UnitResult::Done(outcome) => {
                match outcome {
                    UploadOutcome::Skipped(_) => summary.skipped_existing += 1,
                    UploadOutcome::Created(_) | UploadOutcome::Replaced(_) => {
                        summary.uploaded += 1
                    }
                }
                job.file_processed(&path, false);
            }
            UnitResult::Failed(err) => {
                warn!(path = %path, error = %err, "upload failed, skipping file");
                summary.failed += 1;
                summary.errors.push(err.to_string());
                job.file_processed(&path, true);
                if let UploadFailurePolicy::AbortAfter(limit) = options.failure_policy {
                    if summary.failed >= limit {
                        return Err(ZipDriveError::UploadThreshold {
                            failed: summary.failed,
                            total: job.total_files,
                        });
                    }
                }
            }
        }
        report(job, reporter);
    }
    drop(uploads);

    if should_cancel(cancel) || job.processed_files < job.total_files {
        finish_cancelled(job, reporter, summary);
        return Ok(());
    }

    if options.failure_policy == UploadFailurePolicy::FailIfNoneSucceed
        && summary.failed == job.total_files
    {
        return Err(ZipDriveError::UploadThreshold {
            failed: summary.failed,
            total: job.total_files,
        });
    }

    job.status = JobStatus::Succeeded;
    job.progress_percent = 100;
    report(job, reporter);
    info!(
        archive = %archive_name,
        uploaded = summary.uploaded,
        skipped = summary.skipped_existing,
        failed = summary.failed,
        "extraction finished"
    );
    Ok(())
}

async fn upload_entry(
    store: &dyn RemoteStore,
    resolver: &FolderResolver<'_>,
    root: &FolderId,
    entry: ArchiveEntry,
    conflict: ConflictPolicy,
    cancel: &AtomicBool,
) -> UnitResult {
    if should_cancel(cancel) {
        return UnitResult::NotStarted;
    }
    let (dir, name) = split_entry_path(&entry.path);
    let parent = match resolver.ensure_folder_path(root, dir).await {
        Ok(parent) => parent,
        Err(err) => return UnitResult::Failed(err),
    };
    if should_cancel(cancel) {
        return UnitResult::NotStarted;
    }

    let upload_error = |source: RemoteError| ZipDriveError::Upload {
        path: entry.path.clone(),
        source,
    };
    let mime_type = mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let metadata = FileMetadata {
        name: name.to_string(),
        parents: vec![parent.as_str().to_string()],
        mime_type: None,
    };
    let content = entry.content.as_deref().unwrap_or_default();
    let payload = match MultipartPayload::build(&metadata, content, &mime_type) {
        Ok(payload) => payload,
        Err(e) => return UnitResult::Failed(upload_error(RemoteError::Malformed(e.to_string()))),
    };

    let upload = FileUpload {
        parent,
        name: name.to_string(),
        mime_type,
        payload,
        conflict,
    };
    match store.create_file(upload).await {
        Ok(outcome) => UnitResult::Done(outcome),
        Err(source) => UnitResult::Failed(upload_error(source)),
    }
}
