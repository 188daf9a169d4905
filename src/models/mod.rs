// Data Models
pub mod entry;
pub mod handle;
pub mod job;

pub use entry::{partition_entries, ArchiveEntry, EntryMap};
pub use handle::{ChildPage, FolderId, ItemId, ItemKind, ItemMetadata};
pub use job::{
    CompressionJob, CompressionRequest, CompressionSummary, ExtractionJob, ExtractionRequest,
    ExtractionSummary, JobStatus, ProgressSnapshot,
};
