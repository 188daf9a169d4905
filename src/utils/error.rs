use crate::models::ItemId;
use crate::remote::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipDriveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported archive format: {name}")]
    ArchiveUnsupportedFormat { name: String },

    #[error("Failed to decode {name}: corrupted archive or unsupported encoding ({reason})")]
    ArchiveDecodeFailed { name: String, reason: String },

    #[error("{name}: archive is empty or uses an unsupported encoding")]
    ArchiveEmpty { name: String },

    #[error("Failed to encode archive: {reason}")]
    ArchiveEncodeFailed { reason: String },

    #[error("Failed to download {item}: {source}")]
    Download {
        item: ItemId,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to resolve folder '{path}': {source}")]
    FolderResolution {
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("Failed to upload '{path}': {source}")]
    Upload {
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("{failed} of {total} uploads failed")]
    UploadThreshold { failed: usize, total: usize },

    #[error("Failed to enumerate {item}: {source}")]
    Enumeration {
        item: ItemId,
        #[source]
        source: RemoteError,
    },

    #[error("Enumeration limit exceeded: {limit} (max {max})")]
    EnumerationLimit { limit: &'static str, max: u64 },

    #[error("{0}")]
    NoContent(String),
}

/// Coarse failure category reported alongside a terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Download,
    Decode,
    FolderResolution,
    Upload,
    Enumeration,
    NoContent,
    Other,
}

impl ZipDriveError {
    pub fn class(&self) -> FailureClass {
        match self {
            ZipDriveError::Download { .. } => FailureClass::Download,
            ZipDriveError::ArchiveUnsupportedFormat { .. }
            | ZipDriveError::ArchiveDecodeFailed { .. }
            | ZipDriveError::ArchiveEmpty { .. } => FailureClass::Decode,
            ZipDriveError::FolderResolution { .. } => FailureClass::FolderResolution,
            ZipDriveError::Upload { .. } | ZipDriveError::UploadThreshold { .. } => {
                FailureClass::Upload
            }
            ZipDriveError::Enumeration { .. } | ZipDriveError::EnumerationLimit { .. } => {
                FailureClass::Enumeration
            }
            ZipDriveError::NoContent(_) => FailureClass::NoContent,
            ZipDriveError::Io(_)
            | ZipDriveError::Config(_)
            | ZipDriveError::ArchiveEncodeFailed { .. } => FailureClass::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ZipDriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_class_mapping() {
        let empty = ZipDriveError::ArchiveEmpty {
            name: "a.zip".to_string(),
        };
        assert_eq!(empty.class(), FailureClass::Decode);
        assert_eq!(
            empty.to_string(),
            "a.zip: archive is empty or uses an unsupported encoding"
        );

        let download = ZipDriveError::Download {
            item: ItemId::new("f1"),
            source: RemoteError::Status {
                status: 404,
                message: "File not found".to_string(),
            },
        };
        assert_eq!(download.class(), FailureClass::Download);
        assert!(download.to_string().contains("404"));
        assert!(download.to_string().contains("File not found"));

        assert_eq!(
            ZipDriveError::NoContent("no files found to compress".to_string()).class(),
            FailureClass::NoContent
        );
    }
}
