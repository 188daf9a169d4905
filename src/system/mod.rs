// System Layer
pub mod archive;
pub mod multipart;
pub mod path_safety;
mod staging;

pub use archive::{ArchiveEngine, ArchiveFormat, DecodedArchive};
pub use multipart::{FileMetadata, MultipartPayload};
pub use path_safety::{sanitize, PathRejection};
