// Sync Engine
pub mod compress;
pub mod extract;
pub mod progress;
pub mod resolver;

pub use compress::{compress_items, default_archive_name};
pub use extract::extract_archive;
pub use progress::{should_cancel, ProgressReporter};
pub use resolver::FolderResolver;
