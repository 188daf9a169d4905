// Formatters for CLI output: sizes, counts, progress lines

use crate::models::{JobStatus, ProgressSnapshot};

const BAR_WIDTH: usize = 20;

/// Human-readable byte size with a space before the unit
///
/// # Examples
/// ```
/// use zipdrive::utils::formatter::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 B");
/// assert_eq!(format_file_size(512), "512 B");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// assert_eq!(format_file_size(1_048_576), "1.0 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// Count with the singular or plural noun
///
/// # Examples
/// ```
/// use zipdrive::utils::formatter::pluralize;
///
/// assert_eq!(pluralize(1, "file", "files"), "1 file");
/// assert_eq!(pluralize(3, "file", "files"), "3 files");
/// ```
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// `[#####---------------]` for a 0-100 percentage
pub fn progress_bar(percent: u8) -> String {
    let filled = (usize::from(percent.min(100)) * BAR_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// One status line for a progress snapshot
pub fn format_snapshot(snapshot: &ProgressSnapshot) -> String {
    let mut line = format!(
        "{} {:>3}% {:<14}",
        progress_bar(snapshot.progress_percent),
        snapshot.progress_percent,
        snapshot.status.name()
    );
    if snapshot.total > 0 && snapshot.status == JobStatus::Uploading {
        line.push_str(&format!(" {}/{}", snapshot.processed, snapshot.total));
    }
    if snapshot.failed > 0 {
        line.push_str(&format!(" ({} failed)", snapshot.failed));
    }
    if !snapshot.current_path.is_empty() {
        line.push(' ');
        line.push_str(&snapshot.current_path);
    }
    if let Some(error) = &snapshot.error_message {
        line.push_str(": ");
        line.push_str(error);
    }
    line
}
