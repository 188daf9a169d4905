//! Validation of relative paths read out of archives

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    NulByte,
    Backslash,
    Absolute,
    ParentSegment,
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            PathRejection::Empty => "empty path",
            PathRejection::NulByte => "contains a NUL byte",
            PathRejection::Backslash => "contains a backslash",
            PathRejection::Absolute => "absolute path",
            PathRejection::ParentSegment => "contains a '..' segment",
        };
        f.write_str(reason)
    }
}

/// Validate an archive path and normalize it.
///
/// `.` and empty segments are dropped; a trailing `/` (directory marker) is kept.
pub fn sanitize(raw: &str) -> Result<String, PathRejection> {
    if raw.is_empty() {
        return Err(PathRejection::Empty);
    }
    if raw.contains('\0') {
        return Err(PathRejection::NulByte);
    }
    if raw.contains('\\') {
        return Err(PathRejection::Backslash);
    }
    if raw.starts_with('/') {
        return Err(PathRejection::Absolute);
    }

    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(PathRejection::ParentSegment),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(PathRejection::Empty);
    }

    let mut clean = segments.join("/");
    if raw.ends_with('/') {
        clean.push('/');
    }
    Ok(clean)
}

/// Split a file path into `(directory, base name)`; the directory is `""` at top level
pub fn split_entry_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}
