//! Archive entry model
//!
//! Decoded archives travel through the engine as an [`EntryMap`]: relative,
//! forward-slash separated paths mapped to file bytes. Directory markers are
//! paths ending in `/` mapped to an empty buffer.

use std::collections::BTreeMap;

pub type EntryMap = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative path without the trailing `/` of directory markers
    pub path: String,
    pub is_dir: bool,
    /// Always `Some` for files, `None` for directories
    pub content: Option<Vec<u8>>,
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            content: Some(content),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            content: None,
        }
    }

    pub fn size(&self) -> usize {
        self.content.as_ref().map_or(0, Vec::len)
    }
}

pub fn is_directory_marker(path: &str) -> bool {
    path.ends_with('/')
}

/// Split a decoded mapping into `(files, directories)`, both in path order
pub fn partition_entries(entries: EntryMap) -> (Vec<ArchiveEntry>, Vec<ArchiveEntry>) {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for (path, content) in entries {
        if is_directory_marker(&path) {
            let trimmed = path.trim_end_matches('/');
            if !trimmed.is_empty() {
                dirs.push(ArchiveEntry::directory(trimmed));
            }
        } else {
            files.push(ArchiveEntry::file(path, content));
        }
    }
    (files, dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_entries_separates_directory_markers() {
        let mut map = EntryMap::new();
        map.insert("docs/".to_string(), Vec::new());
        map.insert("docs/a.txt".to_string(), b"a".to_vec());
        map.insert("empty.txt".to_string(), Vec::new());

        let (files, dirs) = partition_entries(map);
        assert_eq!(dirs, vec![ArchiveEntry::directory("docs")]);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "docs/a.txt");
        assert_eq!(files[1].path, "empty.txt");
        assert_eq!(files[1].content, Some(Vec::new()));
        assert_eq!(files[1].size(), 0);
    }
}
