//! Staging engine for container formats without a direct in-memory decoder
//!
//! The input is written into a private temporary directory, the format's
//! extractor unpacks it there, and the produced tree is walked back into a
//! flat [`EntryMap`]. 7z encoding goes the other way through the same staging.

use super::archive::{ArchiveFormat, DecodedArchive};
use super::path_safety::sanitize;
use crate::models::EntryMap;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::Archive as TarArchive;
use tracing::{debug, warn};
use zstd::stream::read::Decoder as ZstdDecoder;

const STAGED_ARCHIVE_NAME: &str = "archive.tmp";
const EXTRACT_DIR_NAME: &str = "extracted";

/// Unpack `bytes` under a private temp dir and read the tree back.
///
/// Entry names are validated before anything is written; unsafe ones are
/// skipped and returned in `rejected`.
pub(crate) fn extract_via_staging(
    bytes: &[u8],
    format: ArchiveFormat,
) -> Result<DecodedArchive, String> {
    let staging = tempfile::Builder::new()
        .prefix("zipdrive-")
        .tempdir()
        .map_err(|e| e.to_string())?;
    let archive_path = staging.path().join(STAGED_ARCHIVE_NAME);
    let extract_dir = staging.path().join(EXTRACT_DIR_NAME);
    fs::write(&archive_path, bytes).map_err(|e| e.to_string())?;
    fs::create_dir_all(&extract_dir).map_err(|e| e.to_string())?;

    let rejected = run_extractor(&archive_path, &extract_dir, format)?;
    let entries = collect_tree(&extract_dir).map_err(|e| e.to_string())?;
    Ok(DecodedArchive { entries, rejected })
}

fn run_extractor(
    archive_path: &Path,
    dest: &Path,
    format: ArchiveFormat,
) -> Result<Vec<String>, String> {
    let file = File::open(archive_path).map_err(|e| e.to_string())?;
    match format {
        ArchiveFormat::Zip => Err("zip archives are decoded in memory".to_string()),
        ArchiveFormat::Tar => unpack_tar(TarArchive::new(file), dest).map_err(|e| e.to_string()),
        ArchiveFormat::TarGz => {
            unpack_tar(TarArchive::new(GzDecoder::new(file)), dest).map_err(|e| e.to_string())
        }
        ArchiveFormat::TarZst => {
            let decoder = ZstdDecoder::new(file).map_err(|e| e.to_string())?;
            unpack_tar(TarArchive::new(decoder), dest).map_err(|e| e.to_string())
        }
        ArchiveFormat::SevenZ => unpack_7z(file, dest),
    }
}

/// Target under `dest` for a raw entry name; unsafe names land in `rejected`
fn staged_target(dest: &Path, raw: &str, rejected: &mut Vec<String>) -> Option<PathBuf> {
    match sanitize(raw) {
        Ok(clean) => Some(dest.join(clean.trim_end_matches('/'))),
        Err(reason) => {
            warn!(path = %raw.escape_debug(), %reason, "dropping unsafe archive entry");
            rejected.push(raw.to_string());
            None
        }
    }
}

fn write_staged_file(target: &Path, reader: &mut dyn Read) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = File::create(target)?;
    io::copy(reader, &mut writer)?;
    Ok(())
}

fn unpack_tar<R: Read>(mut archive: TarArchive<R>, dest: &Path) -> io::Result<Vec<String>> {
    let mut rejected = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw = String::from_utf8_lossy(&entry.path_bytes()).to_string();
        let Some(target) = staged_target(dest, &raw, &mut rejected) else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry_type.is_file() {
            write_staged_file(&target, &mut entry)?;
        } else {
            // links and devices are never materialized
            debug!(path = %raw, ?entry_type, "skipping non-regular tar entry");
        }
    }
    Ok(rejected)
}

fn unpack_7z(file: File, dest: &Path) -> Result<Vec<String>, String> {
    let mut rejected = Vec::new();
    let mut write_error: Option<io::Error> = None;

    let mut extract_fn = |entry: &sevenz_rust2::SevenZArchiveEntry,
                          reader: &mut dyn Read,
                          _output_path: &PathBuf|
     -> std::result::Result<bool, sevenz_rust2::Error> {
        let Some(target) = staged_target(dest, &entry.name, &mut rejected) else {
            // solid blocks share one stream; drain so the next entry lines up
            io::copy(reader, &mut io::sink()).map_err(sevenz_rust2::Error::io)?;
            return Ok(true);
        };
        let written = if entry.is_directory {
            fs::create_dir_all(&target)
        } else {
            write_staged_file(&target, reader)
        };
        match written {
            Ok(()) => Ok(true),
            Err(e) => {
                write_error = Some(e);
                Ok(false)
            }
        }
    };

    sevenz_rust2::decompress_with_extract_fn(file, dest, &mut extract_fn)
        .map_err(|e| e.to_string())?;
    if let Some(e) = write_error {
        return Err(e.to_string());
    }
    Ok(rejected)
}

/// Walk `root` with an explicit worklist; directories become `dir/` markers
pub(crate) fn collect_tree(root: &Path) -> io::Result<EntryMap> {
    let mut entries = EntryMap::new();
    let mut pending: Vec<(PathBuf, String)> = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };

            let meta = fs::symlink_metadata(entry.path())?;
            if meta.is_dir() {
                entries.insert(format!("{}/", relative), Vec::new());
                pending.push((entry.path(), relative));
            } else if meta.is_file() {
                entries.insert(relative, fs::read(entry.path())?);
            }
        }
    }

    Ok(entries)
}

/// Materialize `entries` under a staging directory and pack it with 7z
pub(crate) fn compress_7z_via_staging(entries: &EntryMap) -> Result<Vec<u8>, String> {
    let staging = tempfile::Builder::new()
        .prefix("zipdrive-7z-")
        .tempdir()
        .map_err(|e| e.to_string())?;
    let source_dir = staging.path().join("source");
    let output_path = staging.path().join("output.7z");
    stage_entries(entries, &source_dir).map_err(|e| e.to_string())?;

    sevenz_rust2::compress_to_path(&source_dir, &output_path).map_err(|e| e.to_string())?;
    fs::read(&output_path).map_err(|e| e.to_string())
}

fn stage_entries(entries: &EntryMap, source_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(source_dir)?;

    for (path, content) in entries {
        let Ok(clean) = super::path_safety::sanitize(path) else {
            continue;
        };
        let dest = source_dir.join(clean.trim_end_matches('/'));
        if clean.ends_with('/') {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, content)?;
    }
    Ok(())
}
