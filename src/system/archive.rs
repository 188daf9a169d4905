use super::path_safety::sanitize;
use super::staging::{compress_7z_via_staging, extract_via_staging};
use crate::models::entry::is_directory_marker;
use crate::models::EntryMap;
use crate::utils::error::{Result, ZipDriveError};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Cursor, Read, Write};
use tar::{Builder as TarBuilder, EntryType, Header as TarHeader};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions as ZipFileOptions;
use zip::{CompressionMethod, DateTime as ZipDateTime, ZipArchive, ZipWriter};
use zstd::stream::write::Encoder as ZstdEncoder;

type EngineResult<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarZst,
    SevenZ,
}

impl ArchiveFormat {
    /// Resolve the format from a file name (case-insensitive)
    pub fn detect(name: &str) -> Option<ArchiveFormat> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            return Some(ArchiveFormat::TarGz);
        }
        if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            return Some(ArchiveFormat::TarZst);
        }
        match lower.rsplit_once('.')?.1 {
            "zip" | "jar" | "war" => Some(ArchiveFormat::Zip),
            "tar" => Some(ArchiveFormat::Tar),
            "7z" => Some(ArchiveFormat::SevenZ),
            _ => None,
        }
    }

    /// Parse a user-facing format name (`zip`, `tar.gz`, ...)
    pub fn from_display_name(name: &str) -> Option<ArchiveFormat> {
        match name.trim().to_ascii_lowercase().as_str() {
            "zip" => Some(ArchiveFormat::Zip),
            "tar" => Some(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Some(ArchiveFormat::TarGz),
            "tar.zst" | "tzst" => Some(ArchiveFormat::TarZst),
            "7z" => Some(ArchiveFormat::SevenZ),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarZst => "tar.zst",
            ArchiveFormat::SevenZ => "7z",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::Tar => ".tar",
            ArchiveFormat::TarGz => ".tar.gz",
            ArchiveFormat::TarZst => ".tar.zst",
            ArchiveFormat::SevenZ => ".7z",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::Tar => "application/x-tar",
            ArchiveFormat::TarGz => "application/gzip",
            ArchiveFormat::TarZst => "application/zstd",
            ArchiveFormat::SevenZ => "application/x-7z-compressed",
        }
    }

    pub fn engine(&self) -> &'static dyn ArchiveEngine {
        match self {
            ArchiveFormat::Zip => &ZIP_ENGINE,
            ArchiveFormat::Tar => &TAR_ENGINE,
            ArchiveFormat::TarGz => &TAR_GZ_ENGINE,
            ArchiveFormat::TarZst => &TAR_ZST_ENGINE,
            ArchiveFormat::SevenZ => &SEVEN_Z_ENGINE,
        }
    }
}

/// Entries that survived path validation, plus the raw paths that did not
#[derive(Debug, Clone, Default)]
pub struct DecodedArchive {
    pub entries: EntryMap,
    pub rejected: Vec<String>,
}

/// Decoder/encoder bound to one [`ArchiveFormat`]
pub trait ArchiveEngine: Sync {
    fn decode(&self, bytes: &[u8]) -> EngineResult<DecodedArchive>;
    fn encode(&self, entries: &EntryMap, level: u32) -> EngineResult<Vec<u8>>;
}

/// Zip, decoded directly from memory
pub struct ZipEngine;

#[derive(Debug, Clone, Copy)]
enum TarCompression {
    None,
    Gzip,
    Zstd,
}

/// Tar family, decoded through the staging engine
pub struct TarEngine {
    compression: TarCompression,
}

/// 7z, decoded and encoded through the staging engine
pub struct SevenZEngine;

static ZIP_ENGINE: ZipEngine = ZipEngine;
static TAR_ENGINE: TarEngine = TarEngine {
    compression: TarCompression::None,
};
static TAR_GZ_ENGINE: TarEngine = TarEngine {
    compression: TarCompression::Gzip,
};
static TAR_ZST_ENGINE: TarEngine = TarEngine {
    compression: TarCompression::Zstd,
};
static SEVEN_Z_ENGINE: SevenZEngine = SevenZEngine;

/// Upper bound on the buffer reserved from a zip entry's declared size
const MAX_PREALLOC: u64 = 1024 * 1024;

fn read_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOC) as usize
}

impl ArchiveEngine for ZipEngine {
    fn decode(&self, bytes: &[u8]) -> EngineResult<DecodedArchive> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
        let mut entries = EntryMap::new();
        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx).map_err(|e| e.to_string())?;
            let name = entry.name().to_string();
            if entry.is_dir() {
                let marker = if is_directory_marker(&name) {
                    name
                } else {
                    format!("{}/", name)
                };
                entries.insert(marker, Vec::new());
                continue;
            }
            let mut content = Vec::with_capacity(read_capacity(entry.size()));
            entry
                .read_to_end(&mut content)
                .map_err(|e| format!("{}: {}", name, e))?;
            entries.insert(name, content);
        }
        Ok(filter_safe_entries(entries))
    }

    fn encode(&self, entries: &EntryMap, level: u32) -> EngineResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = if level == 0 {
            ZipFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            ZipFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(level)))
        }
        .last_modified_time(ZipDateTime::default());

        for (path, content) in entries {
            if is_directory_marker(path) {
                writer
                    .add_directory(path.clone(), options)
                    .map_err(|e| e.to_string())?;
                continue;
            }
            writer
                .start_file(path.clone(), options)
                .map_err(|e| e.to_string())?;
            writer.write_all(content).map_err(|e| e.to_string())?;
        }

        let cursor = writer.finish().map_err(|e| e.to_string())?;
        Ok(cursor.into_inner())
    }
}

impl ArchiveEngine for TarEngine {
    fn decode(&self, bytes: &[u8]) -> EngineResult<DecodedArchive> {
        let format = match self.compression {
            TarCompression::None => ArchiveFormat::Tar,
            TarCompression::Gzip => ArchiveFormat::TarGz,
            TarCompression::Zstd => ArchiveFormat::TarZst,
        };
        extract_via_staging(bytes, format)
    }

    fn encode(&self, entries: &EntryMap, level: u32) -> EngineResult<Vec<u8>> {
        match self.compression {
            TarCompression::None => {
                let mut builder = TarBuilder::new(Vec::new());
                append_tar_entries(&mut builder, entries).map_err(|e| e.to_string())?;
                builder.into_inner().map_err(|e| e.to_string())
            }
            TarCompression::Gzip => {
                let encoder = GzEncoder::new(Vec::new(), Compression::new(level));
                let mut builder = TarBuilder::new(encoder);
                append_tar_entries(&mut builder, entries).map_err(|e| e.to_string())?;
                let encoder = builder.into_inner().map_err(|e| e.to_string())?;
                encoder.finish().map_err(|e| e.to_string())
            }
            TarCompression::Zstd => {
                let encoder =
                    ZstdEncoder::new(Vec::new(), level as i32).map_err(|e| e.to_string())?;
                let mut builder = TarBuilder::new(encoder);
                append_tar_entries(&mut builder, entries).map_err(|e| e.to_string())?;
                let encoder = builder.into_inner().map_err(|e| e.to_string())?;
                encoder.finish().map_err(|e| e.to_string())
            }
        }
    }
}

impl ArchiveEngine for SevenZEngine {
    fn decode(&self, bytes: &[u8]) -> EngineResult<DecodedArchive> {
        extract_via_staging(bytes, ArchiveFormat::SevenZ)
    }

    fn encode(&self, entries: &EntryMap, _level: u32) -> EngineResult<Vec<u8>> {
        compress_7z_via_staging(entries)
    }
}

fn append_tar_entries<W: Write>(builder: &mut TarBuilder<W>, entries: &EntryMap) -> io::Result<()> {
    for (path, content) in entries {
        let mut header = TarHeader::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        if is_directory_marker(path) {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder.append_data(&mut header, path.trim_end_matches('/'), io::empty())?;
        } else {
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(content.len() as u64);
            builder.append_data(&mut header, path, content.as_slice())?;
        }
    }
    Ok(())
}

/// Guess a container format from magic numbers; only used to pick a fallback engine
pub fn sniff_format(bytes: &[u8]) -> Option<ArchiveFormat> {
    const SEVEN_Z_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
    const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
    const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

    if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
        Some(ArchiveFormat::Zip)
    } else if bytes.starts_with(SEVEN_Z_MAGIC) {
        Some(ArchiveFormat::SevenZ)
    } else if bytes.starts_with(GZIP_MAGIC) {
        Some(ArchiveFormat::TarGz)
    } else if bytes.starts_with(ZSTD_MAGIC) {
        Some(ArchiveFormat::TarZst)
    } else if bytes.get(257..262) == Some(b"ustar".as_slice()) {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

/// Decode `bytes`, choosing the engine from `hint_name`'s extension.
///
/// A zip-hinted archive the zip engine cannot read is retried with the staging
/// engine before giving up.
pub fn decode(bytes: &[u8], hint_name: &str) -> Result<DecodedArchive> {
    let decode_failed = |reason: String| ZipDriveError::ArchiveDecodeFailed {
        name: hint_name.to_string(),
        reason,
    };

    let decoded = match ArchiveFormat::detect(hint_name) {
        Some(ArchiveFormat::Zip) => match ZIP_ENGINE.decode(bytes) {
            Ok(decoded) => decoded,
            Err(reason) => {
                let fallback = match sniff_format(bytes) {
                    Some(format) if format != ArchiveFormat::Zip => format,
                    _ => ArchiveFormat::SevenZ,
                };
                warn!(
                    archive = hint_name,
                    %reason,
                    fallback = fallback.display_name(),
                    "zip decoding failed, retrying with staging engine"
                );
                fallback.engine().decode(bytes).map_err(|fallback_reason| {
                    decode_failed(format!("{}; fallback: {}", reason, fallback_reason))
                })?
            }
        },
        Some(format) => format.engine().decode(bytes).map_err(decode_failed)?,
        None => {
            let format =
                sniff_format(bytes).ok_or_else(|| ZipDriveError::ArchiveUnsupportedFormat {
                    name: hint_name.to_string(),
                })?;
            format.engine().decode(bytes).map_err(decode_failed)?
        }
    };

    if decoded.entries.is_empty() {
        return Err(ZipDriveError::ArchiveEmpty {
            name: hint_name.to_string(),
        });
    }
    debug!(
        archive = hint_name,
        entries = decoded.entries.len(),
        rejected = decoded.rejected.len(),
        "archive decoded"
    );
    Ok(decoded)
}

fn filter_safe_entries(raw: EntryMap) -> DecodedArchive {
    let mut decoded = DecodedArchive::default();
    for (path, content) in raw {
        match sanitize(&path) {
            Ok(clean) => {
                decoded.entries.insert(clean, content);
            }
            Err(reason) => {
                warn!(path = %path.escape_debug(), %reason, "dropping unsafe archive entry");
                decoded.rejected.push(path);
            }
        }
    }
    decoded
}

/// Encode `entries` into a single archive buffer
pub fn encode(entries: &EntryMap, format: ArchiveFormat, level: u32) -> Result<Vec<u8>> {
    format
        .engine()
        .encode(entries, level)
        .map_err(|reason| ZipDriveError::ArchiveEncodeFailed { reason })
}

/// Folder name for an archive: its display name without the archive extension
pub fn archive_base_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    let suffixes = [
        ".tar.gz", ".tar.zst", ".tgz", ".tzst", ".zip", ".7z", ".jar", ".war", ".tar",
    ];
    for suffix in suffixes {
        if lower.ends_with(suffix) && file_name.len() > suffix.len() {
            let base = &file_name[..file_name.len() - suffix.len()];
            if !base.trim().is_empty() {
                return base.to_string();
            }
        }
    }

    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.trim().is_empty() => stem.to_string(),
        _ if !file_name.trim().is_empty() => file_name.to_string(),
        _ => "archive".to_string(),
    }
}

/// Append the format's extension unless the name already carries it
pub fn with_archive_extension(name: &str, format: ArchiveFormat) -> String {
    let trimmed = name.trim();
    if trimmed.to_ascii_lowercase().ends_with(format.extension()) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::write::SimpleFileOptions;

    fn sample_entries() -> EntryMap {
        let mut entries = EntryMap::new();
        entries.insert("alpha.txt".to_string(), b"alpha".to_vec());
        entries.insert("nested/beta.txt".to_string(), "베타 beta".as_bytes().to_vec());
        entries.insert("nested/empty.txt".to_string(), Vec::new());
        entries
    }

    fn zip_with_raw_names(names: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in names {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(content).expect("write entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    fn seven_z_with_raw_names(names: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = sevenz_rust2::SevenZWriter::new(Cursor::new(Vec::new()))
            .expect("create 7z writer");
        for (name, content) in names {
            writer
                .push_archive_entry(sevenz_rust2::SevenZArchiveEntry::new_file(name), Some(*content))
                .expect("push 7z entry");
        }
        writer.finish().expect("finish 7z").into_inner()
    }

    fn tar_gz_with_raw_names(names: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = TarBuilder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, content) in names {
            let raw = name.as_bytes();
            let mut header = TarHeader::new_gnu();
            header.as_old_mut().name[..raw.len()].copy_from_slice(raw);
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(content.len() as u64);
            header.set_cksum();
            builder.append(&header, *content).expect("append tar entry");
        }
        let encoder = builder.into_inner().expect("finish tar");
        encoder.finish().expect("finish gzip")
    }

    /// A relative and an absolute name that would both land directly in the temp dir
    fn escaping_names(tag: &str) -> (String, String, std::path::PathBuf, std::path::PathBuf) {
        let pid = std::process::id();
        let relative_name = format!("zipdrive_escape_{}_{}_rel.txt", pid, tag);
        let absolute_path =
            std::env::temp_dir().join(format!("zipdrive_escape_{}_{}_abs.txt", pid, tag));
        (
            format!("../../{}", relative_name),
            absolute_path.to_string_lossy().to_string(),
            std::env::temp_dir().join(relative_name),
            absolute_path,
        )
    }

    #[test]
    fn test_detect_archive_format() {
        assert_eq!(ArchiveFormat::detect("a.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("A.ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("a.jar"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("a.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("a.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("a.tar.zst"), Some(ArchiveFormat::TarZst));
        assert_eq!(ArchiveFormat::detect("a.tzst"), Some(ArchiveFormat::TarZst));
        assert_eq!(ArchiveFormat::detect("a.7z"), Some(ArchiveFormat::SevenZ));
        assert_eq!(ArchiveFormat::detect("a.rar"), None);
        assert_eq!(ArchiveFormat::detect("noext"), None);
    }

    #[test]
    fn test_zip_roundtrip() {
        let entries = sample_entries();
        let bytes = encode(&entries, ArchiveFormat::Zip, 6).expect("encode zip");
        let decoded = decode(&bytes, "sample.zip").expect("decode zip");
        assert_eq!(decoded.entries, entries);
        assert!(decoded.rejected.is_empty());
    }

    #[test]
    fn test_tar_family_roundtrip() {
        let entries = sample_entries();
        for (format, name) in [
            (ArchiveFormat::Tar, "sample.tar"),
            (ArchiveFormat::TarGz, "sample.tar.gz"),
            (ArchiveFormat::TarZst, "sample.tar.zst"),
        ] {
            let bytes = encode(&entries, format, 6).expect("encode tar");
            let decoded = decode(&bytes, name).expect("decode tar");
            for (path, content) in &entries {
                assert_eq!(decoded.entries.get(path), Some(content), "{}", name);
            }
        }
    }

    #[test]
    fn test_7z_roundtrip() {
        let mut entries = sample_entries();
        entries.remove("nested/empty.txt");
        let bytes = encode(&entries, ArchiveFormat::SevenZ, 6).expect("encode 7z");
        let decoded = decode(&bytes, "sample.7z").expect("decode 7z");
        for (path, content) in &entries {
            assert_eq!(decoded.entries.get(path), Some(content));
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let entries = sample_entries();
        for format in [ArchiveFormat::Zip, ArchiveFormat::TarGz, ArchiveFormat::TarZst] {
            let first = encode(&entries, format, 6).expect("first encode");
            let second = encode(&entries, format, 6).expect("second encode");
            assert_eq!(first, second, "{}", format.display_name());
        }
    }

    #[test]
    fn test_zip_directory_markers_roundtrip() {
        let mut entries = sample_entries();
        entries.insert("empty-dir/".to_string(), Vec::new());
        let bytes = encode(&entries, ArchiveFormat::Zip, 0).expect("encode zip");
        let decoded = decode(&bytes, "dirs.zip").expect("decode zip");
        assert_eq!(decoded.entries.get("empty-dir/"), Some(&Vec::new()));
    }

    #[test]
    fn test_decode_drops_unsafe_entries() {
        let bytes = zip_with_raw_names(&[
            ("../evil.txt", b"evil"),
            ("/abs.txt", b"abs"),
            ("safe.txt", b"safe"),
        ]);
        let decoded = decode(&bytes, "unsafe.zip").expect("decode zip");
        assert_eq!(decoded.entries.len(), 1);
        assert_eq!(decoded.entries.get("safe.txt"), Some(&b"safe".to_vec()));
        assert_eq!(decoded.rejected.len(), 2);
    }

    #[test]
    fn test_7z_unsafe_entries_never_leave_staging() {
        let (relative, absolute, relative_target, absolute_target) = escaping_names("7z");
        let bytes = seven_z_with_raw_names(&[
            (relative.as_str(), b"evil"),
            (absolute.as_str(), b"abs"),
            ("safe.txt", b"safe"),
        ]);

        let decoded = decode(&bytes, "unsafe.7z").expect("decode 7z");
        assert_eq!(decoded.entries.len(), 1);
        assert_eq!(decoded.entries.get("safe.txt"), Some(&b"safe".to_vec()));
        assert_eq!(decoded.rejected.len(), 2);
        assert!(!relative_target.exists(), "{}", relative_target.display());
        assert!(!absolute_target.exists(), "{}", absolute_target.display());
    }

    #[test]
    fn test_tar_gz_unsafe_entries_never_leave_staging() {
        let (relative, absolute, relative_target, absolute_target) = escaping_names("tgz");
        let bytes = tar_gz_with_raw_names(&[
            (relative.as_str(), b"evil"),
            (absolute.as_str(), b"abs"),
            ("safe.txt", b"safe"),
        ]);

        let decoded = decode(&bytes, "unsafe.tar.gz").expect("decode tar.gz");
        assert_eq!(decoded.entries.len(), 1);
        assert_eq!(decoded.entries.get("safe.txt"), Some(&b"safe".to_vec()));
        assert_eq!(decoded.rejected, vec![relative, absolute]);
        assert!(!relative_target.exists(), "{}", relative_target.display());
        assert!(!absolute_target.exists(), "{}", absolute_target.display());
    }

    #[test]
    fn test_zip_fallback_to_7z_drops_unsafe_entries() {
        let (relative, _, relative_target, _) = escaping_names("fallback");
        let bytes = seven_z_with_raw_names(&[(relative.as_str(), b"evil"), ("safe.txt", b"safe")]);

        let decoded = decode(&bytes, "mislabeled.zip").expect("fallback decode");
        assert_eq!(decoded.entries.len(), 1);
        assert_eq!(decoded.rejected, vec![relative]);
        assert!(!relative_target.exists());
    }

    #[test]
    fn test_read_capacity_ignores_inflated_sizes() {
        assert_eq!(read_capacity(0), 0);
        assert_eq!(read_capacity(4096), 4096);
        assert_eq!(read_capacity(u64::MAX), MAX_PREALLOC as usize);
    }

    #[test]
    fn test_decode_all_unsafe_is_empty_failure() {
        let bytes = zip_with_raw_names(&[("../evil.txt", b"evil")]);
        let result = decode(&bytes, "evil.zip");
        assert!(matches!(result, Err(ZipDriveError::ArchiveEmpty { .. })));
    }

    #[test]
    fn test_decode_empty_zip_is_failure() {
        let bytes = zip_with_raw_names(&[]);
        let result = decode(&bytes, "empty.zip");
        assert!(matches!(result, Err(ZipDriveError::ArchiveEmpty { .. })));
    }

    #[test]
    fn test_zip_hint_falls_back_to_staging_engine() {
        let entries = sample_entries();
        let tar_gz = encode(&entries, ArchiveFormat::TarGz, 6).expect("encode tar.gz");
        let decoded = decode(&tar_gz, "mislabeled.zip").expect("fallback decode");
        assert_eq!(
            decoded.entries.get("alpha.txt"),
            Some(&b"alpha".to_vec())
        );
    }

    #[test]
    fn test_corrupted_zip_reports_decode_failure() {
        let result = decode(b"PK\x03\x04 truncated garbage", "broken.zip");
        assert!(matches!(
            result,
            Err(ZipDriveError::ArchiveDecodeFailed { .. })
        ));
    }

    #[test]
    fn test_unknown_extension_uses_magic_numbers() {
        let entries = sample_entries();
        let bytes = encode(&entries, ArchiveFormat::Zip, 6).expect("encode zip");
        assert_eq!(sniff_format(&bytes), Some(ArchiveFormat::Zip));
        let decoded = decode(&bytes, "download.bin").expect("decode sniffed");
        assert_eq!(decoded.entries.len(), entries.len());

        let result = decode(b"plain text", "notes.bin");
        assert!(matches!(
            result,
            Err(ZipDriveError::ArchiveUnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_archive_base_name() {
        assert_eq!(archive_base_name("photos.zip"), "photos");
        assert_eq!(archive_base_name("backup.tar.gz"), "backup");
        assert_eq!(archive_base_name("Data.TZST"), "Data");
        assert_eq!(archive_base_name("report.v2.rar"), "report.v2");
        assert_eq!(archive_base_name("noext"), "noext");
        assert_eq!(archive_base_name(".zip"), ".zip");
        assert_eq!(archive_base_name(""), "archive");
    }

    #[test]
    fn test_with_archive_extension() {
        assert_eq!(with_archive_extension("out", ArchiveFormat::Zip), "out.zip");
        assert_eq!(with_archive_extension("out.ZIP", ArchiveFormat::Zip), "out.ZIP");
        assert_eq!(
            with_archive_extension("out.zip", ArchiveFormat::TarGz),
            "out.zip.tar.gz"
        );
    }
}
