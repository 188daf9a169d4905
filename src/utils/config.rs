//! Runtime configuration
//!
//! Read from TOML; every key is optional and falls back to its default.
//!
//! ```toml
//! [engine]
//! upload_concurrency = 4
//! failure_policy = "fail-if-none-succeed"   # or "best-effort", { abort-after = 3 }
//! conflict_policy = "keep-both"             # or "overwrite", "skip"
//! compression_level = 6
//! preserve_empty_dirs = true
//!
//! [limits]
//! max_depth = 64
//! max_items = 50000
//! max_total_bytes = 2147483648
//!
//! [drive]
//! api_base = "https://www.googleapis.com"
//! access_token_env = "ZIPDRIVE_ACCESS_TOKEN"
//! request_timeout_secs = 120
//! ```

use crate::remote::ConflictPolicy;
use crate::utils::error::{Result, ZipDriveError};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ZIPDRIVE_CONFIG";
const MAX_COMPRESSION_LEVEL: u32 = 9;

/// When per-file upload failures turn into a failed job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadFailurePolicy {
    /// Never fail because of individual files
    BestEffort,
    /// Fail only when every file failed
    #[default]
    FailIfNoneSucceed,
    /// Stop dispatching and fail once this many files have failed
    AbortAfter(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Uploads in flight at once
    pub upload_concurrency: usize,
    pub failure_policy: UploadFailurePolicy,
    pub conflict_policy: ConflictPolicy,
    /// 0 (store) ..= 9 (best)
    pub compression_level: u32,
    /// Recreate directories that hold no files
    pub preserve_empty_dirs: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            upload_concurrency: 4,
            failure_policy: UploadFailurePolicy::default(),
            conflict_policy: ConflictPolicy::default(),
            compression_level: 6,
            preserve_empty_dirs: true,
        }
    }
}

/// Bounds on recursive enumeration during compression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationLimits {
    pub max_depth: usize,
    pub max_items: usize,
    pub max_total_bytes: u64,
}

impl Default for EnumerationLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_items: 50_000,
            max_total_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    pub api_base: String,
    /// Name of the environment variable holding the bearer token
    pub access_token_env: String,
    pub request_timeout_secs: u64,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com".to_string(),
            access_token_env: "ZIPDRIVE_ACCESS_TOKEN".to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineOptions,
    pub limits: EnumerationLimits,
    pub drive: DriveSettings,
}

impl Config {
    /// Load from `explicit`, else `$ZIPDRIVE_CONFIG`, else the user config directory.
    ///
    /// An explicitly named file must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(custom) = env::var(CONFIG_ENV) {
            let trimmed = custom.trim();
            if !trimmed.is_empty() {
                return Self::from_file(Path::new(trimmed));
            }
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("zipdrive").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ZipDriveError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ZipDriveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.upload_concurrency == 0 {
            return Err(ZipDriveError::Config(
                "engine.upload_concurrency must be at least 1".to_string(),
            ));
        }
        if self.engine.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(ZipDriveError::Config(format!(
                "engine.compression_level must be between 0 and {}",
                MAX_COMPRESSION_LEVEL
            )));
        }
        if self.engine.failure_policy == UploadFailurePolicy::AbortAfter(0) {
            return Err(ZipDriveError::Config(
                "engine.failure_policy abort-after must be at least 1".to_string(),
            ));
        }
        if self.limits.max_items == 0 {
            return Err(ZipDriveError::Config(
                "limits.max_items must be at least 1".to_string(),
            ));
        }
        if self.drive.api_base.trim().is_empty() {
            return Err(ZipDriveError::Config("drive.api_base is empty".to_string()));
        }
        Ok(())
    }

    /// Bearer token from the environment variable named in `[drive]`
    pub fn access_token(&self) -> Result<String> {
        let name = &self.drive.access_token_env;
        match env::var(name) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(ZipDriveError::Config(format!(
                "access token not set (export {})",
                name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").expect("parse empty");
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.upload_concurrency, 4);
        assert_eq!(config.engine.compression_level, 6);
        assert_eq!(
            config.engine.failure_policy,
            UploadFailurePolicy::FailIfNoneSucceed
        );
        assert_eq!(config.engine.conflict_policy, ConflictPolicy::KeepBoth);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::from_toml_str(
            r#"
            [engine]
            upload_concurrency = 8
            failure_policy = { abort-after = 3 }
            conflict_policy = "skip"

            [limits]
            max_depth = 5
            "#,
        )
        .expect("parse config");
        assert_eq!(config.engine.upload_concurrency, 8);
        assert_eq!(
            config.engine.failure_policy,
            UploadFailurePolicy::AbortAfter(3)
        );
        assert_eq!(config.engine.conflict_policy, ConflictPolicy::Skip);
        assert!(config.engine.preserve_empty_dirs);
        assert_eq!(config.limits.max_depth, 5);
        assert_eq!(config.limits.max_items, 50_000);
        assert_eq!(config.drive, DriveSettings::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml_str("[engine]\nupload_concurrency = 0"),
            Err(ZipDriveError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[engine]\ncompression_level = 12"),
            Err(ZipDriveError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[engine]\nfailure_policy = \"sometimes\""),
            Err(ZipDriveError::Config(_))
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempdir().expect("create tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[engine]\nfailure_policy = \"best-effort\"\n").expect("write config");

        let config = Config::load(Some(&path)).expect("load config");
        assert_eq!(config.engine.failure_policy, UploadFailurePolicy::BestEffort);

        let missing = temp.path().join("missing.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
