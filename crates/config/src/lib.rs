//! Layered configuration for shelfmark.
//!
//! Configuration is merged from three layers, lowest priority first:
//! built-in defaults, an optional TOML file, and `SHELFMARK_`-prefixed
//! environment variables (`__` as section separator). A missing file is
//! not an error; a malformed one is.

pub mod error;

use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Policy for a confirmed or manually-edited record whose backing file has
/// disappeared from disk. Automated cleanup never applies `Delete` to such
/// records unless explicitly configured to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFilePolicy {
    /// Delete the record along with its vanished file.
    Delete,
    /// Keep the record untouched; it simply loses its file path.
    Retain,
    /// Keep the record but move it to "needs review" so the user notices.
    #[default]
    Flag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Default root directory to scan when none is given on the command line.
    pub root: Option<PathBuf>,
    /// What to do with confirmed/manual records whose file vanished.
    pub missing_file_policy: MissingFilePolicy,
    /// How many records may be enriched concurrently during phase three.
    pub enrich_concurrency: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: None,
            missing_file_policy: MissingFilePolicy::default(),
            enrich_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the catalog database. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Google Books API key. Absence degrades that source to its
    /// unauthenticated, lower-quota mode rather than disabling it.
    pub google_api_key: Option<String>,
    /// Timeout applied to every outbound lookup, in seconds.
    pub timeout_secs: u64,
    /// How long cached source responses stay fresh, in days.
    pub cache_ttl_days: i64,
    /// Minimum delay between live calls to the same source, in milliseconds.
    pub min_interval_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            google_api_key: None,
            timeout_secs: 6,
            cache_ttl_days: 30,
            min_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub database: DatabaseConfig,
    pub sources: SourcesConfig,
}

impl Config {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self> {
        let file = Self::default_file_path()?;
        Self::load_from(&file)
    }

    /// Load configuration, merging the given TOML file (if it exists) and
    /// `SHELFMARK_*` environment variables over the defaults.
    pub fn load_from(file: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(file.as_ref()))
            .merge(Env::prefixed("SHELFMARK_").split("__"))
            .extract()
            .or_raise(|| ErrorKind::Invalid)?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Resolve the database path, falling back to the platform data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("", "", "shelfmark").ok_or_raise(|| ErrorKind::NoDataDir)?;
        Ok(dirs.data_dir().join("catalog.db"))
    }

    fn default_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "shelfmark").ok_or_raise(|| ErrorKind::NoDataDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}
