//! Application configuration management.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config <FILE>`, or `config.toml` in the platform config
//!    directory when present)
//! 3. Environment variables prefixed with `TREEMERGE_` (`__` separates nested
//!    keys)
//! 4. Command-line flags, applied by the caller
//!
//! ```toml
//! io_threads = 8
//! mode = "content"
//! prefer = "b"
//! keep_both = false
//! ignore_patterns = ["*.tmp", ".git/"]
//! result_dir = "dedup_result"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::{MaterializeConfig, MergePolicy, DEFAULT_RESULT_DIR};
use crate::duplicates::CompareMode;
use crate::engine::{EngineConfig, ReconcileOptions};
use crate::scanner::TreeSide;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TREEMERGE_";

/// Errors raised while loading or saving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// The configuration could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// I/O error while saving.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of I/O threads for content hashing.
    pub io_threads: usize,
    /// Descend into subdirectories.
    pub include_subtrees: bool,
    /// Equivalence rule.
    pub mode: CompareMode,
    /// Side whose copy survives a duplicate.
    pub prefer: TreeSide,
    /// Keep both copies of duplicates under per-source directories.
    pub keep_both: bool,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Gitignore-style patterns excluded while walking.
    pub ignore_patterns: Vec<String>,
    /// Name of the result directory under the output root.
    pub result_dir: String,
    /// Copy modification times onto materialized files.
    pub preserve_timestamps: bool,
    /// Replace an existing result directory.
    pub overwrite: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_threads: 4,
            include_subtrees: true,
            mode: CompareMode::NameOnly,
            prefer: TreeSide::A,
            keep_both: false,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            result_dir: DEFAULT_RESULT_DIR.to_string(),
            preserve_timestamps: true,
            overwrite: true,
        }
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file, and the environment.
    ///
    /// With `explicit` set, that file must exist. Otherwise the platform
    /// config file is used when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit file is missing or any layer
    /// fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        match file {
            Some(ref path) => log::debug!("Loading configuration from {}", path.display()),
            None => log::debug!("No configuration file, using defaults and environment"),
        }

        Self::figment(file.as_deref())
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// The figment behind [`Config::load`].
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Save the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "treemerge", "treemerge")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// The merge policy these settings describe.
    #[must_use]
    pub fn policy(&self) -> MergePolicy {
        MergePolicy {
            prefer_tree: self.prefer,
            include_both_on_conflict: self.keep_both,
        }
    }

    /// Per-call reconciliation options.
    #[must_use]
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            include_subtrees: self.include_subtrees,
            mode: self.mode,
            policy: self.policy(),
        }
    }

    /// Engine configuration without cancellation or progress wiring.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let materialize = MaterializeConfig::default()
            .with_result_dir(self.result_dir.clone())
            .with_overwrite(self.overwrite)
            .with_preserve_timestamps(self.preserve_timestamps);

        EngineConfig::default()
            .with_io_threads(self.io_threads)
            .with_skip_hidden(self.skip_hidden)
            .with_ignore_patterns(self.ignore_patterns.clone())
            .with_materialize_config(materialize)
    }
}
