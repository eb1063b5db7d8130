//! Command-line interface definitions for treemerge.
//!
//! All arguments and subcommands use the clap derive API. Global options
//! (verbosity, config file, JSON errors) work with every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Compare two backups by file name
//! treemerge compare ~/backup_2023 ~/backup_2024
//!
//! # Compare by content, top level only, as JSON
//! treemerge compare ~/a ~/b --mode content --shallow --format json
//!
//! # Merge into ~/merged/dedup_result, keeping B's copy of duplicates
//! treemerge merge ~/a ~/b --output ~/merged --prefer b
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::duplicates::CompareMode;
use crate::scanner::TreeSide;

/// Reconcile and deduplicate two directory trees.
///
/// treemerge compares two trees by file name or by content (BLAKE3), reports
/// what they share, and can write one merged tree without duplicates.
#[derive(Debug, Parser)]
#[command(name = "treemerge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML)
    ///
    /// Defaults to config.toml in the platform configuration directory.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print fatal errors as a JSON object on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare two trees and report duplicates and unique files
    Compare(CompareArgs),
    /// Compare two trees and write a deduplicated merge
    Merge(MergeArgs),
}

/// Arguments shared by both subcommands.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// First tree (A)
    #[arg(value_name = "DIR_A")]
    pub dir_a: PathBuf,

    /// Second tree (B)
    #[arg(value_name = "DIR_B")]
    pub dir_b: PathBuf,

    /// Equivalence rule (default: name)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Only consider files directly inside each root
    #[arg(long)]
    pub shallow: bool,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Glob patterns to ignore (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Output format for the result
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the merge subcommand.
#[derive(Debug, Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub compare: CompareArgs,

    /// Directory that receives the result directory
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Which tree's copy survives a duplicate (default: a)
    #[arg(long, value_enum, conflicts_with = "keep_both")]
    pub prefer: Option<PreferArg>,

    /// Keep both copies of duplicates under tree_a/ and tree_b/
    #[arg(long)]
    pub keep_both: bool,

    /// Name of the result directory created under --output
    ///
    /// It is removed and recreated on every run.
    #[arg(long, value_name = "NAME")]
    pub result_dir: Option<String>,

    /// Fail instead of replacing an existing result directory
    #[arg(long)]
    pub no_clobber: bool,

    /// Do not copy modification times onto merged files
    #[arg(long)]
    pub no_preserve_times: bool,
}

/// Equivalence rule selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Same file name
    Name,
    /// Same content (BLAKE3)
    Content,
}

impl From<ModeArg> for CompareMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Name => Self::NameOnly,
            ModeArg::Content => Self::ContentHash,
        }
    }
}

/// Preferred tree selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PreferArg {
    /// Keep tree A's copy
    A,
    /// Keep tree B's copy
    B,
}

impl From<PreferArg> for TreeSide {
    fn from(side: PreferArg) -> Self {
        match side {
            PreferArg::A => Self::A,
            PreferArg::B => Self::B,
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Human-readable listing and summary
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for FormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatArg::Text => write!(f, "text"),
            FormatArg::Json => write!(f, "json"),
        }
    }
}

impl CompareArgs {
    /// Overlay these flags on loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if self.shallow {
            config.include_subtrees = false;
        }
        if let Some(threads) = self.io_threads {
            config.io_threads = threads;
        }
        if self.skip_hidden {
            config.skip_hidden = true;
        }
        config
            .ignore_patterns
            .extend(self.ignore_patterns.iter().cloned());
    }
}

impl MergeArgs {
    /// Overlay these flags on loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        self.compare.apply_to(config);
        if let Some(prefer) = self.prefer {
            config.prefer = prefer.into();
            config.keep_both = false;
        }
        if self.keep_both {
            config.keep_both = true;
        }
        if let Some(ref name) = self.result_dir {
            config.result_dir = name.clone();
        }
        if self.no_clobber {
            config.overwrite = false;
        }
        if self.no_preserve_times {
            config.preserve_timestamps = false;
        }
    }
}
