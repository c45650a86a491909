use clap::Parser;
use std::path::PathBuf;

use crate::config::LogLevel;

#[derive(Parser, Debug)]
#[command(name = "hardlink-dedupe", version)]
#[command(about = "Replace duplicate files under a directory with hardlinks")]
pub struct Cli {
    /// Directory to deduplicate
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Only print what would be linked
    #[arg(short = 'n', long, overrides_with = "no_dry_run")]
    pub dry_run: bool,

    /// Link duplicates even if the config file asks for a dry run
    #[arg(long, overrides_with = "dry_run")]
    pub no_dry_run: bool,

    /// Number of parallel jobs for checksumming (default: number of CPU cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip files whose name starts with a dot
    #[arg(long, overrides_with = "include_dotfiles")]
    pub exclude_dotfiles: bool,

    /// Consider dot files even if the config file excludes them
    #[arg(long, overrides_with = "exclude_dotfiles")]
    pub include_dotfiles: bool,

    /// Skip files smaller than this many bytes (default: 0)
    #[arg(long, value_name = "BYTES")]
    pub min_size: Option<u64>,

    /// Log verbosity (default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Shorthand for --log-level debug
    #[arg(short, long, conflicts_with_all = ["quiet", "log_level"])]
    pub verbose: bool,

    /// Do not print the summary of actions
    #[arg(short, long)]
    pub quiet: bool,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// TOML file with defaults for the options above
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Also write log lines to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}
