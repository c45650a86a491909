//! Run options.
//!
//! Options are resolved in three layers: built-in defaults, then an optional
//! TOML file given with `--config`, then command-line flags.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

/// Options consumed by the pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Log planned merges instead of performing them.
    pub dry_run: bool,
    /// Checksum worker count.
    pub jobs: usize,
    pub exclude_dotfiles: bool,
    /// Files below this size in bytes are not candidates.
    pub min_size: u64,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: default_jobs(),
            exclude_dotfiles: false,
            min_size: 0,
            log_level: LogLevel::default(),
        }
    }
}

/// Number of available cores, or 1 if that cannot be determined.
#[must_use]
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Contents of a `--config` file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub dry_run: Option<bool>,
    pub jobs: Option<usize>,
    pub exclude_dotfiles: Option<bool>,
    pub min_size: Option<u64>,
    pub log_level: Option<LogLevel>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: '{}'", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: '{}'", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl Config {
    /// Resolves defaults, the optional config file and the flags in `cli`.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = &cli.config {
            config.apply_file(ConfigFile::load(path)?);
        }
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(dry_run) = file.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(jobs) = file.jobs {
            self.jobs = jobs;
        }
        if let Some(exclude_dotfiles) = file.exclude_dotfiles {
            self.exclude_dotfiles = exclude_dotfiles;
        }
        if let Some(min_size) = file.min_size {
            self.min_size = min_size;
        }
        if let Some(log_level) = file.log_level {
            self.log_level = log_level;
        }
    }

    /// Flags override earlier layers. Each boolean option has a flag for
    /// either value; without one the earlier layer stands.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if cli.dry_run {
            self.dry_run = true;
        } else if cli.no_dry_run {
            self.dry_run = false;
        }
        if cli.exclude_dotfiles {
            self.exclude_dotfiles = true;
        } else if cli.include_dotfiles {
            self.exclude_dotfiles = false;
        }
        if let Some(jobs) = cli.jobs {
            self.jobs = jobs;
        }
        if let Some(min_size) = cli.min_size {
            self.min_size = min_size;
        }
        if cli.verbose {
            self.log_level = LogLevel::Debug;
        } else if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        Ok(())
    }
}
