//! End-of-run output: the terminal summary and the optional JSON report.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::Config;
use crate::pipeline::RunSummary;

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub version: &'static str,
    pub started_at: String,
    pub root: PathBuf,
    pub config: &'a Config,
    pub summary: &'a RunSummary,
}

impl<'a> RunReport<'a> {
    pub fn new(
        started_at: OffsetDateTime,
        root: &Path,
        config: &'a Config,
        summary: &'a RunSummary,
    ) -> Result<Self> {
        Ok(Self {
            version: env!("CARGO_PKG_VERSION"),
            started_at: started_at
                .format(&Rfc3339)
                .context("Failed to format start time")?,
            root: root.to_path_buf(),
            config,
            summary,
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report: '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// The start time in the local offset, or UTC if the offset is unknown.
#[must_use]
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn summary_line(summary: &RunSummary, dry_run: bool) -> String {
    let merge = &summary.merge;
    if merge.duplicates_collapsed == 0 {
        return "No duplicate files found!".green().to_string();
    }
    let line = format!(
        "{} {} of disk space by linking {} duplicates in {} sets",
        if dry_run { "Would save" } else { "Saved" },
        HumanBytes(merge.bytes_saved),
        HumanCount(merge.duplicates_collapsed),
        HumanCount(merge.duplicate_sets)
    );
    if dry_run {
        line.yellow().to_string()
    } else {
        line.green().to_string()
    }
}
