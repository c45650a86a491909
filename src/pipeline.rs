//! Runs the scan, checksum and merge stages in order.
//!
//! Each stage receives the complete output of the previous one; nothing is
//! streamed between stages.

use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use log::info;
use serde::Serialize;

use crate::checksum::checksum;
use crate::config::Config;
use crate::duplicates::{MergeOutcome, merge_duplicates};
use crate::error::DedupeError;
use crate::progress::{self, StopFlag};
use crate::scanner::collect;
use crate::tree::ChecksumStats;
use crate::utils::format_human_elapsed;

/// Wall-clock seconds spent in each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub scan_secs: f64,
    pub checksum_secs: f64,
    pub merge_secs: f64,
}

/// Everything a completed run reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub files_seen: u64,
    pub files_queued: u64,
    pub checksum: ChecksumStats,
    pub merge: MergeOutcome,
    pub timings: StageTimings,
}

pub struct Dedupe<'a> {
    config: &'a Config,
    show_progress: bool,
    stop: StopFlag,
}

impl<'a> Dedupe<'a> {
    /// A run without progress bars and with its own stop flag.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            show_progress: false,
            stop: StopFlag::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn run(&self, root: &Path) -> Result<RunSummary, DedupeError> {
        let mut summary = RunSummary::default();

        let spinner = progress::spinner("Finding files", self.show_progress);
        let (inventory, elapsed) =
            timed(&spinner, || collect(root, self.config, &spinner, &self.stop));
        let inventory = inventory?;
        summary.files_seen = inventory.total_seen;
        summary.files_queued = inventory.candidates.len() as u64;
        summary.timings.scan_secs = elapsed.as_secs_f64();
        info!("Scan took {}", format_human_elapsed(elapsed));

        let bar = progress::bar(summary.files_queued, "Checksum", self.show_progress);
        let (tree, elapsed) = timed(&bar, || {
            checksum(&inventory.candidates, self.config.jobs, &bar, &self.stop)
        });
        let (buckets, stats) = tree?.into_parts();
        summary.checksum = stats;
        summary.timings.checksum_secs = elapsed.as_secs_f64();
        info!("Checksum took {}", format_human_elapsed(elapsed));

        let bar = progress::bar(buckets.len() as u64, "Cmp/Link", self.show_progress);
        let (merge, elapsed) = timed(&bar, || {
            merge_duplicates(buckets, self.config.dry_run, &bar, &self.stop)
        });
        summary.merge = merge?;
        summary.timings.merge_secs = elapsed.as_secs_f64();
        info!("Merge took {}", format_human_elapsed(elapsed));

        Ok(summary)
    }
}

fn timed<T>(pb: &ProgressBar, stage: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let result = stage();
    pb.finish_and_clear();
    (result, start.elapsed())
}
