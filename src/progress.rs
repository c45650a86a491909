//! Progress reporting and interruption.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

/// Receives one unit per item processed by a stage.
pub trait ProgressSink: Sync {
    fn advance(&self, n: u64);
}

impl ProgressSink for ProgressBar {
    fn advance(&self, n: u64) {
        self.inc(n);
    }
}

/// Sink that only counts, used when nothing is displayed.
#[derive(Debug, Default)]
pub struct ProgressCounter(AtomicU64);

impl ProgressCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ProgressCounter {
    fn advance(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

/// Spinner for stages whose length is unknown up front.
pub fn spinner(message: &'static str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Bar over `len` items.
pub fn bar(len: u64, message: &'static str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {msg:9} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ETA: {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb
}

/// Shared flag raised when the operator asks the run to stop.
///
/// Stages poll it between files; the merge stage never stops inside a
/// rename-link-remove sequence.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raises the flag on Ctrl+C or SIGTERM.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            if !flag.is_requested() {
                warn!("Interrupt received, stopping after the current file");
            }
            flag.request();
        })
    }
}
