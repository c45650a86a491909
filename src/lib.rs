pub mod checksum;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod tree;
pub mod utils;

pub use checksum::{calculate_file_hash, checksum};
pub use cli::Cli;
pub use config::{Config, LogLevel};
pub use duplicates::{MergeOutcome, merge_duplicates, replace_with_link};
pub use error::{DedupeError, ExitCode};
pub use pipeline::{Dedupe, RunSummary};
pub use progress::{ProgressCounter, ProgressSink, StopFlag};
pub use report::summary_line;
pub use scanner::{TEMP_SUFFIX, collect};
pub use tree::{CandidateFile, ContentHash, FileIdentity, HashBuckets, Inventory, TreeInfo};
