//! Fatal error conditions and their exit codes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Run completed.
    Success = 0,
    /// Any fatal condition.
    Failure = 1,
    /// Stopped by Ctrl+C or SIGTERM.
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // All variants fit in a u8.
        std::process::ExitCode::from(code as u8)
    }
}

/// Conditions that stop a run.
///
/// Per-file read errors while hashing are not represented here: those files
/// are skipped and counted instead.
#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("failed to walk '{path}'")]
    Traversal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no inode information for '{path}'")]
    MissingIdentity { path: PathBuf },

    #[error("'{path}' indicates a previous failed run, please investigate")]
    LeftoverTempFile { path: PathBuf },

    #[error("'{path}' is in the way of the temporary name for '{duplicate}'")]
    TempPathOccupied { path: PathBuf, duplicate: PathBuf },

    #[error("'{duplicate}' and '{canonical}' are on different filesystems")]
    CrossDevice {
        canonical: PathBuf,
        duplicate: PathBuf,
    },

    #[error("failed to stat '{path}' before linking")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start checksum workers")]
    WorkerPool(#[source] rayon::ThreadPoolBuildError),

    #[error("canonical file '{path}' is no longer readable")]
    CanonicalVanished {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename '{from}' to '{to}'")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to link '{link}' to '{target}'")]
    Link {
        target: PathBuf,
        link: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove '{path}' after linking '{link}'")]
    Remove {
        path: PathBuf,
        link: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("interrupted")]
    Interrupted,
}

impl DedupeError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Interrupted => ExitCode::Interrupted,
            _ => ExitCode::Failure,
        }
    }
}
