use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use indicatif::{HumanBytes, HumanCount};
use log::{debug, info};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::DedupeError;
use crate::progress::{ProgressSink, StopFlag};
use crate::tree::{CandidateFile, FileIdentity, InodeSet, Inventory};

/// Suffix given to a duplicate while its hardlink replacement is created.
///
/// A path carrying it at scan time is left over from an interrupted run.
pub const TEMP_SUFFIX: &str = ".tmpdedupe";

/// `path` with [`TEMP_SUFFIX`] appended to its final component.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

#[must_use]
pub fn has_temp_suffix(path: &Path) -> bool {
    path.as_os_str()
        .as_encoded_bytes()
        .ends_with(TEMP_SUFFIX.as_bytes())
}

fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.as_encoded_bytes().starts_with(b"."))
}

/// Walks `root` and lists one candidate per unique inode.
///
/// Entries are visited in file-name order and the walk never leaves the
/// filesystem `root` is on, since hardlinks cannot span filesystems.
/// Symlinks are never followed and never become candidates. Any walk error
/// aborts the scan: a partial inventory could leave duplicates unmerged
/// without anyone noticing.
///
/// # Errors
///
/// * [`DedupeError::Traversal`] if a directory or entry cannot be read.
/// * [`DedupeError::LeftoverTempFile`] if any entry below `root` ends in
///   [`TEMP_SUFFIX`], whatever its type.
/// * [`DedupeError::MissingIdentity`] if a file has no inode number.
/// * [`DedupeError::Interrupted`] if `stop` is raised.
pub fn collect(
    root: &Path,
    config: &Config,
    progress: &dyn ProgressSink,
    stop: &StopFlag,
) -> Result<Inventory, DedupeError> {
    info!("Scanning {}", root.display());

    let mut inventory = Inventory::default();
    let mut inodes = InodeSet::new();
    let mut linked = 0u64;
    let mut too_small = 0u64;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .same_file_system(true)
        .sort_by_file_name();
    for entry in walker {
        if stop.is_requested() {
            return Err(DedupeError::Interrupted);
        }
        let entry = entry.map_err(|err| DedupeError::Traversal {
            path: err.path().unwrap_or(root).to_path_buf(),
            source: io::Error::from(err),
        })?;
        progress.advance(1);

        let path = entry.path();
        if !entry.file_type().is_file() {
            // A merge would rename a duplicate over this entry.
            if entry.depth() > 0 && has_temp_suffix(path) {
                return Err(DedupeError::LeftoverTempFile {
                    path: path.to_path_buf(),
                });
            }
            continue;
        }
        if config.exclude_dotfiles && is_dotfile(path) {
            debug!("Skipping dotfile: '{}'", path.display());
            continue;
        }
        if has_temp_suffix(path) {
            return Err(DedupeError::LeftoverTempFile {
                path: path.to_path_buf(),
            });
        }
        inventory.total_seen += 1;

        let metadata = entry.metadata().map_err(|err| DedupeError::Traversal {
            path: path.to_path_buf(),
            source: io::Error::from(err),
        })?;
        let size = metadata.len();
        if size < config.min_size {
            too_small += 1;
            continue;
        }

        let identity =
            FileIdentity::from_metadata(&metadata).ok_or_else(|| DedupeError::MissingIdentity {
                path: path.to_path_buf(),
            })?;
        if !inodes.insert(identity) {
            debug!(
                "Already seen inode {} for '{}'",
                identity.ino,
                path.display()
            );
            linked += 1;
            continue;
        }

        inventory.candidates.push(CandidateFile {
            path: path.to_path_buf(),
            size,
            identity,
        });
    }

    info!(
        "Found {} files, {} to checksum ({}); skipped {} existing hardlinks and {} small files",
        HumanCount(inventory.total_seen),
        HumanCount(inventory.candidates.len() as u64),
        HumanBytes(inventory.candidate_bytes()),
        HumanCount(linked),
        HumanCount(too_small)
    );
    Ok(inventory)
}
