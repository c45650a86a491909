use std::fs;
use std::path::Path;

use indicatif::{HumanBytes, HumanCount};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::DedupeError;
use crate::progress::{ProgressSink, StopFlag};
use crate::scanner::temp_path;
use crate::tree::HashBuckets;

/// Totals of a merge pass. Dry runs report what a real run would do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Buckets that held more than one path.
    pub duplicate_sets: u64,
    /// Paths replaced (or, in a dry run, to be replaced) by a hardlink.
    pub duplicates_collapsed: u64,
    pub bytes_saved: u64,
}

/// Collapses every multi-path bucket onto its canonical file.
///
/// Buckets are visited in digest order and the lexicographically smallest
/// path of each bucket is canonical, so repeated runs over the same tree
/// make the same choices. Every other path is assumed to be the canonical
/// file's size, since their digests matched.
///
/// With `dry_run` nothing on disk changes; each planned link is logged and
/// counted as if it had been made.
///
/// Merges already done stay in place when a later one fails.
///
/// # Errors
///
/// * [`DedupeError::CanonicalVanished`] if a canonical file cannot be
///   stat'ed.
/// * [`DedupeError::TempPathOccupied`], [`DedupeError::CrossDevice`],
///   [`DedupeError::Stat`], [`DedupeError::Rename`], [`DedupeError::Link`]
///   or [`DedupeError::Remove`] from [`replace_with_link`].
/// * [`DedupeError::Interrupted`] if `stop` is raised; checked between
///   duplicates only.
pub fn merge_duplicates(
    buckets: HashBuckets,
    dry_run: bool,
    progress: &dyn ProgressSink,
    stop: &StopFlag,
) -> Result<MergeOutcome, DedupeError> {
    info!(
        "{} {} duplicate sets",
        if dry_run { "Simulating merge of" } else { "Merging" },
        HumanCount(buckets.duplicate_sets() as u64)
    );
    let mut outcome = MergeOutcome::default();

    for (hash, paths) in buckets.into_sorted() {
        progress.advance(1);
        let [canonical, duplicates @ ..] = paths.as_slice() else {
            continue;
        };
        if duplicates.is_empty() {
            continue;
        }

        let size = fs::metadata(canonical)
            .map_err(|source| DedupeError::CanonicalVanished {
                path: canonical.clone(),
                source,
            })?
            .len();
        outcome.duplicate_sets += 1;
        debug!(
            "{hash}: {} copies of '{}' ({})",
            paths.len(),
            canonical.display(),
            HumanBytes(size)
        );

        for duplicate in duplicates {
            if stop.is_requested() {
                warn!(
                    "Stopped after {} duplicates ({})",
                    HumanCount(outcome.duplicates_collapsed),
                    HumanBytes(outcome.bytes_saved)
                );
                return Err(DedupeError::Interrupted);
            }
            if dry_run {
                info!(
                    "Would link '{}' to '{}' ({})",
                    duplicate.display(),
                    canonical.display(),
                    HumanBytes(size)
                );
            } else {
                debug!(
                    "Linking '{}' to '{}'",
                    duplicate.display(),
                    canonical.display()
                );
                replace_with_link(canonical, duplicate)?;
            }
            outcome.bytes_saved += size;
            outcome.duplicates_collapsed += 1;
        }
    }

    info!(
        "{} {} duplicates in {} sets, {} {}",
        if dry_run { "Would merge" } else { "Merged" },
        HumanCount(outcome.duplicates_collapsed),
        HumanCount(outcome.duplicate_sets),
        HumanBytes(outcome.bytes_saved),
        if dry_run { "reclaimable" } else { "reclaimed" }
    );
    Ok(outcome)
}

/// Replaces `duplicate` with a hardlink to `canonical`.
///
/// The duplicate is renamed to its temp name first, so its data survives
/// until the link exists. A crash in between leaves the temp file behind,
/// which the next scan refuses to run over.
///
/// Nothing is renamed if the temp name is already taken or the two paths
/// live on different filesystems.
pub fn replace_with_link(canonical: &Path, duplicate: &Path) -> Result<(), DedupeError> {
    let tmp = temp_path(duplicate);
    if fs::symlink_metadata(&tmp).is_ok() {
        return Err(DedupeError::TempPathOccupied {
            path: tmp,
            duplicate: duplicate.to_path_buf(),
        });
    }
    check_same_device(canonical, duplicate)?;

    fs::rename(duplicate, &tmp).map_err(|source| DedupeError::Rename {
        from: duplicate.to_path_buf(),
        to: tmp.clone(),
        source,
    })?;
    fs::hard_link(canonical, duplicate).map_err(|source| DedupeError::Link {
        target: canonical.to_path_buf(),
        link: duplicate.to_path_buf(),
        source,
    })?;
    fs::remove_file(&tmp).map_err(|source| DedupeError::Remove {
        path: tmp.clone(),
        link: duplicate.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn stat(path: &Path) -> Result<fs::Metadata, DedupeError> {
    fs::symlink_metadata(path).map_err(|source| DedupeError::Stat {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn check_same_device(canonical: &Path, duplicate: &Path) -> Result<(), DedupeError> {
    use std::os::unix::fs::MetadataExt;

    if stat(canonical)?.dev() != stat(duplicate)?.dev() {
        return Err(DedupeError::CrossDevice {
            canonical: canonical.to_path_buf(),
            duplicate: duplicate.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_same_device(canonical: &Path, duplicate: &Path) -> Result<(), DedupeError> {
    stat(canonical)?;
    stat(duplicate)?;
    Ok(())
}
