use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

use indicatif::{HumanBytes, HumanCount};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::DedupeError;
use crate::progress::{ProgressSink, StopFlag};
use crate::tree::{CandidateFile, ContentHash, TreeInfo};
use crate::utils::throughput;

/// Streams the whole file through BLAKE3.
pub fn calculate_file_hash(file_path: &Path) -> io::Result<ContentHash> {
    let mut file = File::open(file_path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0; 64 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().into())
}

/// Hashes every candidate on a pool of `jobs` worker threads.
///
/// Workers take one file at a time. A file that cannot be read is logged,
/// counted as unreadable and left out of every bucket. The call returns
/// once all workers are idle, so the returned [`TreeInfo`] has no remaining
/// writers.
///
/// # Errors
///
/// * [`DedupeError::WorkerPool`] if the threads cannot be started.
/// * [`DedupeError::Interrupted`] if `stop` is raised before all files are
///   hashed.
pub fn checksum(
    candidates: &[CandidateFile],
    jobs: usize,
    progress: &dyn ProgressSink,
    stop: &StopFlag,
) -> Result<TreeInfo, DedupeError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("checksum-{i}"))
        .build()
        .map_err(DedupeError::WorkerPool)?;

    info!(
        "Checksumming {} files with {} workers",
        HumanCount(candidates.len() as u64),
        jobs
    );
    let start = Instant::now();
    let tree = TreeInfo::new();

    pool.install(|| {
        candidates
            .par_iter()
            .with_max_len(1)
            .for_each(|candidate| {
                if stop.is_requested() {
                    return;
                }
                hash_candidate(&tree, candidate);
                progress.advance(1);
            });
    });

    if stop.is_requested() {
        return Err(DedupeError::Interrupted);
    }

    let stats = tree.stats();
    info!(
        "Checksummed {} files ({}, {}/s), {} unreadable",
        HumanCount(stats.files_hashed),
        HumanBytes(stats.bytes_hashed),
        HumanBytes(throughput(stats.bytes_hashed, start.elapsed())),
        HumanCount(stats.files_unreadable)
    );
    Ok(tree)
}

fn hash_candidate(tree: &TreeInfo, candidate: &CandidateFile) {
    let worker = rayon::current_thread_index().unwrap_or_default();
    match calculate_file_hash(&candidate.path) {
        Ok(hash) => {
            debug!("[checksum-{worker}] {hash} {}", candidate.path.display());
            tree.record(hash, candidate.path.clone(), candidate.size);
        }
        Err(e) => {
            warn!(
                "[checksum-{worker}] Skipping unreadable file '{}': {}",
                candidate.path.display(),
                e
            );
            tree.record_unreadable();
        }
    }
}
