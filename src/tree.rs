//! Run-scoped data shared between the pipeline stages.
//!
//! The collector produces an [`Inventory`] of [`CandidateFile`]s, the checksum
//! workers fill a [`TreeInfo`], and the merge engine consumes the resulting
//! [`HashBuckets`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;

/// Device and inode pair identifying the data behind a path.
///
/// Hardlinks share one identity, so two paths with the same identity are
/// the same file, not duplicates of each other.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
}

impl FileIdentity {
    #[must_use]
    pub const fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Reads the identity from file metadata.
    ///
    /// Returns `None` on platforms without inode numbers.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Identities seen during one traversal.
#[derive(Debug, Default)]
pub struct InodeSet {
    seen: HashSet<FileIdentity>,
}

impl InodeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `identity`, returning `false` if it was already present.
    pub fn insert(&mut self, identity: FileIdentity) -> bool {
        self.seen.insert(identity)
    }

    #[must_use]
    pub fn contains(&self, identity: &FileIdentity) -> bool {
        self.seen.contains(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// A regular file selected for hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub size: u64,
    pub identity: FileIdentity,
}

/// Output of the inventory stage.
#[derive(Debug, Default)]
pub struct Inventory {
    /// Candidates in traversal order, one per unique identity.
    pub candidates: Vec<CandidateFile>,
    /// Regular files examined, including ones later filtered out.
    pub total_seen: u64,
}

impl Inventory {
    /// Sum of the sizes of all candidates.
    #[must_use]
    pub fn candidate_bytes(&self) -> u64 {
        self.candidates.iter().map(|c| c.size).sum()
    }
}

/// A 256-bit content digest.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<blake3::Hash> for ContentHash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(blake3::Hash::from_bytes(self.0).to_hex().as_str())
    }
}

/// Paths grouped by content hash.
#[derive(Debug, Default)]
pub struct HashBuckets {
    buckets: HashMap<ContentHash, Vec<PathBuf>>,
}

impl HashBuckets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: ContentHash, path: PathBuf) {
        self.buckets.entry(hash).or_default().push(path);
    }

    #[must_use]
    pub fn get(&self, hash: &ContentHash) -> Option<&[PathBuf]> {
        self.buckets.get(hash).map(Vec::as_slice)
    }

    /// Finds the bucket holding `path`.
    #[must_use]
    pub fn bucket_of(&self, path: &Path) -> Option<(&ContentHash, &[PathBuf])> {
        self.buckets
            .iter()
            .find(|(_, paths)| paths.iter().any(|p| p == path))
            .map(|(hash, paths)| (hash, paths.as_slice()))
    }

    /// Number of distinct digests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of buckets holding more than one path.
    #[must_use]
    pub fn duplicate_sets(&self) -> usize {
        self.buckets.values().filter(|paths| paths.len() > 1).count()
    }

    /// Total number of paths across all buckets.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Consumes the map into buckets ordered by digest, each bucket's paths
    /// sorted lexicographically.
    ///
    /// Workers append in completion order, which differs between runs; this
    /// is what makes canonical selection reproducible.
    #[must_use]
    pub fn into_sorted(self) -> Vec<(ContentHash, Vec<PathBuf>)> {
        let mut buckets: Vec<_> = self
            .buckets
            .into_iter()
            .map(|(hash, mut paths)| {
                paths.sort();
                (hash, paths)
            })
            .collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        buckets
    }
}

/// Counters gathered while checksumming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChecksumStats {
    pub files_hashed: u64,
    pub files_unreadable: u64,
    pub bytes_hashed: u64,
}

#[derive(Debug, Default)]
struct TreeState {
    buckets: HashBuckets,
    stats: ChecksumStats,
}

/// Aggregate state shared by the checksum workers.
///
/// A single reader/writer lock guards the bucket map and the counters
/// together, so a reader never sees a path appended without its count.
/// Once the workers have joined, [`TreeInfo::into_parts`] hands the buckets
/// to the merge stage by value.
#[derive(Debug, Default)]
pub struct TreeInfo {
    state: RwLock<TreeState>,
}

impl TreeInfo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `path` to the bucket for `hash`.
    pub fn record(&self, hash: ContentHash, path: PathBuf, size: u64) {
        let mut state = self.state.write();
        state.buckets.insert(hash, path);
        state.stats.files_hashed += 1;
        state.stats.bytes_hashed += size;
    }

    pub fn record_unreadable(&self) {
        self.state.write().stats.files_unreadable += 1;
    }

    #[must_use]
    pub fn stats(&self) -> ChecksumStats {
        self.state.read().stats
    }

    #[must_use]
    pub fn into_parts(self) -> (HashBuckets, ChecksumStats) {
        let state = self.state.into_inner();
        (state.buckets, state.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_set_records_each_identity_once() {
        let mut set = InodeSet::new();
        assert!(set.insert(FileIdentity::new(1, 42)));
        assert!(!set.insert(FileIdentity::new(1, 42)));
        // Same inode number on another device is a different file.
        assert!(set.insert(FileIdentity::new(2, 42)));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&FileIdentity::new(2, 42)));
    }

    #[test]
    fn content_hash_renders_as_hex() {
        let hash = ContentHash::from(blake3::hash(b"X"));
        let rendered = hash.to_string();
        assert_eq!(rendered.len(), 64);
        assert_eq!(rendered, blake3::hash(b"X").to_hex().to_string());
    }

    #[test]
    fn into_sorted_orders_buckets_and_paths() {
        let low = ContentHash::from_bytes([0; 32]);
        let high = ContentHash::from_bytes([0xff; 32]);
        let mut buckets = HashBuckets::new();
        buckets.insert(high, PathBuf::from("z"));
        buckets.insert(low, PathBuf::from("b"));
        buckets.insert(low, PathBuf::from("a"));

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets.duplicate_sets(), 1);
        assert_eq!(buckets.path_count(), 3);

        let sorted = buckets.into_sorted();
        assert_eq!(sorted[0].0, low);
        assert_eq!(sorted[0].1, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(sorted[1].0, high);
    }

    #[test]
    fn tree_info_counts_alongside_buckets() {
        let info = TreeInfo::new();
        let hash = ContentHash::from(blake3::hash(b"X"));
        info.record(hash, PathBuf::from("a"), 1);
        info.record(hash, PathBuf::from("b"), 1);
        info.record_unreadable();

        let (buckets, stats) = info.into_parts();
        assert_eq!(buckets.get(&hash).map(<[PathBuf]>::len), Some(2));
        assert_eq!(
            stats,
            ChecksumStats {
                files_hashed: 2,
                files_unreadable: 1,
                bytes_hashed: 2,
            }
        );
    }
}
