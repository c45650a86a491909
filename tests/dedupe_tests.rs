#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use hardlink_dedupe::{
    Config, ContentHash, Dedupe, DedupeError, ProgressCounter, StopFlag, checksum, collect,
};
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn ino(path: &Path) -> u64 {
    fs::metadata(path).unwrap().ino()
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
        .collect()
}

fn config() -> Config {
    Config {
        jobs: 4,
        ..Config::default()
    }
}

#[test]
fn test_equal_files_are_linked_and_distinct_files_untouched() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", "X");
    let b = write(dir.path(), "b", "X");
    let c = write(dir.path(), "c", "Y");
    let c_before = ino(&c);

    let config = config();
    let inventory = collect(dir.path(), &config, &ProgressCounter::new(), &StopFlag::new()).unwrap();
    let tree = checksum(&inventory.candidates, config.jobs, &ProgressCounter::new(), &StopFlag::new())
        .unwrap();
    let (buckets, _) = tree.into_parts();
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets.get(&ContentHash::from(blake3::hash(b"X"))).unwrap().len(), 2);
    assert_eq!(buckets.get(&ContentHash::from(blake3::hash(b"Y"))).unwrap().len(), 1);

    let summary = Dedupe::new(&config).run(dir.path()).unwrap();
    assert_eq!(summary.merge.duplicates_collapsed, 1);
    assert_eq!(summary.merge.bytes_saved, 1);
    assert_eq!(ino(&a), ino(&b));
    assert_eq!(ino(&c), c_before);
    assert_ne!(ino(&a), ino(&c));
}

#[test]
fn test_existing_hardlinks_are_hashed_once() {
    let dir = tempdir().unwrap();
    let d = write(dir.path(), "d", "Z");
    let e = dir.path().join("e");
    fs::hard_link(&d, &e).unwrap();
    let f = write(dir.path(), "f", "Z");

    let config = config();
    let inventory = collect(dir.path(), &config, &ProgressCounter::new(), &StopFlag::new()).unwrap();
    let queued: Vec<_> = inventory.candidates.iter().map(|c| c.path.clone()).collect();
    assert_eq!(queued, vec![d.clone(), f.clone()]);
    assert_eq!(inventory.total_seen, 3);

    let summary = Dedupe::new(&config).run(dir.path()).unwrap();
    assert_eq!(summary.files_queued, 2);
    assert_eq!(summary.merge.duplicate_sets, 1);
    assert_eq!(summary.merge.duplicates_collapsed, 1);
    assert_eq!(ino(&d), ino(&e));
    assert_eq!(ino(&d), ino(&f));
    assert_eq!(fs::metadata(&d).unwrap().nlink(), 3);
}

#[test]
fn test_leftover_temp_file_aborts_before_hashing() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", "X");
    let b = write(dir.path(), "b", "X");
    write(dir.path(), "b.tmpdedupe", "X");

    let err = Dedupe::new(&config()).run(dir.path()).unwrap_err();
    assert!(matches!(err, DedupeError::LeftoverTempFile { .. }));
    assert_ne!(err.exit_code().as_i32(), 0);
    assert_ne!(ino(&a), ino(&b));
}

#[test]
fn test_second_run_finds_nothing_to_merge() {
    let dir = tempdir().unwrap();
    for i in 0..5 {
        write(dir.path(), &format!("copies/{i}.bin"), "payload");
    }
    write(dir.path(), "nested/deeper/other.bin", "payload");
    write(dir.path(), "unique.bin", "unique");

    let config = config();
    let first = Dedupe::new(&config).run(dir.path()).unwrap();
    assert_eq!(first.merge.duplicates_collapsed, 5);
    assert_eq!(first.merge.bytes_saved, 5 * 7);

    let second = Dedupe::new(&config).run(dir.path()).unwrap();
    assert_eq!(second.merge.duplicates_collapsed, 0);
    assert_eq!(second.merge.bytes_saved, 0);
    assert_eq!(second.files_seen, 7);
    assert_eq!(second.files_queued, 2);
}

#[test]
fn test_content_is_preserved_for_every_path() {
    let dir = tempdir().unwrap();
    write(dir.path(), "one/a.txt", "alpha");
    write(dir.path(), "two/a.txt", "alpha");
    write(dir.path(), "two/b.txt", "beta");
    write(dir.path(), "three/b.txt", "beta");
    write(dir.path(), "three/c.txt", "gamma");
    let before = snapshot(dir.path());

    Dedupe::new(&config()).run(dir.path()).unwrap();
    assert_eq!(snapshot(dir.path()), before);
}

#[test]
fn test_dry_run_reports_same_savings_without_changes() {
    let dir = tempdir().unwrap();
    let paths: Vec<_> = ["x1", "x2", "x3"]
        .iter()
        .map(|name| write(dir.path(), name, "0123456789"))
        .collect();
    let inodes: Vec<_> = paths.iter().map(|p| ino(p)).collect();

    let dry = Config {
        dry_run: true,
        ..config()
    };
    let simulated = Dedupe::new(&dry).run(dir.path()).unwrap();
    assert_eq!(paths.iter().map(|p| ino(p)).collect::<Vec<_>>(), inodes);

    let real = Dedupe::new(&config()).run(dir.path()).unwrap();
    assert_eq!(simulated.merge, real.merge);
    assert_eq!(real.merge.duplicates_collapsed, 2);
    assert_eq!(real.merge.bytes_saved, 20);
}

#[test]
fn test_smallest_path_becomes_canonical() {
    let dir = tempdir().unwrap();
    let z = write(dir.path(), "z", "same");
    let a = write(dir.path(), "a", "same");
    let a_before = ino(&a);

    Dedupe::new(&config()).run(dir.path()).unwrap();
    assert_eq!(ino(&a), a_before);
    assert_eq!(ino(&z), a_before);
}

#[test]
fn test_filters_limit_what_is_merged() {
    let dir = tempdir().unwrap();
    let hidden = write(dir.path(), ".hidden", "dup-content");
    let shown = write(dir.path(), "shown", "dup-content");
    let small_a = write(dir.path(), "small_a", "s");
    let small_b = write(dir.path(), "small_b", "s");

    let config = Config {
        exclude_dotfiles: true,
        min_size: 2,
        ..config()
    };
    let summary = Dedupe::new(&config).run(dir.path()).unwrap();
    assert_eq!(summary.files_seen, 3);
    assert_eq!(summary.files_queued, 1);
    assert_eq!(summary.merge.duplicates_collapsed, 0);
    assert_ne!(ino(&hidden), ino(&shown));
    assert_ne!(ino(&small_a), ino(&small_b));
}

#[test]
fn test_single_worker_matches_many_workers() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        write(dir.path(), &format!("f{i:02}"), &format!("content-{}", i % 4));
    }

    let dry_one = Config {
        dry_run: true,
        jobs: 1,
        ..Config::default()
    };
    let dry_many = Config {
        dry_run: true,
        jobs: 8,
        ..Config::default()
    };
    let one = Dedupe::new(&dry_one).run(dir.path()).unwrap();
    let many = Dedupe::new(&dry_many).run(dir.path()).unwrap();
    assert_eq!(one.merge, many.merge);
    assert_eq!(one.merge.duplicate_sets, 4);
    assert_eq!(one.merge.duplicates_collapsed, 16);
}

#[test]
fn test_symlink_at_temp_name_stops_the_run_untouched() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", "X");
    let b = write(dir.path(), "b", "X");
    let tmp = dir.path().join("b.tmpdedupe");
    std::os::unix::fs::symlink("keep", &tmp).unwrap();

    let err = Dedupe::new(&config()).run(dir.path()).unwrap_err();
    assert!(matches!(err, DedupeError::LeftoverTempFile { ref path } if path == &tmp));
    assert_eq!(fs::read_link(&tmp).unwrap(), PathBuf::from("keep"));
    assert_ne!(ino(&a), ino(&b));
}
