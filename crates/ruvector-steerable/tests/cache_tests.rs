//! Persistent cache behaviour through the engine

use std::sync::Arc;

use ruvector_steerable::prelude::*;
use ruvector_steerable::{BasisCache, CacheKey};
use tempfile::TempDir;

fn disk_engine(dir: &TempDir) -> SteerableBasis {
    SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::disk(dir.path()))).unwrap()
}

#[test]
fn test_entries_land_in_function_directories() {
    let dir = TempDir::new().unwrap();
    let engine = disk_engine(&dir);

    engine.basis_transformation_q_j(2, 1, 1).unwrap();
    engine.sample_sh_cube(5, 2).unwrap();

    assert!(dir.path().join("trans_Q").join("2_1_1_v3.bin.gz").is_file());
    assert!(dir.path().join("sh_cube").join("5_2_v3.bin.gz").is_file());
}

#[test]
fn test_second_engine_reads_first_engines_entries() {
    let dir = TempDir::new().unwrap();
    let first = disk_engine(&dir).sample_cube(4, 1, 2).unwrap();

    let reader = disk_engine(&dir);
    let second = reader.sample_cube(4, 1, 2).unwrap();
    assert_eq!(first, second);

    let stats = reader.cache_stats();
    // J = 1, 2, 3: one Q_J and one Y_J each
    assert_eq!(stats.hits, 6);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.writes, 0);
}

#[test]
fn test_version_bump_recomputes() {
    let dir = TempDir::new().unwrap();
    disk_engine(&dir).sample_sh_cube(3, 1).unwrap();

    let mut cache = CacheConfig::disk(dir.path());
    cache.version = 4;
    let bumped = SteerableBasis::new(BasisConfig::new().with_cache(cache)).unwrap();
    bumped.sample_sh_cube(3, 1).unwrap();

    assert_eq!(bumped.cache_stats().misses, 1);
    assert!(dir.path().join("sh_cube").join("3_1_v4.bin.gz").is_file());
    assert!(dir.path().join("sh_cube").join("3_1_v3.bin.gz").is_file());
}

#[test]
fn test_corrupt_entry_is_recomputed() {
    let dir = TempDir::new().unwrap();
    let engine = disk_engine(&dir);
    let expected = engine.sample_sh_cube(4, 1).unwrap();

    let path = dir.path().join("sh_cube").join("4_1_v3.bin.gz");
    std::fs::write(&path, b"\x1f\x8b truncated").unwrap();

    let fresh = disk_engine(&dir);
    assert_eq!(fresh.sample_sh_cube(4, 1).unwrap(), expected);
    assert_eq!(fresh.cache_stats().writes, 1);
}

#[test]
fn test_concurrent_engines_share_one_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let root = root.clone();
            std::thread::spawn(move || {
                let engine =
                    SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::disk(root)))
                        .unwrap();
                engine.basis_transformation_q_j(2, 2, 1).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for q in &results[1..] {
        assert_eq!(q, &results[0]);
    }
}

#[test]
fn test_injected_cache_is_used() {
    let cache = Arc::new(InMemoryCache::new());
    let engine = SteerableBasis::with_cache(BasisConfig::new(), cache.clone()).unwrap();
    engine.basis_transformation_q_j(1, 1, 0).unwrap();

    let key = CacheKey::new("trans_Q", CACHE_VERSION, &[1, 1, 0]);
    let stored = cache.get(&key).unwrap().expect("entry written on miss");
    assert_eq!(stored.shape, vec![3, 3]);
}

#[test]
fn test_disabled_cache_never_hits() {
    let engine = SteerableBasis::new(BasisConfig::new().with_cache(CacheConfig::disabled())).unwrap();
    engine.sample_sh_cube(3, 0).unwrap();
    engine.sample_sh_cube(3, 0).unwrap();
    let stats = engine.cache_stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 2);
}
