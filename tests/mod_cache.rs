use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use tempfile::{TempDir, tempdir};
use timegrain::backends::fs::PageCache;

const RECORD_SIZE: usize = 4;

fn record_file(values: &[u32]) -> (TempDir, File) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.bin");
    let mut file = OpenOptions::new().read(true).write(true).create(true).open(&path).unwrap();
    for value in values {
        file.write_all(&value.to_le_bytes()).unwrap();
    }
    (dir, file)
}

fn file_values(file: &mut File, count: usize) -> Vec<u32> {
    file.seek(SeekFrom::Start(0)).unwrap();
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 4];
            file.read_exact(&mut bytes).unwrap();
            u32::from_le_bytes(bytes)
        })
        .collect()
}

#[test]
fn test_get_reads_through_to_the_file() {
    let (_dir, mut file) = record_file(&[10, 20, 30]);
    let mut cache = PageCache::new(RECORD_SIZE);
    assert_eq!(cache.get(&mut file, 1).unwrap(), 20u32.to_le_bytes());
    assert_eq!(cache.get(&mut file, 0).unwrap(), 10u32.to_le_bytes());
    assert_eq!(cache.cached(), 2);
}

#[test]
fn test_cached_slot_is_authoritative() {
    let (_dir, mut file) = record_file(&[10, 20, 30]);
    let mut cache = PageCache::new(RECORD_SIZE);
    cache.set(1, 99u32.to_le_bytes().to_vec());
    // the read must come from the cache, not from disk
    assert_eq!(cache.get(&mut file, 1).unwrap(), 99u32.to_le_bytes());
}

#[test]
fn test_sync_flushes_dirty_slots() {
    let (_dir, mut file) = record_file(&[10, 20, 30]);
    let mut cache = PageCache::new(RECORD_SIZE);
    cache.set(1, 99u32.to_le_bytes().to_vec());
    cache.sync(&mut file, 0).unwrap();
    assert_eq!(file_values(&mut file, 3), vec![10, 99, 30]);
}

#[test]
fn test_swap_exchanges_slots() {
    let (_dir, mut file) = record_file(&[10, 20, 30]);
    let mut cache = PageCache::new(RECORD_SIZE);
    cache.swap(&mut file, 0, 2).unwrap();
    cache.sync(&mut file, 3).unwrap();
    assert_eq!(file_values(&mut file, 3), vec![30, 20, 10]);
    assert_eq!(cache.cached(), 0);
}

#[test]
fn test_swap_of_identical_slots_is_a_noop() {
    let (_dir, mut file) = record_file(&[10, 20, 30]);
    let mut cache = PageCache::new(RECORD_SIZE);
    cache.swap(&mut file, 1, 1).unwrap();
    assert_eq!(cache.cached(), 0);
}

#[test]
fn test_sync_evicts_below_the_watermark() {
    let (_dir, mut file) = record_file(&[10, 20, 30, 40]);
    let mut cache = PageCache::new(RECORD_SIZE);
    for slot in 0..4 {
        cache.get(&mut file, slot).unwrap();
    }
    assert_eq!(cache.cached(), 4);
    cache.sync(&mut file, 2).unwrap();
    // clean entries at or above the watermark survive
    assert_eq!(cache.cached(), 2);
    cache.sync(&mut file, 4).unwrap();
    assert_eq!(cache.cached(), 0);
}

#[test]
fn test_sync_clears_the_dirty_flag() {
    let (_dir, mut file) = record_file(&[10, 20]);
    let mut cache = PageCache::new(RECORD_SIZE);
    cache.set(0, 77u32.to_le_bytes().to_vec());
    cache.sync(&mut file, 0).unwrap();
    // overwrite on disk behind the cache; a second sync must not rewrite
    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(&55u32.to_le_bytes()).unwrap();
    cache.sync(&mut file, 0).unwrap();
    assert_eq!(file_values(&mut file, 2), vec![55, 20]);
}
