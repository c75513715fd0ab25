//! Read-through, write-back cache of fixed-size record slots.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use log::trace;

struct CacheEntry {
    data: Vec<u8>,
    dirty: bool,
}

/// Random-access window over a record-indexed binary file. The cache is
/// authoritative for any slot it holds: reads of a cached slot never touch
/// the file. Entries are evicted only through the `sync` watermark.
pub struct PageCache {
    entries: HashMap<u64, CacheEntry>,
    record_size: usize,
}

impl PageCache {
    pub fn new(record_size: usize) -> Self {
        Self { entries: HashMap::new(), record_size }
    }

    /// Record at `slot`, reading it from the file on a miss.
    pub fn get(&mut self, file: &mut File, slot: u64) -> io::Result<&[u8]> {
        if !self.entries.contains_key(&slot) {
            trace!("cache miss at slot {slot}");
            file.seek(SeekFrom::Start(slot * self.record_size as u64))?;
            let mut data = vec![0u8; self.record_size];
            file.read_exact(&mut data)?;
            self.entries.insert(slot, CacheEntry { data, dirty: false });
        }
        Ok(&self.entries[&slot].data)
    }

    /// Stores `data` at `slot` and marks it dirty. An existing clean entry
    /// is promoted to dirty.
    pub fn set(&mut self, slot: u64, data: Vec<u8>) {
        self.entries.insert(slot, CacheEntry { data, dirty: true });
    }

    /// Exchanges the contents of slots `i` and `j`; a no-op when `i == j`.
    /// Both resulting entries are dirty.
    pub fn swap(&mut self, file: &mut File, i: u64, j: u64) -> io::Result<()> {
        if i == j {
            return Ok(());
        }
        trace!("swap slot {i} with {j}");
        self.get(file, i)?;
        self.get(file, j)?;
        if let (Some(left), Some(right)) = (self.entries.remove(&i), self.entries.remove(&j)) {
            self.entries.insert(i, CacheEntry { data: right.data, dirty: true });
            self.entries.insert(j, CacheEntry { data: left.data, dirty: true });
        }
        Ok(())
    }

    /// Flushes every dirty slot back to the file, then evicts all entries
    /// with a slot index below `watermark`.
    pub fn sync(&mut self, file: &mut File, watermark: u64) -> io::Result<()> {
        trace!("sync with watermark {watermark}");
        for (&slot, entry) in &mut self.entries {
            if entry.dirty {
                file.seek(SeekFrom::Start(slot * self.record_size as u64))?;
                file.write_all(&entry.data)?;
                entry.dirty = false;
            }
        }
        self.entries.retain(|&slot, _| slot >= watermark);
        Ok(())
    }

    /// Number of slots currently held.
    pub fn cached(&self) -> usize {
        self.entries.len()
    }
}
