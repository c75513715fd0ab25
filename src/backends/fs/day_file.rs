//! One open day file: all records for a (table, dimension values, day) key.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::StoreError;

use super::cache::PageCache;
use super::merge::{MergeTarget, merge_in_place};
use super::record::lead_timestamp;

/// Accumulates newly appended records in RAM and owns the page cache over
/// the on-disk records. Between `append` and `commit` the on-disk prefix is
/// sorted while the RAM buffer is not; `commit` restores the sorted-at-rest
/// invariant and closes the file.
pub struct DayFile {
    path: PathBuf,
    file: File,
    record_size: usize,
    disk_records: Option<u64>,
    pending: Vec<Vec<u8>>,
    cache: PageCache,
}

impl DayFile {
    /// Opens the file read+write, creating it and its parent directories
    /// when missing.
    pub fn open(path: impl Into<PathBuf>, record_size: usize) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        Ok(Self {
            path,
            file,
            record_size,
            disk_records: None,
            pending: Vec::new(),
            cache: PageCache::new(record_size),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffers one encoded record. Cannot fail.
    pub fn append(&mut self, record: Vec<u8>) {
        self.pending.push(record);
    }

    /// Number of records already on disk, read once and cached.
    pub fn len(&mut self) -> Result<u64, StoreError> {
        match self.disk_records {
            Some(count) => Ok(count),
            None => {
                let bytes = self.file.seek(SeekFrom::End(0))?;
                let count = bytes / self.record_size as u64;
                self.disk_records = Some(count);
                Ok(count)
            }
        }
    }

    pub fn is_empty(&mut self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0 && self.pending.is_empty())
    }

    fn timestamp_at(&mut self, slot: u64) -> Result<u32, StoreError> {
        let record = self.cache.get(&mut self.file, slot)?;
        lead_timestamp(record)
    }

    /// Sorts the RAM buffer, appends it, merges it into the sorted on-disk
    /// prefix, flushes the cache, and closes the file.
    ///
    /// # Errors
    /// I/O failures are fatal for this file. An aborted commit can leave
    /// appended but unmerged records on disk; a later session still merges
    /// correctly because only the prefix is assumed sorted.
    pub fn commit(mut self) -> Result<(), StoreError> {
        let on_disk = self.len()?;
        self.pending.sort_by_key(|record| lead_timestamp(record).unwrap_or(0));
        let appended = self.pending.len() as u64;
        if on_disk > 0 {
            // the merge reads the new tail through the cache
            for (index, record) in self.pending.iter().enumerate() {
                self.cache.set(on_disk + index as u64, record.clone());
            }
        }
        self.file.seek(SeekFrom::End(0))?;
        for record in &self.pending {
            self.file.write_all(record)?;
        }
        let total = on_disk + appended;
        self.disk_records = Some(total);
        if on_disk > 0 {
            merge_in_place(&mut self, appended, total)?;
        }
        self.cache.sync(&mut self.file, total)?;
        debug!("committed {appended} records to {} ({total} at rest)", self.path.display());
        Ok(())
    }
}

impl MergeTarget for DayFile {
    fn key(&mut self, slot: u64) -> Result<u32, StoreError> {
        self.timestamp_at(slot)
    }

    fn swap(&mut self, i: u64, j: u64) -> Result<(), StoreError> {
        Ok(self.cache.swap(&mut self.file, i, j)?)
    }

    fn progress(&mut self, watermark: u64) -> Result<(), StoreError> {
        Ok(self.cache.sync(&mut self.file, watermark)?)
    }
}

/// Sequential reader over a committed day file. Owns its read-only handle,
/// which is released when the scan is dropped, so an abandoned query cannot
/// keep the file open.
pub struct RecordScan {
    reader: BufReader<File>,
    record_size: usize,
    end_time: Option<i64>,
    done: bool,
}

impl RecordScan {
    /// # Errors
    /// `StoreError::Io` when the file cannot be opened.
    pub fn open(path: &Path, record_size: usize, end_time: Option<i64>) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        Ok(Self { reader: BufReader::new(file), record_size, end_time, done: false })
    }

    fn read_record(&mut self) -> Result<Option<Vec<u8>>, StoreError> {
        let mut record = vec![0u8; self.record_size];
        let mut filled = 0;
        while filled < self.record_size {
            let read = self.reader.read(&mut record[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < self.record_size {
            return Err(StoreError::ShortRecord { expected: self.record_size, found: filled });
        }
        Ok(Some(record))
    }
}

impl Iterator for RecordScan {
    type Item = Result<Vec<u8>, StoreError>;

    /// Yields raw records in file order. Because the file is sorted at
    /// rest, the scan stops for good once a leading timestamp exceeds
    /// `end_time`; later records are never read.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(None) => {
                self.done = true;
                None
            }
            Ok(Some(record)) => match lead_timestamp(&record) {
                Ok(timestamp) => {
                    if let Some(end) = self.end_time
                        && i64::from(timestamp) > end
                    {
                        self.done = true;
                        return None;
                    }
                    Some(Ok(record))
                }
                Err(error) => {
                    self.done = true;
                    Some(Err(error))
                }
            },
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}
