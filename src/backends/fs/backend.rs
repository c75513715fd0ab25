//! Filesystem backend: partitioned day files under a configured root.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, fs};

use chrono::{DateTime, Datelike, Utc};
use log::{debug, info, trace};
use walkdir::WalkDir;

use crate::backend::{Backend, PointStream};
use crate::errors::StoreError;
use crate::schema::{Point, TableSchema, Value};

use super::day_file::{DayFile, RecordScan};
use super::lookup::FileLookup;
use super::record::RecordCodec;

pub const ROOT_ENV: &str = "TIME_SERIES_FS_ROOT";
pub const FILEPATH_FORMAT_ENV: &str = "TIME_SERIES_FS_FILEPATH_FORMAT";
pub const FILEPATH_FORMAT_DEFAULT: &str = "{table}/{dimensions}/{year}/{month:02d}/{day:02d}";

/// Maps typed points onto partitioned day files and serves range queries
/// over them. Owns the compiled record layouts and the table of day files
/// opened during this session; `commit` drains that table.
pub struct FileSystemBackend {
    root: PathBuf,
    filepath_format: String,
    codecs: HashMap<String, Arc<RecordCodec>>,
    open_files: HashMap<PathBuf, DayFile>,
}

impl FileSystemBackend {
    /// # Errors
    /// `StoreError::Io` when the root directory cannot be created.
    pub fn new(root: impl Into<PathBuf>, filepath_format: impl Into<String>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            filepath_format: filepath_format.into(),
            codecs: HashMap::new(),
            open_files: HashMap::new(),
        })
    }

    /// Reads `TIME_SERIES_FS_ROOT` (required) and
    /// `TIME_SERIES_FS_FILEPATH_FORMAT` (optional).
    ///
    /// # Errors
    /// `StoreError::Config` when the root variable is missing.
    pub fn from_env() -> Result<Self, StoreError> {
        let root = env::var(ROOT_ENV)
            .map_err(|_| StoreError::Config(format!("please specify {ROOT_ENV}")))?;
        let filepath_format =
            env::var(FILEPATH_FORMAT_ENV).unwrap_or_else(|_| FILEPATH_FORMAT_DEFAULT.to_string());
        Self::new(root, filepath_format)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn codec_for(&mut self, schema: &Arc<TableSchema>) -> Arc<RecordCodec> {
        self.codecs
            .entry(schema.table().to_string())
            .or_insert_with(|| Arc::new(RecordCodec::new(schema)))
            .clone()
    }

    /// Partition path for a point, rendered from the path template.
    fn day_path(&self, point: &Point) -> PathBuf {
        let schema = point.schema();
        let mut dimensions = String::new();
        if self.filepath_format.contains("{dimensions}") {
            let mut parts = Vec::new();
            for name in schema.dimensions() {
                parts.push(name.clone());
                parts.push(point.value(name).map(Value::to_string).unwrap_or_default());
            }
            dimensions = parts.join("/");
        }
        let timestamp = point.timestamp();
        let relative = self
            .filepath_format
            .replace("{table}", schema.table())
            .replace("{dimensions}", &dimensions)
            .replace("{year}", &timestamp.year().to_string())
            .replace("{month:02d}", &format!("{:02}", timestamp.month()))
            .replace("{day:02d}", &format!("{:02}", timestamp.day()));
        self.root.join(relative)
    }
}

impl Backend for FileSystemBackend {
    fn prepare_type(&mut self, schema: &Arc<TableSchema>) -> Result<(), StoreError> {
        self.codec_for(schema);
        Ok(())
    }

    fn persist(&mut self, point: &Point) -> Result<(), StoreError> {
        trace!("persisting {} point at {}", point.schema().table(), point.timestamp());
        let codec = self.codec_for(point.schema());
        let record = codec.encode(point)?;
        let path = self.day_path(point);
        let day_file = match self.open_files.entry(path.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(DayFile::open(path, codec.record_size())?),
        };
        day_file.append(record);
        Ok(())
    }

    fn query(
        &mut self,
        schema: &Arc<TableSchema>,
        dimensions: &HashMap<String, Value>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<PointStream, StoreError> {
        let codec = self.codec_for(schema);
        let lookup = FileLookup::new(schema, dimensions, start_time, end_time)?;
        let mut files = Vec::new();
        let table_root = self.root.join(schema.table());
        if table_root.is_dir() {
            for entry in WalkDir::new(&table_root) {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_file() && lookup.should_visit(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        }
        files.sort();
        debug!("query on {} visits {} day files", schema.table(), files.len());
        Ok(Box::new(QueryIter {
            codec,
            files: files.into(),
            current: None,
            end_time: end_time.map(|end| end.timestamp()),
            failed: false,
        }))
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        info!("commit: flushing {} day files", self.open_files.len());
        for (_, day_file) in self.open_files.drain() {
            day_file.commit()?;
        }
        Ok(())
    }
}

/// Lazy query cursor: opens candidate files one at a time, in ascending
/// path (and therefore date) order, and decodes records as they are pulled.
/// Dropping it mid-file releases the underlying handle with it.
pub struct QueryIter {
    codec: Arc<RecordCodec>,
    files: VecDeque<PathBuf>,
    current: Option<RecordScan>,
    end_time: Option<i64>,
    failed: bool,
}

impl Iterator for QueryIter {
    type Item = Result<Point, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(scan) = self.current.as_mut() {
                match scan.next() {
                    Some(Ok(record)) => {
                        return match self.codec.decode(&record) {
                            Ok(point) => Some(Ok(point)),
                            Err(error) => {
                                self.failed = true;
                                Some(Err(error))
                            }
                        };
                    }
                    Some(Err(error)) => {
                        self.failed = true;
                        return Some(Err(error));
                    }
                    None => self.current = None,
                }
            }
            let path = self.files.pop_front()?;
            trace!("traversing {}", path.display());
            match RecordScan::open(&path, self.codec.record_size(), self.end_time) {
                Ok(scan) => self.current = Some(scan),
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}
