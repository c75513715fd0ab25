//! Storage backend contract and backend selection.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backends::fs::FileSystemBackend;
use crate::backends::print::PrintBackend;
use crate::errors::StoreError;
use crate::schema::{Point, TableSchema, Value};

pub const BACKEND_ENV: &str = "TIME_SERIES_BACKEND";

/// Lazily yielded query results. A stream may be dropped at any point
/// without further I/O.
pub type PointStream = Box<dyn Iterator<Item = Result<Point, StoreError>>>;

pub trait Backend {
    /// Inspects the record type and prepares underlying structures.
    /// Idempotent; called once per type before the first persist or query.
    fn prepare_type(&mut self, _schema: &Arc<TableSchema>) -> Result<(), StoreError> {
        Ok(())
    }

    fn persist(&mut self, point: &Point) -> Result<(), StoreError>;

    fn query(
        &mut self,
        schema: &Arc<TableSchema>,
        dimensions: &HashMap<String, Value>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<PointStream, StoreError>;

    /// Flushes session state. Called once at session end, also on error
    /// paths.
    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Resolves the backend named by `TIME_SERIES_BACKEND`.
///
/// # Errors
/// `StoreError::Config` when the variable is missing or names an unknown
/// backend.
pub fn from_env() -> Result<Box<dyn Backend>, StoreError> {
    let name = std::env::var(BACKEND_ENV)
        .map_err(|_| StoreError::Config(format!("no backend selected; specify the {BACKEND_ENV} variable")))?;
    by_name(&name)
}

/// # Errors
/// `StoreError::Config` for an unknown backend name.
pub fn by_name(name: &str) -> Result<Box<dyn Backend>, StoreError> {
    match name {
        "fs" => Ok(Box::new(FileSystemBackend::from_env()?)),
        "print" => Ok(Box::new(PrintBackend::new())),
        other => Err(StoreError::Config(format!("invalid backend `{other}` selected"))),
    }
}
