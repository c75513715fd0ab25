#![forbid(unsafe_code)]

//! Append-and-sort filesystem storage for schema-typed time series.
//!
//! Points are strongly typed against a [`TableSchema`], encoded to
//! fixed-width binary records, and partitioned into one file per
//! (table, dimension values, calendar day). Every day file is sorted by
//! timestamp at rest; range queries prune the partition tree by dimension
//! path and date before scanning files sequentially.

pub mod backend;
pub mod backends;
pub mod errors;
pub mod logger;
pub mod schema;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use crate::backend::{Backend, PointStream};
pub use crate::errors::StoreError;
pub use crate::schema::{Field, FieldType, Point, TableSchema, Value};

/// A storage session. Resolves a backend, funnels adds and queries into
/// it, and flushes buffered writes on [`commit`](Self::commit).
pub struct Storage {
    backend: Box<dyn Backend>,
}

impl Storage {
    /// Opens the backend selected by the `TIME_SERIES_BACKEND` variable.
    ///
    /// # Errors
    /// `StoreError::Config` when no backend is selected, the selection is
    /// unknown, or the selected backend fails to configure itself.
    pub fn open() -> Result<Self, StoreError> {
        Ok(Self { backend: backend::from_env()? })
    }

    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// # Errors
    /// Propagates backend preparation failures.
    pub fn prepare_type(&mut self, schema: &Arc<TableSchema>) -> Result<(), StoreError> {
        self.backend.prepare_type(schema)
    }

    /// Buffers one point for persistence.
    ///
    /// # Errors
    /// Encoding failures abort this add only; previously buffered points
    /// remain.
    pub fn add(&mut self, point: &Point) -> Result<(), StoreError> {
        self.backend.persist(point)
    }

    /// Lazily yields every stored point matching the dimension values and
    /// time range, in ascending day order.
    ///
    /// # Errors
    /// Planner and I/O failures surface here; decode failures surface
    /// through the returned stream.
    pub fn query(
        &mut self,
        schema: &Arc<TableSchema>,
        dimensions: &HashMap<String, Value>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<PointStream, StoreError> {
        self.backend.query(schema, dimensions, start_time, end_time)
    }

    /// Flushes every buffered write. Call once at session end, also on
    /// error paths; skipping it loses RAM-buffered points.
    ///
    /// # Errors
    /// I/O failures are fatal for the affected file and propagate.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.backend.commit()
    }
}
