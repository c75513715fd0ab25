//! Query planner: decides which day files are candidates for a query.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::errors::StoreError;
use crate::schema::{TableSchema, Value};

/// Prunes the partition tree by dimension path and calendar date. A file is
/// visited iff the precomputed dimension path occurs in its path and its
/// trailing `Y/M/D` components fall inside the query range.
pub struct FileLookup {
    dimension_path: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl FileLookup {
    /// # Errors
    /// `StoreError::Schema` when `dimensions` does not bind every dimension
    /// the table declares.
    pub fn new(
        schema: &TableSchema,
        dimensions: &HashMap<String, Value>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Self, StoreError> {
        let mut parts = Vec::new();
        for name in schema.dimensions() {
            let value = dimensions.get(name).ok_or_else(|| {
                StoreError::Schema(format!(
                    "query does not bind dimension `{name}` of table `{}`",
                    schema.table()
                ))
            })?;
            parts.push(name.clone());
            parts.push(value.to_string());
        }
        Ok(Self { dimension_path: parts.join("/"), start_time, end_time })
    }

    pub fn should_visit(&self, path: &Path) -> bool {
        let Some(date) = file_date(path) else {
            // not a day file; skipped, never fatal
            return false;
        };
        if !self.dimension_path.is_empty() && !path.to_string_lossy().contains(&self.dimension_path) {
            return false;
        }
        if date < self.start_time {
            return false;
        }
        if let Some(end) = self.end_time
            && date >= end + TimeDelta::days(1)
        {
            return false;
        }
        true
    }
}

/// UTC midnight of the trailing `Y/M/D` path components, or `None` when
/// they do not parse as a calendar date.
fn file_date(path: &Path) -> Option<DateTime<Utc>> {
    let mut components = path.iter().rev().filter_map(|component| component.to_str());
    let day: u32 = components.next()?.parse().ok()?;
    let month: u32 = components.next()?.parse().ok()?;
    let year: i32 = components.next()?.parse().ok()?;
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}
