//! Text-emitter backend: renders operations as SQL-flavored log lines.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::backend::{Backend, PointStream};
use crate::errors::StoreError;
use crate::schema::{Point, TIMESTAMP_FIELD, TableSchema, Value};

#[derive(Debug, Default)]
pub struct PrintBackend;

impl PrintBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for PrintBackend {
    fn persist(&mut self, point: &Point) -> Result<(), StoreError> {
        let schema = point.schema();
        let mut columns = vec![TIMESTAMP_FIELD.to_string()];
        let mut values = vec![point.timestamp().to_rfc3339()];
        for field in schema.fields() {
            columns.push(field.name.clone());
            values.push(point.value(&field.name).map(Value::to_string).unwrap_or_default());
        }
        info!("INSERT INTO {} ({}) VALUES ({})", schema.table(), columns.join(", "), values.join(", "));
        Ok(())
    }

    fn query(
        &mut self,
        schema: &Arc<TableSchema>,
        dimensions: &HashMap<String, Value>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<PointStream, StoreError> {
        let mut clauses: Vec<String> = schema
            .dimensions()
            .iter()
            .filter_map(|name| dimensions.get(name).map(|value| format!("{name} = {value}")))
            .collect();
        clauses.push(format!("timestamp >= {start_time}"));
        if let Some(end) = end_time {
            clauses.push(format!("timestamp <= {end}"));
        }
        info!("SELECT * FROM {} WHERE ({})", schema.table(), clauses.join(" AND "));
        Ok(Box::new(std::iter::empty()))
    }
}
