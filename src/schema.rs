//! Record type descriptors and the typed point model.
//!
//! A [`TableSchema`] names a table, the fields that make up one record, and
//! which of those fields are dimensions (their values become part of the
//! partition path). The `timestamp` field is implicit: every point carries
//! one and it is always first in the on-disk layout.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::StoreError;

/// Name reserved for the implicit timestamp field.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Widest decimal the scaled-integer encoding can hold exactly.
pub const DECIMAL_MAX_DIGITS: u32 = 18;

/// Semantic type of one schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Unsigned 32-bit integer.
    Integer,
    /// 32-bit IEEE-754 floating point.
    Float,
    /// Fixed-point decimal, stored as a scaled signed integer.
    Decimal { max_digits: u32, decimal_places: u32 },
    /// UTF-8 string occupying exactly `max_length` bytes, NUL-padded.
    Text { max_length: usize },
    /// Closed set of named variants, stored as the declared u16 value.
    Enum { variants: Vec<(String, u16)> },
}

impl FieldType {
    pub fn text(max_length: usize) -> Self {
        Self::Text { max_length }
    }

    pub fn decimal(max_digits: u32, decimal_places: u32) -> Self {
        Self::Decimal { max_digits, decimal_places }
    }

    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = (S, u16)>,
        S: Into<String>,
    {
        Self::Enum { variants: variants.into_iter().map(|(name, value)| (name.into(), value)).collect() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldType,
}

/// Immutable record type descriptor. Built once per type and shared behind
/// an `Arc` between the frontend, points, and the compiled record layout.
#[derive(Debug)]
pub struct TableSchema {
    table: String,
    dimensions: Vec<String>,
    fields: Vec<Field>,
}

impl TableSchema {
    pub fn builder(table: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder { table: table.into(), dimensions: Vec::new(), fields: Vec::new() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Dimension field names in declaration order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// All fields except the implicit timestamp, in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

pub struct SchemaBuilder {
    table: String,
    dimensions: Vec<String>,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    /// Declares a field whose value becomes part of the partition path.
    pub fn dimension(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        let name = name.into();
        self.dimensions.push(name.clone());
        self.fields.push(Field { name, kind });
        self
    }

    /// Declares a plain attribute field.
    pub fn attribute(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        self.fields.push(Field { name: name.into(), kind });
        self
    }

    /// Validates the declaration and produces the immutable descriptor.
    ///
    /// # Errors
    /// Returns `StoreError::Schema` for an empty table name, duplicate or
    /// reserved field names, or out-of-range size annotations.
    pub fn build(self) -> Result<TableSchema, StoreError> {
        if self.table.is_empty() {
            return Err(StoreError::Schema("table name must not be empty".to_string()));
        }
        let mut seen: Vec<&str> = Vec::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(StoreError::Schema(format!("table `{}` declares an unnamed field", self.table)));
            }
            if field.name == TIMESTAMP_FIELD {
                return Err(StoreError::Schema(format!(
                    "field name `{TIMESTAMP_FIELD}` is reserved in table `{}`",
                    self.table
                )));
            }
            if seen.contains(&field.name.as_str()) {
                return Err(StoreError::Schema(format!(
                    "duplicate field `{}` in table `{}`",
                    field.name, self.table
                )));
            }
            seen.push(&field.name);
            validate_field(&self.table, field)?;
        }
        Ok(TableSchema { table: self.table, dimensions: self.dimensions, fields: self.fields })
    }
}

fn validate_field(table: &str, field: &Field) -> Result<(), StoreError> {
    match &field.kind {
        FieldType::Integer | FieldType::Float => Ok(()),
        FieldType::Decimal { max_digits, decimal_places } => {
            if *max_digits == 0 || *max_digits > DECIMAL_MAX_DIGITS {
                return Err(StoreError::Schema(format!(
                    "field `{}` of table `{table}`: max_digits must be 1..={DECIMAL_MAX_DIGITS}",
                    field.name
                )));
            }
            if decimal_places > max_digits {
                return Err(StoreError::Schema(format!(
                    "field `{}` of table `{table}`: decimal_places exceeds max_digits",
                    field.name
                )));
            }
            Ok(())
        }
        FieldType::Text { max_length } => {
            if *max_length == 0 {
                return Err(StoreError::Schema(format!(
                    "field `{}` of table `{table}`: max_length must be non-zero",
                    field.name
                )));
            }
            Ok(())
        }
        FieldType::Enum { variants } => {
            if variants.is_empty() {
                return Err(StoreError::Schema(format!(
                    "field `{}` of table `{table}`: enum declares no variants",
                    field.name
                )));
            }
            for (index, (name, value)) in variants.iter().enumerate() {
                let clash = variants[..index]
                    .iter()
                    .any(|(other_name, other_value)| other_name == name || other_value == value);
                if clash {
                    return Err(StoreError::Schema(format!(
                        "field `{}` of table `{table}`: enum variant `{name}`/{value} is not unique",
                        field.name
                    )));
                }
            }
            Ok(())
        }
    }
}

/// One field value of a point.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(u32),
    Float(f32),
    Decimal(Decimal),
    Text(String),
    /// An enum variant, referenced by its declared name.
    Enum(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Enum(name) => write!(f, "{name}"),
        }
    }
}

/// A fully populated instance of a record type; the unit of persist and
/// query. The engine never retains points across calls.
#[derive(Debug, Clone)]
pub struct Point {
    schema: Arc<TableSchema>,
    timestamp: DateTime<Utc>,
    values: HashMap<String, Value>,
}

impl Point {
    pub fn new(schema: &Arc<TableSchema>, timestamp: DateTime<Utc>) -> Self {
        Self { schema: Arc::clone(schema), timestamp, values: HashMap::new() }
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.schema.table() == other.schema.table()
            && self.timestamp == other.timestamp
            && self.values == other.values
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.schema.table(), self.timestamp.to_rfc3339())?;
        for field in self.schema.fields() {
            match self.values.get(&field.name) {
                Some(value) => write!(f, "; {}={value}", field.name)?,
                None => write!(f, "; {}=?", field.name)?,
            }
        }
        Ok(())
    }
}
