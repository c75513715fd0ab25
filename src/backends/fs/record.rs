//! Compiled fixed-width binary layout for one record type.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use log::debug;

use crate::errors::StoreError;
use crate::schema::{Point, TIMESTAMP_FIELD, TableSchema};

use super::codecs::FieldCodec;

/// Compiles a [`TableSchema`] into an ordered codec list, the layout string,
/// and the total record size. All records of one type are exactly
/// [`record_size`](Self::record_size) bytes: the timestamp as a u32 first,
/// then the remaining fields in declaration order.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    schema: Arc<TableSchema>,
    codecs: Vec<(String, FieldCodec)>,
    layout: String,
    record_size: usize,
}

impl RecordCodec {
    pub fn new(schema: &Arc<TableSchema>) -> Self {
        let mut codecs = vec![(TIMESTAMP_FIELD.to_string(), FieldCodec::Integer)];
        for field in schema.fields() {
            codecs.push((field.name.clone(), FieldCodec::for_field(&field.kind)));
        }
        // little-endian marker, then one format code per field
        let mut layout = String::from("<");
        let mut record_size = 0;
        for (_, codec) in &codecs {
            layout.push_str(&codec.fmt_code());
            record_size += codec.width();
        }
        debug!("compiled layout {layout} ({record_size} bytes) for table {}", schema.table());
        Self { schema: Arc::clone(schema), codecs, layout, record_size }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Encodes a point into its fixed-width record.
    ///
    /// # Errors
    /// `StoreError::Encoding` when the timestamp falls outside the unsigned
    /// 32-bit epoch range, a declared field is missing from the point, or a
    /// field value fails its codec.
    pub fn encode(&self, point: &Point) -> Result<Vec<u8>, StoreError> {
        let seconds = u32::try_from(point.timestamp().timestamp()).map_err(|_| {
            StoreError::encoding(TIMESTAMP_FIELD, "outside the unsigned 32-bit epoch range")
        })?;
        let mut out = Vec::with_capacity(self.record_size);
        out.extend_from_slice(&seconds.to_le_bytes());
        for (name, codec) in self.codecs.iter().skip(1) {
            let value = point
                .value(name)
                .ok_or_else(|| StoreError::encoding(name, "missing from point"))?;
            codec.encode(name, value, &mut out)?;
        }
        Ok(out)
    }

    /// Reconstructs a point from one record.
    ///
    /// # Errors
    /// `StoreError::ShortRecord` when `bytes` is not exactly one record;
    /// `StoreError::Decoding` when a field window fails its codec.
    pub fn decode(&self, bytes: &[u8]) -> Result<Point, StoreError> {
        if bytes.len() != self.record_size {
            return Err(StoreError::ShortRecord { expected: self.record_size, found: bytes.len() });
        }
        let seconds = lead_timestamp(bytes)?;
        let timestamp = Utc
            .timestamp_opt(i64::from(seconds), 0)
            .single()
            .ok_or_else(|| StoreError::decoding(TIMESTAMP_FIELD, "not a valid instant"))?;
        let mut point = Point::new(&self.schema, timestamp);
        let mut offset = 4;
        for (name, codec) in self.codecs.iter().skip(1) {
            let window = &bytes[offset..offset + codec.width()];
            offset += codec.width();
            point.set(name.clone(), codec.decode(name, window)?);
        }
        Ok(point)
    }
}

/// Leading timestamp of an encoded record; the timestamp is always the
/// first field.
pub fn lead_timestamp(record: &[u8]) -> Result<u32, StoreError> {
    let bytes: [u8; 4] = record
        .get(..4)
        .and_then(|window| window.try_into().ok())
        .ok_or(StoreError::ShortRecord { expected: 4, found: record.len() })?;
    Ok(u32::from_le_bytes(bytes))
}
