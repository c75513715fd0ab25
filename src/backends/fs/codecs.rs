//! Per-field encoders between semantic values and fixed-width byte fields.
//!
//! Codec choice is a pure function of the schema annotation, never of the
//! runtime value. Each codec knows its byte width and struct-format code;
//! the record layer concatenates them into the full layout.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::errors::StoreError;
use crate::schema::{FieldType, Value};

/// Byte width of the scaled integer backing a decimal field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalWidth {
    One,
    Two,
    Four,
    Eight,
}

impl DecimalWidth {
    pub fn for_digits(max_digits: u32) -> Self {
        if max_digits <= 2 {
            Self::One
        } else if max_digits <= 5 {
            Self::Two
        } else if max_digits <= 10 {
            Self::Four
        } else {
            Self::Eight
        }
    }

    pub const fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    pub const fn fmt_code(self) -> char {
        match self {
            Self::One => 'b',
            Self::Two => 'h',
            Self::Four => 'i',
            Self::Eight => 'q',
        }
    }

    const fn range(self) -> (i64, i64) {
        match self {
            Self::One => (i8::MIN as i64, i8::MAX as i64),
            Self::Two => (i16::MIN as i64, i16::MAX as i64),
            Self::Four => (i32::MIN as i64, i32::MAX as i64),
            Self::Eight => (i64::MIN, i64::MAX),
        }
    }
}

/// Closed set of field codecs. All multi-byte fields are little-endian.
#[derive(Debug, Clone)]
pub enum FieldCodec {
    Integer,
    Float,
    Decimal { places: u32, width: DecimalWidth },
    Text { max_length: usize },
    Enum { variants: Vec<(String, u16)> },
}

impl FieldCodec {
    pub fn for_field(kind: &FieldType) -> Self {
        match kind {
            FieldType::Integer => Self::Integer,
            FieldType::Float => Self::Float,
            FieldType::Decimal { max_digits, decimal_places } => Self::Decimal {
                places: *decimal_places,
                width: DecimalWidth::for_digits(*max_digits),
            },
            FieldType::Text { max_length } => Self::Text { max_length: *max_length },
            FieldType::Enum { variants } => Self::Enum { variants: variants.clone() },
        }
    }

    /// On-disk width in bytes.
    pub fn width(&self) -> usize {
        match self {
            Self::Integer | Self::Float => 4,
            Self::Decimal { width, .. } => width.bytes(),
            Self::Text { max_length } => *max_length,
            Self::Enum { .. } => 2,
        }
    }

    /// Struct-format code for the layout string.
    pub fn fmt_code(&self) -> String {
        match self {
            Self::Integer => "I".to_string(),
            Self::Float => "f".to_string(),
            Self::Decimal { width, .. } => width.fmt_code().to_string(),
            Self::Text { max_length } => format!("{max_length}s"),
            Self::Enum { .. } => "H".to_string(),
        }
    }

    /// Appends the fixed-width encoding of `value` to `out`.
    ///
    /// # Errors
    /// `StoreError::Encoding` when the value's kind does not match the
    /// codec, a string exceeds its `max_length`, a scaled decimal does not
    /// fit the chosen integer width, or an enum name is not declared.
    pub fn encode(&self, field: &str, value: &Value, out: &mut Vec<u8>) -> Result<(), StoreError> {
        match (self, value) {
            (Self::Integer, Value::Integer(raw)) => {
                out.extend_from_slice(&raw.to_le_bytes());
                Ok(())
            }
            (Self::Float, Value::Float(raw)) => {
                out.extend_from_slice(&raw.to_le_bytes());
                Ok(())
            }
            (Self::Decimal { places, width }, Value::Decimal(decimal)) => {
                encode_decimal(field, *places, *width, *decimal, out)
            }
            (Self::Text { max_length }, Value::Text(text)) => {
                let bytes = text.as_bytes();
                if bytes.len() > *max_length {
                    return Err(StoreError::encoding(
                        field,
                        format!("string of {} bytes exceeds max_length {max_length}", bytes.len()),
                    ));
                }
                out.extend_from_slice(bytes);
                out.resize(out.len() + (*max_length - bytes.len()), 0);
                Ok(())
            }
            (Self::Enum { variants }, Value::Enum(name)) => {
                let value = variants
                    .iter()
                    .find(|(variant, _)| variant == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| StoreError::encoding(field, format!("`{name}` is not a declared variant")))?;
                out.extend_from_slice(&value.to_le_bytes());
                Ok(())
            }
            (_, other) => Err(StoreError::encoding(field, format!("value {other:?} does not match the field type"))),
        }
    }

    /// Decodes a window of exactly [`width`](Self::width) bytes.
    ///
    /// # Errors
    /// `StoreError::Decoding` on invalid UTF-8 or an ordinal absent from the
    /// declared enum set; `StoreError::ShortRecord` on a truncated window.
    pub fn decode(&self, field: &str, bytes: &[u8]) -> Result<Value, StoreError> {
        if bytes.len() != self.width() {
            return Err(StoreError::ShortRecord { expected: self.width(), found: bytes.len() });
        }
        match self {
            Self::Integer => Ok(Value::Integer(u32::from_le_bytes(array(field, bytes)?))),
            Self::Float => Ok(Value::Float(f32::from_le_bytes(array(field, bytes)?))),
            Self::Decimal { places, width } => {
                let raw = match width {
                    DecimalWidth::One => i64::from(i8::from_le_bytes(array(field, bytes)?)),
                    DecimalWidth::Two => i64::from(i16::from_le_bytes(array(field, bytes)?)),
                    DecimalWidth::Four => i64::from(i32::from_le_bytes(array(field, bytes)?)),
                    DecimalWidth::Eight => i64::from_le_bytes(array(field, bytes)?),
                };
                Ok(Value::Decimal(Decimal::new(raw, *places)))
            }
            Self::Text { .. } => {
                let stripped: Vec<u8> = bytes.iter().copied().filter(|byte| *byte != 0).collect();
                String::from_utf8(stripped)
                    .map(Value::Text)
                    .map_err(|_| StoreError::decoding(field, "stored bytes are not valid UTF-8"))
            }
            Self::Enum { variants } => {
                let ordinal = u16::from_le_bytes(array(field, bytes)?);
                variants
                    .iter()
                    .find(|(_, value)| *value == ordinal)
                    .map(|(name, _)| Value::Enum(name.clone()))
                    .ok_or_else(|| StoreError::decoding(field, format!("unknown ordinal {ordinal}")))
            }
        }
    }
}

fn encode_decimal(
    field: &str,
    places: u32,
    width: DecimalWidth,
    decimal: Decimal,
    out: &mut Vec<u8>,
) -> Result<(), StoreError> {
    let factor = Decimal::from(10u64.pow(places));
    let scaled = decimal
        .checked_mul(factor)
        .ok_or_else(|| StoreError::encoding(field, "value overflows while scaling"))?
        .round();
    let raw = scaled
        .to_i64()
        .ok_or_else(|| StoreError::encoding(field, "scaled value exceeds 64 bits"))?;
    let (min, max) = width.range();
    if raw < min || raw > max {
        return Err(StoreError::encoding(
            field,
            format!("scaled value {raw} does not fit a {}-byte integer", width.bytes()),
        ));
    }
    match width {
        DecimalWidth::One => out.extend_from_slice(&(raw as i8).to_le_bytes()),
        DecimalWidth::Two => out.extend_from_slice(&(raw as i16).to_le_bytes()),
        DecimalWidth::Four => out.extend_from_slice(&(raw as i32).to_le_bytes()),
        DecimalWidth::Eight => out.extend_from_slice(&raw.to_le_bytes()),
    }
    Ok(())
}

fn array<const N: usize>(field: &str, bytes: &[u8]) -> Result<[u8; N], StoreError> {
    bytes
        .try_into()
        .map_err(|_| StoreError::decoding(field, format!("expected a {N}-byte window, found {}", bytes.len())))
}
