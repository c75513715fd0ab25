use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("cannot encode field `{field}`: {reason}")]
    Encoding { field: String, reason: String },

    #[error("cannot decode field `{field}`: {reason}")]
    Decoding { field: String, reason: String },

    #[error("short record: expected {expected} bytes, found {found}")]
    ShortRecord { expected: usize, found: usize },
}

impl StoreError {
    pub(crate) fn encoding(field: &str, reason: impl Into<String>) -> Self {
        Self::Encoding { field: field.to_string(), reason: reason.into() }
    }

    pub(crate) fn decoding(field: &str, reason: impl Into<String>) -> Self {
        Self::Decoding { field: field.to_string(), reason: reason.into() }
    }
}
