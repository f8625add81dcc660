use thiserror::Error;

/// Failures raised by the embedded document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("BSON error: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("WAL corrupted at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("operation cancelled")]
    Cancelled,
}

/// Domain error taxonomy surfaced by the repository and service layers.
///
/// Every variant carries a human readable message; the HTTP layer forwards it
/// verbatim in the response envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TodoError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    StoreRead(String),

    #[error("{0}")]
    StoreWrite(String),
}

impl TodoError {
    #[must_use]
    pub fn not_found(id: &str) -> Self {
        Self::NotFound(format!("todo not found: {id}"))
    }

    #[must_use]
    pub fn read(e: &StoreError) -> Self {
        Self::StoreRead(e.to_string())
    }

    #[must_use]
    pub fn write(e: &StoreError) -> Self {
        Self::StoreWrite(e.to_string())
    }
}
