//! Crate-wide error type
//!
//! Mirrors the shape of the AI client's error enum: one variant per
//! external failure domain, with `#[from]` conversions where the
//! underlying error type is unambiguous.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<redb::DatabaseError> for IndexError {
    fn from(e: redb::DatabaseError) -> Self {
        IndexError::Store(e.to_string())
    }
}

impl From<redb::TransactionError> for IndexError {
    fn from(e: redb::TransactionError) -> Self {
        IndexError::Store(e.to_string())
    }
}

impl From<redb::TableError> for IndexError {
    fn from(e: redb::TableError) -> Self {
        IndexError::Store(e.to_string())
    }
}

impl From<redb::StorageError> for IndexError {
    fn from(e: redb::StorageError) -> Self {
        IndexError::Store(e.to_string())
    }
}

impl From<redb::CommitError> for IndexError {
    fn from(e: redb::CommitError) -> Self {
        IndexError::Store(e.to_string())
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(e: reqwest::Error) -> Self {
        IndexError::Embedding(e.to_string())
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
