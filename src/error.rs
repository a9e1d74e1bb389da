//! Error types for a reconciliation run.

use crate::models::RunState;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used across the library.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The ComicRack document could not be read from disk.
    #[error("Error while reading ComicRack XML file {}: {source}", .path.display())]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The ComicRack document is not well-formed or lacks a `Books` element.
    #[error("Error while parsing ComicRack XML file: {0}")]
    SourceParse(String),

    /// The YACReader database is missing, unreadable or has an unexpected schema.
    #[error("Error while connecting to YACReader database {}: {source}", .path.display())]
    StoreConnect {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("YACReader database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Reconciliation run is {actual:?}, expected {expected:?}")]
    InvalidState { actual: RunState, expected: RunState },
}

impl SyncError {
    /// Fatal errors abort the run before any record is processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceRead { .. } | SyncError::SourceParse(_) | SyncError::StoreConnect { .. }
        )
    }
}

impl From<roxmltree::Error> for SyncError {
    fn from(err: roxmltree::Error) -> Self {
        SyncError::SourceParse(err.to_string())
    }
}
