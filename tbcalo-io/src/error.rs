//! I/O error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record of an event file could not be parsed.
    #[error("{path}: record {record}: {source}")]
    Record {
        /// File being read.
        path: PathBuf,
        /// Zero-based record index.
        record: usize,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Invalid glob pattern for run discovery.
    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Unsupported input file extension.
    #[error("unsupported input extension {found:?}, expected one of {expected:?}")]
    UnsupportedExtension {
        /// Extension that was requested.
        found: String,
        /// Extensions that are understood.
        expected: Vec<&'static str>,
    },

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] tbcalo_core::Error),
}
