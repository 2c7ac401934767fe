//! Error types for tbcalo-core.

use thiserror::Error;

/// Result type alias for tbcalo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for tbcalo operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Channel index outside the sensor grid.
    #[error("channel {channel} outside sensor range [0, {n_channels})")]
    ChannelOutOfRange { channel: i64, n_channels: usize },

    /// Sensor coordinate outside the grid.
    #[error("sensor coordinate (col {col}, row {row}) outside {cols}x{rows} grid")]
    CoordinateOutOfRange {
        col: usize,
        row: usize,
        cols: usize,
        rows: usize,
    },

    /// Parallel hit sequences of one event differ in length.
    #[error(
        "hit sequences of event at row {row} differ in length: \
         planes={planes}, channels={channels}, amplitudes={amplitudes}"
    )]
    LengthMismatch {
        row: usize,
        planes: usize,
        channels: usize,
        amplitudes: usize,
    },

    /// A required column is absent from the table.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// A column name appears twice.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// A column does not have the table's row count.
    #[error("column {column} has {found} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    /// A row does not have one value per column.
    #[error("row has {found} values, table has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    /// A cell does not hold the kind of value the operation needs.
    #[error("column {column}, row {row}: expected {expected}")]
    TypeMismatch {
        column: String,
        row: usize,
        expected: &'static str,
    },

    /// Values inside one group differ for a column reduced as consistent.
    #[error("column {column} is not constant within the group of row {row}")]
    InconsistentGroup { column: String, row: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
