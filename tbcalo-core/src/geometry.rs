//! Sensor geometry: channel index to pad coordinate mapping.
//!
//! Pads are numbered row by row starting at the physical bottom-left pad.
//! Display and storage order is top-left origin, so rows are inverted with
//! [`SensorGeometry::display_row`] when filling a grid.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of pad rows on the sensor.
pub const SENSOR_ROWS: usize = 13;
/// Number of pad columns on the sensor.
pub const SENSOR_COLS: usize = 20;

/// Pad coordinate on the sensor, physical bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorCoord {
    /// Column (x).
    pub col: usize,
    /// Row (y), 0 is the physically lowest row.
    pub row: usize,
}

impl SensorCoord {
    /// Creates a new sensor coordinate.
    #[inline]
    #[must_use]
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

/// Fixed rows x cols pad layout of one sensor plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorGeometry {
    /// Number of pad rows.
    pub rows: usize,
    /// Number of pad columns.
    pub cols: usize,
}

impl Default for SensorGeometry {
    fn default() -> Self {
        Self {
            rows: SENSOR_ROWS,
            cols: SENSOR_COLS,
        }
    }
}

impl SensorGeometry {
    /// Creates a geometry with the given dimensions.
    ///
    /// # Errors
    /// Returns an error if either dimension is zero.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::ConfigError(format!(
                "sensor geometry must be non-empty, got {rows}x{cols}"
            )));
        }
        Ok(Self { rows, cols })
    }

    /// Returns the number of addressable channels.
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.rows * self.cols
    }

    /// Maps a channel index to its physical pad coordinate.
    ///
    /// # Errors
    /// Returns [`Error::ChannelOutOfRange`] for channels outside
    /// `[0, rows * cols)`.
    pub fn coordinate(&self, channel: i64) -> Result<SensorCoord> {
        let index = usize::try_from(channel)
            .ok()
            .filter(|&c| c < self.n_channels())
            .ok_or(Error::ChannelOutOfRange {
                channel,
                n_channels: self.n_channels(),
            })?;
        Ok(SensorCoord::new(index % self.cols, index / self.cols))
    }

    /// Maps a physical pad coordinate back to its channel index.
    ///
    /// # Errors
    /// Returns [`Error::CoordinateOutOfRange`] if the coordinate is off the grid.
    pub fn channel(&self, coord: SensorCoord) -> Result<i64> {
        if coord.col >= self.cols || coord.row >= self.rows {
            return Err(Error::CoordinateOutOfRange {
                col: coord.col,
                row: coord.row,
                cols: self.cols,
                rows: self.rows,
            });
        }
        i64::try_from(coord.row * self.cols + coord.col)
            .map_err(|_| Error::ConfigError("sensor too large for i64 channels".to_string()))
    }

    /// Converts a physical row to the top-left-origin display row.
    #[inline]
    #[must_use]
    pub fn display_row(&self, row: usize) -> usize {
        self.rows - 1 - row
    }
}
