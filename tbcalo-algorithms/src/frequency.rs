//! Channel occupancy grids.
//!
//! Counts hits per channel and lays the counts out on the sensor grid in
//! display order (row 0 is the physically topmost pad row).

use std::collections::HashMap;

use ndarray::Array2;
use tbcalo_core::config::ColumnNames;
use tbcalo_core::error::{Error, Result};
use tbcalo_core::geometry::SensorGeometry;
use tbcalo_core::table::{Table, Value};

use crate::select::{filter_column, Selection};

/// Builds the occupancy grid of a list of hit channels.
///
/// The grid has shape `(rows, cols)`; the count of a channel lands at
/// `[display_row(row), col]`. Empty input gives an all-zero grid.
///
/// # Errors
/// Returns [`Error::ChannelOutOfRange`] if a channel is off the sensor.
pub fn channel_frequency<I>(channels: I, geometry: &SensorGeometry) -> Result<Array2<u64>>
where
    I: IntoIterator<Item = i64>,
{
    let mut counts: HashMap<i64, u64> = HashMap::new();
    for channel in channels {
        *counts.entry(channel).or_insert(0) += 1;
    }

    let mut grid = Array2::<u64>::zeros((geometry.rows, geometry.cols));
    for (channel, count) in counts {
        let coord = geometry.coordinate(channel)?;
        grid[[geometry.display_row(coord.row), coord.col]] = count;
    }
    Ok(grid)
}

/// Builds the occupancy grid of one plane of a flattened hit table.
///
/// # Errors
/// Returns an error if the plane or channel column is missing, a channel is
/// not an integer, or a channel is off the sensor.
pub fn plane_occupancy(
    hits: &Table,
    plane: i64,
    columns: &ColumnNames,
    geometry: &SensorGeometry,
) -> Result<Array2<u64>> {
    let selection = Selection::One(Value::Int(plane));
    let plane_hits = filter_column(hits, &columns.plane, Some(&selection))?;
    let channels = plane_hits
        .require(&columns.channel)?
        .iter()
        .enumerate()
        .map(|(row, value)| {
            value.as_i64().ok_or_else(|| Error::TypeMismatch {
                column: columns.channel.clone(),
                row,
                expected: "integer channel index",
            })
        })
        .collect::<Result<Vec<_>>>()?;
    channel_frequency(channels, geometry)
}
