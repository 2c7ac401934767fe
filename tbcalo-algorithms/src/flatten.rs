//! Hit flattening with energy aggregation.
//!
//! Expands each event row (parallel plane/channel/amplitude lists) into one
//! row per hit and broadcasts two aggregates onto every hit row:
//!
//! - shower energy: sum of amplitudes of the non-noisy hits of the event
//! - plane energy: sum of amplitudes of the non-noisy hits of (event, plane)
//!
//! Noisy hits keep their rows; they only drop out of the sums. A group with
//! no non-noisy hit gets a `Null` aggregate rather than zero.

use std::collections::HashMap;

use log::debug;
use tbcalo_core::config::FlattenConfig;
use tbcalo_core::error::{Error, Result};
use tbcalo_core::table::{Table, Value};

/// Flattens an event table into a per-hit table.
///
/// Output columns are the event columns (minus `drop_columns`) in their
/// original order, followed by the shower energy and plane energy columns.
/// Rows follow event order, then hit order within each event.
///
/// # Errors
/// - [`Error::MissingColumn`] if the event id or a hit column is absent
/// - [`Error::TypeMismatch`] if a hit cell is not a list, or a plane,
///   channel or amplitude entry has the wrong type
/// - [`Error::LengthMismatch`] if the three hit lists of an event differ in length
pub fn flatten_events(events: &Table, config: &FlattenConfig) -> Result<Table> {
    let columns = &config.columns;
    let drop: Vec<&str> = config.drop_columns.iter().map(String::as_str).collect();
    let events = events.without_columns(&drop);

    let event_ids = events.require(&columns.event_id)?;
    let [plane_name, channel_name, amplitude_name] = columns.hit_columns();
    let position = |name: &str| {
        events
            .column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };
    let plane_pos = position(plane_name)?;
    let channel_pos = position(channel_name)?;
    let amplitude_pos = position(amplitude_name)?;

    let mut out: Vec<Vec<Value>> = vec![Vec::new(); events.n_columns()];
    let mut keys: Vec<(Value, Value)> = Vec::new();
    let mut shower_sums: HashMap<Value, f64> = HashMap::new();
    let mut plane_sums: HashMap<(Value, Value), f64> = HashMap::new();
    let mut n_noisy = 0usize;

    for row in 0..events.n_rows() {
        let planes = list_cell(&events, plane_pos, row)?;
        let channels = list_cell(&events, channel_pos, row)?;
        let amplitudes = list_cell(&events, amplitude_pos, row)?;

        if planes.len() != channels.len() || planes.len() != amplitudes.len() {
            return Err(Error::LengthMismatch {
                row,
                planes: planes.len(),
                channels: channels.len(),
                amplitudes: amplitudes.len(),
            });
        }

        let event_id = &event_ids[row];
        for hit in 0..planes.len() {
            let plane = planes[hit].as_i64().ok_or_else(|| Error::TypeMismatch {
                column: plane_name.to_string(),
                row,
                expected: "integer plane index",
            })?;
            let channel = channels[hit].as_i64().ok_or_else(|| Error::TypeMismatch {
                column: channel_name.to_string(),
                row,
                expected: "integer channel index",
            })?;
            let amplitude = amplitudes[hit].as_f64().ok_or_else(|| Error::TypeMismatch {
                column: amplitude_name.to_string(),
                row,
                expected: "numeric amplitude",
            })?;

            for (pos, column) in out.iter_mut().enumerate() {
                let value = match pos {
                    p if p == plane_pos => planes[hit].clone(),
                    p if p == channel_pos => channels[hit].clone(),
                    p if p == amplitude_pos => amplitudes[hit].clone(),
                    p => events.column_at(p)[row].clone(),
                };
                column.push(value);
            }

            let key = (event_id.clone(), planes[hit].clone());
            if config.noisy.contains(plane, channel) {
                n_noisy += 1;
            } else {
                *shower_sums.entry(event_id.clone()).or_insert(0.0) += amplitude;
                *plane_sums.entry(key.clone()).or_insert(0.0) += amplitude;
            }
            keys.push(key);
        }
    }

    let shower_energy: Vec<Value> = keys
        .iter()
        .map(|(event, _)| Value::from(shower_sums.get(event).copied()))
        .collect();
    let plane_energy: Vec<Value> = keys
        .iter()
        .map(|key| Value::from(plane_sums.get(key).copied()))
        .collect();

    let mut flat = Table::from_columns(events.names().iter().cloned().zip(out))?;
    flat.push_column(columns.shower_energy.as_str(), shower_energy)?;
    flat.push_column(columns.plane_energy.as_str(), plane_energy)?;

    debug!(
        "flattened {} events into {} hits ({} on noisy channels)",
        events.n_rows(),
        flat.n_rows(),
        n_noisy
    );
    Ok(flat)
}

fn list_cell(table: &Table, column: usize, row: usize) -> Result<&[Value]> {
    table.column_at(column)[row]
        .as_list()
        .ok_or_else(|| Error::TypeMismatch {
            column: table.names()[column].clone(),
            row,
            expected: "list of hits",
        })
}
