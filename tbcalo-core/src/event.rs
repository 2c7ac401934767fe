//! Typed event records.
//!
//! Loaders produce generic [`Table`]s; `EventRecord` is the typed view used
//! when building event tables in code.

use crate::config::ColumnNames;
use crate::error::Result;
use crate::table::{Table, Value};

/// One trigger with its parallel hit sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    /// Event (trigger) identifier.
    pub event_id: i64,
    /// Plane index of each hit.
    pub planes: Vec<i64>,
    /// Channel index of each hit.
    pub channels: Vec<i64>,
    /// Amplitude of each hit (ADC counts).
    pub amplitudes: Vec<f64>,
}

impl EventRecord {
    /// Creates an event record.
    #[must_use]
    pub fn new(event_id: i64, planes: Vec<i64>, channels: Vec<i64>, amplitudes: Vec<f64>) -> Self {
        Self {
            event_id,
            planes,
            channels,
            amplitudes,
        }
    }

    /// Returns the number of hits, taken from the plane sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    /// Returns true if the event has no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

/// Builds an event table from typed records.
///
/// Columns are `event_id, amplitude, channel, plane`, the order the raw
/// test-beam trees use.
///
/// # Errors
/// Returns an error only if the column names collide.
pub fn events_to_table(records: &[EventRecord], columns: &ColumnNames) -> Result<Table> {
    let mut ids = Vec::with_capacity(records.len());
    let mut amplitudes = Vec::with_capacity(records.len());
    let mut channels = Vec::with_capacity(records.len());
    let mut planes = Vec::with_capacity(records.len());

    for record in records {
        ids.push(Value::Int(record.event_id));
        amplitudes.push(Value::from(record.amplitudes.clone()));
        channels.push(Value::from(record.channels.clone()));
        planes.push(Value::from(record.planes.clone()));
    }

    Table::from_columns([
        (columns.event_id.as_str(), ids),
        (columns.amplitude.as_str(), amplitudes),
        (columns.channel.as_str(), channels),
        (columns.plane.as_str(), planes),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_to_table() {
        let columns = ColumnNames::default();
        let records = vec![
            EventRecord::new(1, vec![0, 1], vec![10, 12], vec![0.3, 1.2]),
            EventRecord::new(2, vec![], vec![], vec![]),
        ];
        let table = events_to_table(&records, &columns).unwrap();

        assert_eq!(table.n_rows(), 2);
        assert_eq!(
            table.names(),
            &["TLU_number", "amplitude", "channelID", "planeID"]
        );
        assert_eq!(
            table.column("channelID").unwrap()[0],
            Value::List(vec![Value::Int(10), Value::Int(12)])
        );
        assert!(records[1].is_empty());
        assert_eq!(records[0].len(), 2);
    }
}
