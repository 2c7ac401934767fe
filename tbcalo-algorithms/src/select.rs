//! Row selection and deduplication.
//!
//! All operations preserve input row order and return re-indexed tables.

use std::collections::HashSet;

use tbcalo_core::config::ColumnNames;
use tbcalo_core::error::Result;
use tbcalo_core::table::{Table, Value};

/// Values accepted by a membership filter: one value or a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Match a single value.
    One(Value),
    /// Match any of several values.
    Many(Vec<Value>),
}

impl Selection {
    /// Returns true if `value` is selected.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Selection::One(v) => v == value,
            Selection::Many(values) => values.contains(value),
        }
    }
}

impl From<i64> for Selection {
    fn from(v: i64) -> Self {
        Selection::One(Value::Int(v))
    }
}

impl From<Value> for Selection {
    fn from(v: Value) -> Self {
        Selection::One(v)
    }
}

impl From<Vec<i64>> for Selection {
    fn from(v: Vec<i64>) -> Self {
        Selection::Many(v.into_iter().map(Value::Int).collect())
    }
}

impl From<&[i64]> for Selection {
    fn from(v: &[i64]) -> Self {
        Selection::Many(v.iter().copied().map(Value::Int).collect())
    }
}

impl<const N: usize> From<[i64; N]> for Selection {
    fn from(v: [i64; N]) -> Self {
        Selection::Many(v.into_iter().map(Value::Int).collect())
    }
}

impl From<Vec<Value>> for Selection {
    fn from(v: Vec<Value>) -> Self {
        Selection::Many(v)
    }
}

/// Hit selection criteria. Unset criteria impose no constraint; set
/// criteria combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitSelection {
    /// Plane indices to keep.
    pub planes: Option<Selection>,
    /// Channel indices to keep.
    pub channels: Option<Selection>,
    /// Inclusive lower amplitude bound.
    pub amplitude_min: Option<f64>,
    /// Inclusive upper amplitude bound.
    pub amplitude_max: Option<f64>,
}

impl HitSelection {
    /// Creates a selection that keeps every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given plane(s).
    #[must_use]
    pub fn planes(mut self, planes: impl Into<Selection>) -> Self {
        self.planes = Some(planes.into());
        self
    }

    /// Restricts to the given channel(s).
    #[must_use]
    pub fn channels(mut self, channels: impl Into<Selection>) -> Self {
        self.channels = Some(channels.into());
        self
    }

    /// Sets the inclusive lower amplitude bound.
    #[must_use]
    pub fn amplitude_min(mut self, min: f64) -> Self {
        self.amplitude_min = Some(min);
        self
    }

    /// Sets the inclusive upper amplitude bound.
    #[must_use]
    pub fn amplitude_max(mut self, max: f64) -> Self {
        self.amplitude_max = Some(max);
        self
    }

    /// Returns true if no criterion is set.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.planes.is_none()
            && self.channels.is_none()
            && self.amplitude_min.is_none()
            && self.amplitude_max.is_none()
    }
}

/// Applies a [`HitSelection`] to a flattened hit table.
///
/// Columns are only required for the criteria that are set.
///
/// # Errors
/// Returns [`tbcalo_core::Error::MissingColumn`] if a constrained column is absent.
pub fn select(table: &Table, selection: &HitSelection, columns: &ColumnNames) -> Result<Table> {
    let mut out = filter_column(table, &columns.plane, selection.planes.as_ref())?;
    out = filter_column(&out, &columns.channel, selection.channels.as_ref())?;
    filter_range(
        &out,
        &columns.amplitude,
        selection.amplitude_min,
        selection.amplitude_max,
    )
}

/// Keeps the rows whose `column` value is selected. `None` keeps every row.
///
/// # Errors
/// Returns an error if a selection is given and the column is absent.
pub fn filter_column(table: &Table, column: &str, selection: Option<&Selection>) -> Result<Table> {
    let Some(selection) = selection else {
        return Ok(table.clone());
    };
    let values = table.require(column)?;
    let keep: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, value)| selection.matches(value))
        .map(|(i, _)| i)
        .collect();
    Ok(table.take_rows(&keep))
}

/// Keeps the rows whose numeric `column` value lies in `[min, max]`.
///
/// Either bound may be omitted. Non-numeric cells never satisfy a bound.
///
/// # Errors
/// Returns an error if a bound is given and the column is absent.
pub fn filter_range(
    table: &Table,
    column: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Table> {
    if min.is_none() && max.is_none() {
        return Ok(table.clone());
    }
    let values = table.require(column)?;
    let keep: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, value)| {
            value.as_f64().is_some_and(|v| {
                min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
            })
        })
        .map(|(i, _)| i)
        .collect();
    Ok(table.take_rows(&keep))
}

/// Removes exact full-row duplicates, keeping the first occurrence.
#[must_use]
pub fn dedup(table: &Table) -> Table {
    let mut seen = HashSet::with_capacity(table.n_rows());
    let keep: Vec<usize> = (0..table.n_rows())
        .filter(|&i| seen.insert(table.row(i)))
        .collect();
    table.take_rows(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbcalo_core::Error;

    fn hits() -> Table {
        Table::from_columns([
            (
                "planeID",
                vec![0i64, 0, 1, 2, 1].into_iter().map(Value::Int).collect(),
            ),
            (
                "channelID",
                vec![5i64, 6, 5, 5, 7].into_iter().map(Value::Int).collect(),
            ),
            (
                "amplitude",
                vec![
                    Value::Float(1.0),
                    Value::Float(2.5),
                    Value::Float(4.0),
                    Value::Null,
                    Value::Int(3),
                ],
            ),
        ])
        .unwrap()
    }

    fn column_ints(table: &Table, name: &str) -> Vec<i64> {
        table
            .column(name)
            .unwrap()
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_select_single_and_many() {
        let columns = ColumnNames::default();
        let single = select(&hits(), &HitSelection::new().planes(1_i64), &columns).unwrap();
        assert_eq!(column_ints(&single, "channelID"), vec![5, 7]);

        let many = select(&hits(), &HitSelection::new().planes([0_i64, 2]), &columns).unwrap();
        assert_eq!(column_ints(&many, "planeID"), vec![0, 0, 2]);
    }

    #[test]
    fn test_select_combines_with_and() {
        let columns = ColumnNames::default();
        let selection = HitSelection::new()
            .planes(vec![0_i64, 1])
            .channels(5_i64)
            .amplitude_min(2.0);
        let out = select(&hits(), &selection, &columns).unwrap();
        assert_eq!(out.n_rows(), 1);
        assert_eq!(out.row(0)[2], Value::Float(4.0));
    }

    #[test]
    fn test_amplitude_bounds_inclusive() {
        let out = filter_range(&hits(), "amplitude", Some(1.0), Some(3.0)).unwrap();
        assert_eq!(column_ints(&out, "channelID"), vec![5, 6, 7]);

        let max_only = filter_range(&hits(), "amplitude", None, Some(2.5)).unwrap();
        assert_eq!(max_only.n_rows(), 2);
    }

    #[test]
    fn test_unconstrained_selection_is_identity() {
        let selection = HitSelection::new();
        assert!(selection.is_unconstrained());
        let table = hits().without_columns(&["planeID"]);
        let out = select(&table, &selection, &ColumnNames::default()).unwrap();
        assert_eq!(out, table);
    }

    #[test]
    fn test_missing_column_fails_only_when_constrained() {
        let table = hits().without_columns(&["channelID"]);
        let columns = ColumnNames::default();
        assert!(select(&table, &HitSelection::new().planes(0_i64), &columns).is_ok());
        assert!(matches!(
            select(&table, &HitSelection::new().channels(5_i64), &columns),
            Err(Error::MissingColumn(_))
        ));
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let table = Table::from_columns([
            (
                "a",
                vec![Value::Int(2), Value::Int(1), Value::Int(2), Value::Int(1)],
            ),
            (
                "b",
                vec![
                    Value::Float(0.5),
                    Value::Null,
                    Value::Float(0.5),
                    Value::Float(0.5),
                ],
            ),
        ])
        .unwrap();
        let out = dedup(&table);
        assert_eq!(out.n_rows(), 3);
        assert_eq!(out.row(0), vec![Value::Int(2), Value::Float(0.5)]);
        assert_eq!(out.row(1), vec![Value::Int(1), Value::Null]);
        assert_eq!(out.row(2), vec![Value::Int(1), Value::Float(0.5)]);
    }
}
