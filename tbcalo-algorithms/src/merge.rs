//! Joining two tables on a key column each.
//!
//! Used to synchronise calorimeter events with an external tracking
//! stream through the shared trigger number.

use std::collections::HashMap;

use log::debug;
use tbcalo_core::error::Result;
use tbcalo_core::table::{Table, Value};

/// Suffix appended to a clashing left column name.
pub const LEFT_SUFFIX: &str = "_x";
/// Suffix appended to a clashing right column name.
pub const RIGHT_SUFFIX: &str = "_y";

/// Inner join of `left` and `right` on `left.left_on == right.right_on`.
///
/// Rows follow left order, and right order within one key. All left columns
/// come first, then the right columns. When both keys have the same name the
/// right key is not repeated; any other name present on both sides gets
/// [`LEFT_SUFFIX`] / [`RIGHT_SUFFIX`]. `Null` keys never match.
///
/// # Errors
/// Returns [`tbcalo_core::Error::MissingColumn`] if a key column is absent.
pub fn inner_join(left: &Table, right: &Table, left_on: &str, right_on: &str) -> Result<Table> {
    let left_keys = left.require(left_on)?;
    let right_keys = right.require(right_on)?;

    let mut index: HashMap<&Value, Vec<usize>> = HashMap::new();
    for (row, key) in right_keys.iter().enumerate() {
        if !key.is_null() {
            index.entry(key).or_default().push(row);
        }
    }

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    for (row, key) in left_keys.iter().enumerate() {
        if let Some(matches) = index.get(key) {
            for &other in matches {
                left_rows.push(row);
                right_rows.push(other);
            }
        }
    }

    let shared_key = left_on == right_on;
    let right_names: Vec<&str> = right
        .names()
        .iter()
        .map(String::as_str)
        .filter(|name| !(shared_key && *name == right_on))
        .collect();
    let clashes = |name: &str| left.has_column(name) && right_names.contains(&name);

    let left_part = left.take_rows(&left_rows);
    let right_part = right.take_rows(&right_rows);
    let mut joined = Table::new();
    for (name, values) in left_part.iter_columns() {
        let name = if clashes(name) {
            format!("{name}{LEFT_SUFFIX}")
        } else {
            name.to_string()
        };
        joined.push_column(name, values.to_vec())?;
    }
    for &name in &right_names {
        let values = right_part.require(name)?.to_vec();
        let name = if clashes(name) {
            format!("{name}{RIGHT_SUFFIX}")
        } else {
            name.to_string()
        };
        joined.push_column(name, values)?;
    }

    debug!(
        "joined {} x {} rows on {left_on}={right_on} into {} rows",
        left.n_rows(),
        right.n_rows(),
        joined.n_rows()
    );
    Ok(joined)
}

/// Replaces every list cell of `column` by its first element.
///
/// Empty lists become `Null`; scalar cells are left as they are.
///
/// # Errors
/// Returns [`tbcalo_core::Error::MissingColumn`] if the column is absent.
pub fn first_element(table: &Table, column: &str) -> Result<Table> {
    let values: Vec<Value> = table
        .require(column)?
        .iter()
        .map(|value| match value {
            Value::List(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        })
        .collect();

    let mut out = Table::new();
    for (name, column_values) in table.iter_columns() {
        if name == column {
            out.push_column(name, values.clone())?;
        } else {
            out.push_column(name, column_values.to_vec())?;
        }
    }
    Ok(out)
}
