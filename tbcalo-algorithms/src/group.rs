//! Grouping of hit rows back into one row per key.
//!
//! Each non-key column is reduced by an explicit [`Reduction`] taken from the
//! [`AggregationPlan`]. Nothing is inferred from column contents.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use tbcalo_core::config::ColumnNames;
use tbcalo_core::error::{Error, Result};
use tbcalo_core::table::{Table, Value};

/// How a non-key column is reduced within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Collect the values into a list, in original row order.
    Collect,
    /// Keep the first value of the group.
    #[default]
    TakeFirst,
    /// Keep the first value and fail if the group holds a different one.
    FirstConsistent,
}

/// Grouping keys plus a per-column reduction policy.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPlan {
    keys: Vec<String>,
    policies: HashMap<String, Reduction>,
    default: Reduction,
    drop: Vec<String>,
}

impl AggregationPlan {
    /// Creates a plan grouping by `keys`; every other column takes its first value.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            policies: HashMap::new(),
            default: Reduction::TakeFirst,
            drop: Vec::new(),
        }
    }

    /// Regroups flattened hits into events: grouped by event id, hit columns
    /// collected, plane energy dropped.
    #[must_use]
    pub fn events(columns: &ColumnNames) -> Self {
        Self::new([columns.event_id.as_str()])
            .collect(columns.hit_columns())
            .drop_columns([columns.plane_energy.as_str()])
    }

    /// Marks columns to be collected into lists.
    #[must_use]
    pub fn collect<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns
            .into_iter()
            .fold(self, |plan, column| plan.reduce(column, Reduction::Collect))
    }

    /// Sets the reduction of one column.
    #[must_use]
    pub fn reduce<S: Into<String>>(mut self, column: S, reduction: Reduction) -> Self {
        self.policies.insert(column.into(), reduction);
        self
    }

    /// Sets the reduction for columns without an explicit policy.
    #[must_use]
    pub fn with_default(mut self, reduction: Reduction) -> Self {
        self.default = reduction;
        self
    }

    /// Sets the columns removed before grouping. Absent names are ignored.
    #[must_use]
    pub fn drop_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the grouping keys.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns the reduction applied to `column`.
    #[must_use]
    pub fn reduction(&self, column: &str) -> Reduction {
        self.policies.get(column).copied().unwrap_or(self.default)
    }
}

/// Groups `table` according to `plan`.
///
/// The output holds one row per distinct key combination, ordered by key.
/// Columns are the keys (in plan order) followed by the remaining columns in
/// table order. Rows with a `Null` key are left out.
///
/// # Errors
/// - [`Error::ConfigError`] if the plan has no keys
/// - [`Error::MissingColumn`] if a key column is absent
/// - [`Error::InconsistentGroup`] for a [`Reduction::FirstConsistent`] column
///   that varies within a group
pub fn group(table: &Table, plan: &AggregationPlan) -> Result<Table> {
    if plan.keys.is_empty() {
        return Err(Error::ConfigError(
            "grouping needs at least one key column".to_string(),
        ));
    }
    let drop: Vec<&str> = plan.drop.iter().map(String::as_str).collect();
    let table = table.without_columns(&drop);

    let key_columns = plan
        .keys
        .iter()
        .map(|key| table.require(key))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<Vec<Value>, Vec<usize>> = BTreeMap::new();
    for row in 0..table.n_rows() {
        let key: Vec<Value> = key_columns.iter().map(|c| c[row].clone()).collect();
        if key.iter().any(Value::is_null) {
            continue;
        }
        groups.entry(key).or_default().push(row);
    }

    let value_columns: Vec<(&str, &[Value])> = table
        .iter_columns()
        .filter(|(name, _)| !plan.keys.iter().any(|k| k == name))
        .collect();

    let n_keys = plan.keys.len();
    let mut out: Vec<Vec<Value>> =
        vec![Vec::with_capacity(groups.len()); n_keys + value_columns.len()];
    for (key, rows) in &groups {
        for (slot, value) in out.iter_mut().zip(key) {
            slot.push(value.clone());
        }
        for (slot, (name, values)) in out[n_keys..].iter_mut().zip(&value_columns) {
            slot.push(reduce_group(name, values, rows, plan.reduction(name))?);
        }
    }

    let names = plan
        .keys
        .iter()
        .cloned()
        .chain(value_columns.iter().map(|(name, _)| (*name).to_string()));
    let grouped = Table::from_columns(names.zip(out))?;
    debug!("grouped {} rows into {} groups", table.n_rows(), grouped.n_rows());
    Ok(grouped)
}

/// Groups by `keys`, collecting `list_columns` and taking the first value of
/// every other column, after dropping `drop_columns`.
///
/// # Errors
/// See [`group`].
pub fn group_hits(
    table: &Table,
    keys: &[&str],
    list_columns: &[&str],
    drop_columns: &[&str],
) -> Result<Table> {
    let plan = AggregationPlan::new(keys.iter().copied())
        .collect(list_columns.iter().copied())
        .drop_columns(drop_columns.iter().copied());
    group(table, &plan)
}

fn reduce_group(
    column: &str,
    values: &[Value],
    rows: &[usize],
    reduction: Reduction,
) -> Result<Value> {
    let first = values[rows[0]].clone();
    match reduction {
        Reduction::Collect => Ok(Value::List(
            rows.iter().map(|&row| values[row].clone()).collect(),
        )),
        Reduction::TakeFirst => Ok(first),
        Reduction::FirstConsistent => {
            match rows.iter().find(|&&row| values[row] != first) {
                Some(&row) => Err(Error::InconsistentGroup {
                    column: column.to_string(),
                    row,
                }),
                None => Ok(first),
            }
        }
    }
}
