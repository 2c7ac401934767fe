//! Columnar table types.
//!
//! A [`Table`] stores named columns of equal length (column-major layout).
//! Cells are dynamically typed [`Value`]s so that event tables with jagged
//! per-event hit lists and flattened per-hit tables share one representation.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single table cell.
///
/// Floats compare and hash by bit pattern, which gives `Value` a total order
/// and lets it serve as a grouping or deduplication key.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    /// Integer value (identifiers, plane and channel indices).
    Int(i64),
    /// Real value (amplitudes, energies).
    Float(f64),
    /// Variable-length sequence (per-event hit lists, collected groups).
    List(Vec<Value>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer payload.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the list payload.
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::List(_) => 2,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

impl Ord for Value {
    #[allow(clippy::cast_precision_loss)]
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Mixed numerics order by magnitude, ints first on ties.
            (Value::Int(a), Value::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (Value::Float(a), Value::Int(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (Value::List(a), Value::List(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// A table of named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Table {
    /// Creates a table without columns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with the given column names and no rows.
    ///
    /// # Errors
    /// Returns an error if a name appears twice.
    pub fn with_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for name in names {
            table.push_column(name, Vec::new())?;
        }
        Ok(table)
    }

    /// Builds a table from `(name, values)` pairs.
    ///
    /// # Errors
    /// Returns an error if names repeat or column lengths differ.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Appends a column.
    ///
    /// # Errors
    /// Returns an error if the name already exists or the length does not
    /// match the current row count.
    pub fn push_column<S: Into<String>>(&mut self, name: S, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(Error::DuplicateColumn(name));
        }
        if !self.columns.is_empty() && values.len() != self.n_rows() {
            return Err(Error::ColumnLength {
                column: name,
                expected: self.n_rows(),
                found: values.len(),
            });
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Appends a row holding one value per column, in column order.
    ///
    /// # Errors
    /// Returns an error if the row width does not match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
        Ok(())
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns true if the column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    /// Returns a column by name, failing if it is absent.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] if the column does not exist.
    pub fn require(&self, name: &str) -> Result<&[Value]> {
        self.column(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Returns a column by position.
    #[must_use]
    pub fn column_at(&self, index: usize) -> &[Value] {
        &self.columns[index]
    }

    /// Returns a copy of row `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c[index].clone()).collect()
    }

    /// Returns a table with the same columns and no rows.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            names: self.names.clone(),
            columns: vec![Vec::new(); self.names.len()],
        }
    }

    /// Returns the given rows in the given order, re-indexed from zero.
    #[must_use]
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| indices.iter().map(|&i| c[i].clone()).collect())
            .collect();
        Self {
            names: self.names.clone(),
            columns,
        }
    }

    /// Returns the named columns, in the order given.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] if a name does not exist.
    pub fn select_columns(&self, names: &[&str]) -> Result<Self> {
        let mut out = Self::new();
        for name in names {
            out.push_column(*name, self.require(name)?.to_vec())?;
        }
        Ok(out)
    }

    /// Returns the table without the named columns. Absent names are ignored.
    #[must_use]
    pub fn without_columns(&self, names: &[&str]) -> Self {
        let (names, columns) = self
            .names
            .iter()
            .zip(&self.columns)
            .filter(|(name, _)| !names.contains(&name.as_str()))
            .map(|(name, column)| (name.clone(), column.clone()))
            .unzip();
        Self { names, columns }
    }

    /// Iterates over `(name, values)` pairs.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample() -> Table {
        Table::from_columns([
            ("id", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            (
                "amp",
                vec![Value::Float(0.5), Value::Null, Value::Float(2.0)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_operations() {
        let mut table = sample();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.n_columns(), 2);

        table.push_row(vec![Value::Int(4), Value::Float(1.0)]).unwrap();
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.row(3), vec![Value::Int(4), Value::Float(1.0)]);

        let taken = table.take_rows(&[3, 0]);
        assert_eq!(taken.column("id").unwrap(), &[Value::Int(4), Value::Int(1)]);
    }

    #[test]
    fn test_column_validation() {
        let mut table = sample();
        assert!(matches!(
            table.push_column("id", vec![Value::Null; 3]),
            Err(Error::DuplicateColumn(_))
        ));
        assert!(matches!(
            table.push_column("short", vec![Value::Null]),
            Err(Error::ColumnLength { .. })
        ));
        assert!(matches!(
            table.push_row(vec![Value::Null]),
            Err(Error::RowWidth { .. })
        ));
        assert!(matches!(
            table.require("missing"),
            Err(Error::MissingColumn(_))
        ));
    }

    #[test]
    fn test_projection_and_drop() {
        let table = sample();
        let projected = table.select_columns(&["amp", "id"]).unwrap();
        assert_eq!(projected.names(), &["amp".to_string(), "id".to_string()]);

        let dropped = table.without_columns(&["amp", "not_there"]);
        assert_eq!(dropped.names(), &["id".to_string()]);
        assert_eq!(dropped.n_rows(), 3);
    }

    #[test]
    fn test_value_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(Value::Float(1.5));
        set.insert(Value::Float(1.5));
        set.insert(Value::Int(1));
        set.insert(Value::List(vec![Value::Int(1), Value::Null]));
        set.insert(Value::List(vec![Value::Int(1), Value::Null]));
        assert_eq!(set.len(), 3);
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_value_ordering() {
        let mut values = vec![
            Value::Float(2.5),
            Value::Null,
            Value::Int(3),
            Value::Int(-1),
            Value::List(vec![]),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(-1),
                Value::Float(2.5),
                Value::Int(3),
                Value::List(vec![]),
            ]
        );
    }

    #[test]
    fn test_value_display() {
        let list = Value::from(vec![1i64, 2, 3]);
        assert_eq!(list.to_string(), "[1;2;3]");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
    }
}
