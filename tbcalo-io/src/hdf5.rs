//! HDF5 cache for flattened hit tables and occupancy grids.

use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use log::{debug, warn};
use ndarray::{s, Array2, ArrayView1};
use std::path::Path;
use std::str::FromStr;
use tbcalo_core::table::{Table, Value};

const FORMAT_VERSION: &str = "0.1";
const HITS_GROUP: &str = "hits";
const OCCUPANCY_GROUP: &str = "occupancy";
const KIND_ATTR: &str = "kind";
const KIND_INT: &str = "int";
const KIND_FLOAT: &str = "float";

/// Hit cache write configuration.
#[derive(Clone, Debug)]
pub struct HitCacheOptions {
    /// Rows per chunk (and per append).
    pub chunk_rows: usize,
    /// Deflate level, `None` for no compression.
    pub compression: Option<u8>,
    /// Enable the shuffle filter.
    pub shuffle: bool,
}

impl Default for HitCacheOptions {
    fn default() -> Self {
        Self {
            chunk_rows: 100_000,
            compression: Some(1),
            shuffle: true,
        }
    }
}

enum NumericColumn {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

/// Writes a flattened hit table to an HDF5 file.
///
/// Columns of integers are stored as `i64`; columns holding any float or
/// `Null` are stored as `f64` with `Null` as NaN. List columns cannot be
/// stored and are skipped with a warning. Column order is kept in the
/// `columns` attribute of the `hits` group.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_hits_hdf5<P: AsRef<Path>>(
    path: P,
    table: &Table,
    options: &HitCacheOptions,
) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str_file(&file, "tbcalo_format_version", FORMAT_VERSION)?;

    let hits = file.create_group(HITS_GROUP)?;
    hits.new_attr::<u64>()
        .create("n_rows")?
        .write_scalar(&(table.n_rows() as u64))?;

    let mut stored = Vec::new();
    for (name, values) in table.iter_columns() {
        let Some(column) = numeric_column(values) else {
            warn!("column {name} holds lists and is not cached");
            continue;
        };
        match column {
            NumericColumn::Int(data) => {
                let dataset = create_extendable_dataset::<i64>(&hits, name, options)?;
                set_dataset_kind(&dataset, KIND_INT)?;
                append_chunks(&dataset, &data, options.chunk_rows)?;
            }
            NumericColumn::Float(data) => {
                let dataset = create_extendable_dataset::<f64>(&hits, name, options)?;
                set_dataset_kind(&dataset, KIND_FLOAT)?;
                append_chunks(&dataset, &data, options.chunk_rows)?;
            }
        }
        stored.push(name);
    }
    set_columns_attr(&hits, &stored)?;

    debug!(
        "cached {} rows in {} of {} columns",
        table.n_rows(),
        stored.len(),
        table.n_columns()
    );
    Ok(())
}

/// Reads a hit table written by [`write_hits_hdf5`].
///
/// # Errors
/// Returns an error if HDF5 I/O fails or the file layout is not recognised.
pub fn read_hits_hdf5<P: AsRef<Path>>(path: P) -> Result<Table> {
    let file = File::open(path)?;
    let hits = file.group(HITS_GROUP)?;
    let names = read_columns_attr(&hits)?;

    let mut table = Table::new();
    for name in names {
        let dataset = hits.dataset(&name)?;
        let kind: VarLenUnicode = dataset.attr(KIND_ATTR)?.read_scalar()?;
        let values: Vec<Value> = match kind.as_str() {
            KIND_INT => read_dataset_vec::<i64>(&hits, &name)?
                .into_iter()
                .map(Value::Int)
                .collect(),
            KIND_FLOAT => read_dataset_vec::<f64>(&hits, &name)?
                .into_iter()
                .map(|v| if v.is_nan() { Value::Null } else { Value::Float(v) })
                .collect(),
            other => {
                return Err(Error::InvalidFormat(format!(
                    "column {name} has unknown kind {other:?}"
                )))
            }
        };
        table.push_column(name, values)?;
    }
    Ok(table)
}

/// Writes occupancy grids as 2D `u64` datasets under the `occupancy` group.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_grids_hdf5<P: AsRef<Path>>(
    path: P,
    grids: &[(String, Array2<u64>)],
    compression: Option<u8>,
) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str_file(&file, "tbcalo_format_version", FORMAT_VERSION)?;
    let group = file.create_group(OCCUPANCY_GROUP)?;
    set_attr_str_group(&group, "origin", "top-left")?;

    for (name, grid) in grids {
        let mut builder = group.new_dataset::<u64>().shape(grid.dim());
        if let Some(level) = compression {
            builder = builder.deflate(level);
        }
        let dataset = builder.create(name.as_str())?;
        dataset.write(grid.view())?;
    }
    Ok(())
}

/// Reads one occupancy grid written by [`write_grids_hdf5`].
///
/// # Errors
/// Returns an error if HDF5 I/O fails or the dataset is not 2-D.
pub fn read_grid_hdf5<P: AsRef<Path>>(path: P, name: &str) -> Result<Array2<u64>> {
    let file = File::open(path)?;
    let dataset = file.group(OCCUPANCY_GROUP)?.dataset(name)?;
    if dataset.shape().len() != 2 {
        return Err(Error::InvalidFormat(format!(
            "occupancy dataset {name} must be 2-D"
        )));
    }
    Ok(dataset.read_2d::<u64>()?)
}

fn numeric_column(values: &[Value]) -> Option<NumericColumn> {
    if values.iter().any(|v| matches!(v, Value::List(_))) {
        return None;
    }
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        return Some(NumericColumn::Int(
            values.iter().filter_map(Value::as_i64).collect(),
        ));
    }
    Some(NumericColumn::Float(
        values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect(),
    ))
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    options: &HitCacheOptions,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((options.chunk_rows.max(1),));

    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }

    if options.shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn append_chunks<T: H5Type>(dataset: &Dataset, data: &[T], chunk_rows: usize) -> Result<()> {
    for (index, chunk) in data.chunks(chunk_rows.max(1)).enumerate() {
        append_slice(dataset, index * chunk_rows.max(1), chunk)?;
    }
    Ok(())
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn set_dataset_kind(dataset: &Dataset, kind: &str) -> Result<()> {
    let value = to_var_len_unicode(kind)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create(KIND_ATTR)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_columns_attr(group: &Group, names: &[&str]) -> Result<()> {
    let values: Vec<VarLenUnicode> = names
        .iter()
        .map(|name| to_var_len_unicode(name))
        .collect::<Result<Vec<_>>>()?;
    let attr = group
        .new_attr::<VarLenUnicode>()
        .shape((values.len(),))
        .create("columns")?;
    attr.write(ArrayView1::from(values.as_slice()))?;
    Ok(())
}

fn read_columns_attr(group: &Group) -> Result<Vec<String>> {
    let values: Vec<VarLenUnicode> = group.attr("columns")?.read_raw()?;
    Ok(values.iter().map(ToString::to_string).collect())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hit_cache_roundtrip() {
        let table = Table::from_columns([
            ("TLU_number", vec![Value::Int(1), Value::Int(1), Value::Int(2)]),
            (
                "amplitude",
                vec![Value::Float(0.5), Value::Int(2), Value::Float(1.5)],
            ),
            ("showerEnergy", vec![Value::Float(2.5), Value::Float(2.5), Value::Null]),
            (
                "toa",
                vec![
                    Value::from(vec![1_i64]),
                    Value::from(vec![2_i64]),
                    Value::from(vec![3_i64]),
                ],
            ),
        ])
        .unwrap();

        let file = NamedTempFile::new().unwrap();
        let options = HitCacheOptions {
            chunk_rows: 2,
            ..HitCacheOptions::default()
        };
        write_hits_hdf5(file.path(), &table, &options).unwrap();
        let back = read_hits_hdf5(file.path()).unwrap();

        assert_eq!(back.names(), &["TLU_number", "amplitude", "showerEnergy"]);
        assert_eq!(back.column("TLU_number"), table.column("TLU_number"));
        assert_eq!(
            back.column("amplitude").unwrap(),
            &[Value::Float(0.5), Value::Float(2.0), Value::Float(1.5)]
        );
        assert!(back.column("showerEnergy").unwrap()[2].is_null());
    }

    #[test]
    fn test_grid_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let grid = array![[0_u64, 1, 2], [3, 4, 5]];
        write_grids_hdf5(file.path(), &[("layer_0".to_string(), grid.clone())], Some(1)).unwrap();
        let back = read_grid_hdf5(file.path(), "layer_0").unwrap();
        assert_eq!(back, grid);
    }
}
