//! Memory-mapped event file readers.
//!

use crate::{Error, Result};
use log::{debug, info};
use memmap2::Mmap;
use rayon::prelude::*;
use serde_json::Map;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tbcalo_core::config::ColumnNames;
use tbcalo_core::table::{Table, Value};

type Record = Map<String, serde_json::Value>;

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without copying the whole file
/// into memory first.
pub struct MappedFileReader {
    mmap: Option<Arc<Mmap>>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // Zero-length files cannot be mapped on every platform.
        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
            // This is the standard safety contract for memory mapping.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file)? };
            Some(Arc::new(mmap))
        };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Returns the path the reader was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reader for raw event files.
///
/// Two layouts are accepted: JSON lines (one object per event) and a single
/// JSON array of objects. Each object maps column names to scalars or hit
/// lists. The column order is taken from the first record; keys missing from
/// a later record read as `Null`, unknown keys are an error.
pub struct EventFileReader {
    reader: MappedFileReader,
}

impl EventFileReader {
    /// Opens an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: MappedFileReader::open(path)?,
        })
    }

    /// Returns the underlying mapped file.
    #[must_use]
    pub fn inner(&self) -> &MappedFileReader {
        &self.reader
    }

    /// Reads the whole file into an event table.
    ///
    /// # Errors
    /// Returns an error if the file is not UTF-8, a record is not a JSON
    /// object, a cell is not a number, null or list, or a record has a
    /// column the first record does not.
    pub fn read_table(&self) -> Result<Table> {
        let text = std::str::from_utf8(self.reader.as_bytes()).map_err(|e| {
            Error::InvalidFormat(format!("{}: not UTF-8: {e}", self.reader.path().display()))
        })?;

        let records = if text.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<Record>>(text).map_err(|source| Error::Record {
                path: self.reader.path().to_path_buf(),
                record: 0,
                source,
            })?
        } else {
            self.parse_lines(text)?
        };

        let table = records_to_table(records, self.reader.path())?;
        info!(
            "loaded {} events with {} columns from {}",
            table.n_rows(),
            table.n_columns(),
            self.reader.path().display()
        );
        Ok(table)
    }

    fn parse_lines(&self, text: &str) -> Result<Vec<Record>> {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        debug!("parsing {} event records", lines.len());
        lines
            .par_iter()
            .enumerate()
            .map(|(record, line)| {
                serde_json::from_str::<Record>(line).map_err(|source| Error::Record {
                    path: self.reader.path().to_path_buf(),
                    record,
                    source,
                })
            })
            .collect()
    }
}

/// Reads an event file into a table.
///
/// # Errors
/// See [`EventFileReader::read_table`].
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Table> {
    EventFileReader::open(path)?.read_table()
}

/// Reads the event file of a run.
///
/// A file without records loads as an empty table holding the event id and
/// hit columns of `columns`, so it flattens to an empty hit table.
///
/// # Errors
/// See [`EventFileReader::read_table`].
pub fn read_run_events<P: AsRef<Path>>(path: P, columns: &ColumnNames) -> Result<Table> {
    let table = read_events(&path)?;
    if table.n_columns() > 0 {
        return Ok(table);
    }
    debug!("{} holds no events", path.as_ref().display());
    let [plane, channel, amplitude] = columns.hit_columns();
    Ok(Table::with_names([
        columns.event_id.as_str(),
        plane,
        channel,
        amplitude,
    ])?)
}

fn records_to_table(records: Vec<Record>, path: &Path) -> Result<Table> {
    let Some(first) = records.first() else {
        return Ok(Table::new());
    };
    let names: Vec<String> = first.keys().cloned().collect();
    let mut table = Table::with_names(names.iter().cloned())?;

    for (index, mut record) in records.into_iter().enumerate() {
        if let Some(unknown) = record.keys().find(|key| !names.contains(key)) {
            return Err(Error::InvalidFormat(format!(
                "{}: record {index} has unknown column {unknown:?}",
                path.display()
            )));
        }
        let row = names
            .iter()
            .map(|name| match record.remove(name) {
                Some(json) => serde_json::from_value::<Value>(json).map_err(|source| {
                    Error::Record {
                        path: path.to_path_buf(),
                        record: index,
                        source,
                    }
                }),
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?;
        table.push_row(row)?;
    }
    Ok(table)
}
