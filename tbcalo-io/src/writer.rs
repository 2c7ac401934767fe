//! File writers for tables and analysis products.

use crate::{Error, Result};
use ndarray::Array2;
use serde::Serialize;
use serde_json::Map;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tbcalo_algorithms::{Histogram, LayerProfile, RunAnalysis, SummaryStats};
use tbcalo_core::table::Table;

/// On-disk table layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Comma separated values with a header row; list cells as `[a;b;c]`.
    Csv,
    /// One JSON object per row.
    JsonLines,
}

impl TableFormat {
    /// Picks the format from a file extension (`.csv` or `.jsonl`/`.json`).
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("json") => {
                Ok(Self::JsonLines)
            }
            _ => Err(Error::InvalidFormat(format!(
                "cannot infer table format of {}",
                path.display()
            ))),
        }
    }
}

/// Writer for tables and analysis products.
pub struct TableWriter {
    writer: BufWriter<File>,
}

impl TableWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes a table in the given format.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_table(&mut self, table: &Table, format: TableFormat) -> Result<()> {
        match format {
            TableFormat::Csv => self.write_csv(table),
            TableFormat::JsonLines => self.write_json_lines(table),
        }
    }

    /// Writes a table as CSV.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_csv(&mut self, table: &Table) -> Result<()> {
        let header: Vec<String> = table.names().iter().map(|n| csv_field(n)).collect();
        writeln!(self.writer, "{}", header.join(","))?;

        for row in 0..table.n_rows() {
            let cells: Vec<String> = table
                .row(row)
                .iter()
                .map(|v| csv_field(&v.to_string()))
                .collect();
            writeln!(self.writer, "{}", cells.join(","))?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes a table as JSON lines.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_json_lines(&mut self, table: &Table) -> Result<()> {
        for row in 0..table.n_rows() {
            let mut record = Map::new();
            for (name, value) in table.names().iter().zip(table.row(row)) {
                record.insert(name.clone(), serde_json::to_value(value)?);
            }
            serde_json::to_writer(&mut self.writer, &record)?;
            writeln!(self.writer)?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes an occupancy grid as CSV, one line per display row.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_grid_csv(&mut self, grid: &Array2<u64>) -> Result<()> {
        for row in grid.rows() {
            let cells: Vec<String> = row.iter().map(u64::to_string).collect();
            writeln!(self.writer, "{}", cells.join(","))?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes a histogram as CSV (`low,high,count`), preceded by comment
    /// lines holding its statistics.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_histogram_csv(&mut self, histogram: &Histogram) -> Result<()> {
        let stats = histogram.stats;
        writeln!(self.writer, "# entries={}", stats.entries)?;
        writeln!(self.writer, "# mean={:.3}", stats.mean)?;
        writeln!(self.writer, "# std={:.3}", stats.std)?;
        writeln!(self.writer, "low,high,count")?;

        for (edges, count) in histogram.edges.windows(2).zip(&histogram.counts) {
            writeln!(self.writer, "{},{},{}", edges[0], edges[1], count)?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes any serializable value as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, value)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes a table, picking the format from the file extension.
///
/// # Errors
/// Returns an error if the extension is unknown or writing fails.
pub fn write_table<P: AsRef<Path>>(path: P, table: &Table) -> Result<()> {
    let format = TableFormat::from_path(path.as_ref())?;
    TableWriter::create(path)?.write_table(table, format)
}

/// Per-layer part of a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    /// Layer index.
    pub layer: i64,
    /// Display name of the layer.
    pub name: String,
    /// Hits recorded in the layer.
    pub hits: u64,
    /// Layer energy statistics.
    pub energy: Option<SummaryStats>,
    /// Channels with at least one hit.
    pub active_channels: usize,
}

/// Headline numbers of an analysed run, written as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Run number.
    pub run: u32,
    /// Rows of the flattened hit table.
    pub hits: usize,
    /// Events with a shower energy.
    pub events: usize,
    /// Shower energy statistics.
    pub shower_energy: Option<SummaryStats>,
    /// Average longitudinal profile.
    pub profile: Vec<LayerProfile>,
    /// Per-layer numbers.
    pub layers: Vec<LayerSummary>,
}

impl RunSummary {
    /// Builds the summary of `analysis`; `layer_name` maps a layer to its display name.
    #[must_use]
    pub fn new<F>(run: u32, analysis: &RunAnalysis, layer_name: F) -> Self
    where
        F: Fn(i64) -> String,
    {
        let layers = analysis
            .layers
            .iter()
            .map(|layer| LayerSummary {
                layer: layer.layer,
                name: layer_name(layer.layer),
                hits: layer.occupancy.sum(),
                energy: layer.energy.as_ref().map(|h| h.stats),
                active_channels: layer.occupancy.iter().filter(|&&c| c > 0).count(),
            })
            .collect();
        Self {
            run,
            hits: analysis.n_hits,
            events: analysis.n_events,
            shower_energy: analysis.shower.as_ref().map(|h| h.stats),
            profile: analysis.profile.clone(),
            layers,
        }
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tbcalo_core::table::Value;
    use tempfile::{tempdir, NamedTempFile};

    fn table() -> Table {
        Table::from_columns([
            ("TLU_number", vec![Value::Int(1), Value::Int(2)]),
            (
                "planeID",
                vec![Value::from(vec![0_i64, 1]), Value::List(vec![])],
            ),
            ("showerEnergy", vec![Value::Float(1.5), Value::Null]),
        ])
        .unwrap()
    }

    #[test]
    fn test_write_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = TableWriter::create(file.path()).unwrap();
        writer.write_csv(&table()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["TLU_number,planeID,showerEnergy", "1,[0;1],1.5", "2,[],"]);
    }

    #[test]
    fn test_write_json_lines_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        write_table(&path, &table()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(r#"{"TLU_number":1,"planeID":[0,1],"showerEnergy":1.5}"#));

        let back = crate::reader::read_events(&path).unwrap();
        assert_eq!(back, table());
    }

    #[test]
    fn test_write_grid_and_histogram() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = TableWriter::create(file.path()).unwrap();
        writer.write_grid_csv(&array![[0_u64, 1], [2, 3]]).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "0,1\n2,3\n");

        let file = NamedTempFile::new().unwrap();
        let mut writer = TableWriter::create(file.path()).unwrap();
        let histogram = Histogram::from_values(&[0.0, 1.0, 2.0], 2).unwrap();
        writer.write_histogram_csv(&histogram).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("# entries=3"));
        assert!(content.contains("# mean=1.000"));
        assert!(content.contains("low,high,count\n0,1,1\n1,2,2\n"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            TableFormat::from_path(Path::new("a.CSV")).unwrap(),
            TableFormat::Csv
        );
        assert_eq!(
            TableFormat::from_path(Path::new("a.jsonl")).unwrap(),
            TableFormat::JsonLines
        );
        assert!(TableFormat::from_path(Path::new("a.parquet")).is_err());
        assert_eq!(csv_field("a,b"), "\"a,b\"");
    }
}
