//! Run configuration.
//!
//! A `RunConfig` is loaded once (or defaulted) and passed by reference to
//! every stage of a run; it replaces process-wide settings.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tbcalo_algorithms::AnalysisParams;
use tbcalo_core::config::{ColumnNames, FlattenConfig, NoisyChannels};
use tbcalo_core::geometry::SensorGeometry;

use crate::{Error, Result};

/// Extension of raw event files (one JSON object per line).
pub const EVENTS_EXT: &str = ".jsonl";
/// Extension of raw event files stored as one JSON array.
pub const EVENTS_ARRAY_EXT: &str = ".json";
/// Extension of flattened hit caches.
pub const HITS_CACHE_EXT: &str = ".h5";

/// Input extensions understood by the loaders.
pub const ALLOWED_INPUT_EXTENSIONS: [&str; 3] = [EVENTS_EXT, EVENTS_ARRAY_EXT, HITS_CACHE_EXT];

/// Settings of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Root directory of all outputs.
    pub results_dir: PathBuf,
    /// Input file pattern; the trailing `*` stands for the run number.
    pub input_pattern: String,
    /// Layers to analyse.
    pub layers: Vec<i64>,
    /// Display names of the layers, in `layers` order. Indices are used when absent.
    pub layer_names: Option<Vec<String>>,
    /// Channels that get amplitude histograms.
    pub channels: Vec<i64>,
    /// Noisy channels per layer, excluded from energy sums.
    pub noisy_channels: BTreeMap<i64, Vec<i64>>,
    /// Column names of the event and hit tables.
    pub columns: ColumnNames,
    /// Event columns dropped before flattening.
    pub drop_columns: Vec<String>,
    /// Number of bins of every histogram.
    pub histogram_bins: usize,
    /// Pad rows of a sensor plane.
    pub sensor_rows: usize,
    /// Pad columns of a sensor plane.
    pub sensor_cols: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("./Plots"),
            input_pattern: "../TB_FIRE_*".to_string(),
            layers: (0..10).collect(),
            layer_names: None,
            channels: (0..256).collect(),
            noisy_channels: BTreeMap::new(),
            columns: ColumnNames::default(),
            drop_columns: vec!["toa".to_string()],
            histogram_bins: 100,
            sensor_rows: tbcalo_core::SENSOR_ROWS,
            sensor_cols: tbcalo_core::SENSOR_COLS,
        }
    }
}

impl RunConfig {
    /// Loads a configuration from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.geometry()?;
        if let Some(names) = &self.layer_names {
            if names.len() != self.layers.len() {
                return Err(tbcalo_core::Error::ConfigError(format!(
                    "{} layer names given for {} layers",
                    names.len(),
                    self.layers.len()
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Path of the input file of `run` with extension `ext`.
    #[must_use]
    pub fn input_path(&self, run: u32, ext: &str) -> PathBuf {
        let stem = self
            .input_pattern
            .strip_suffix('*')
            .unwrap_or(&self.input_pattern);
        PathBuf::from(format!("{stem}{run}{ext}"))
    }

    /// Glob pattern matching every input file with extension `ext`.
    #[must_use]
    pub fn input_glob(&self, ext: &str) -> String {
        format!("{}{ext}", self.input_pattern)
    }

    /// Output directory of `run`.
    #[must_use]
    pub fn run_results_dir(&self, run: u32) -> PathBuf {
        self.results_dir.join(format!("Run {run}"))
    }

    /// Display name of `layer`.
    #[must_use]
    pub fn layer_name(&self, layer: i64) -> String {
        self.layer_names
            .as_ref()
            .and_then(|names| {
                let index = self.layers.iter().position(|&l| l == layer)?;
                names.get(index).cloned()
            })
            .unwrap_or_else(|| layer.to_string())
    }

    /// Noisy channel set built from `noisy_channels`.
    #[must_use]
    pub fn noisy(&self) -> NoisyChannels {
        NoisyChannels::from_planes(
            self.noisy_channels
                .iter()
                .map(|(&layer, channels)| (layer, channels.iter().copied())),
        )
    }

    /// Flattening settings of this run.
    #[must_use]
    pub fn flatten_config(&self) -> FlattenConfig {
        FlattenConfig::new()
            .with_columns(self.columns.clone())
            .with_noisy(self.noisy())
            .with_drop_columns(self.drop_columns.clone())
    }

    /// Sensor geometry of this run.
    ///
    /// # Errors
    /// Returns an error if a sensor dimension is zero.
    pub fn geometry(&self) -> Result<SensorGeometry> {
        Ok(SensorGeometry::new(self.sensor_rows, self.sensor_cols)?)
    }

    /// Analysis parameters of this run.
    ///
    /// # Errors
    /// Returns an error if a sensor dimension is zero.
    pub fn analysis_params(&self) -> Result<AnalysisParams> {
        Ok(AnalysisParams::default()
            .with_layers(self.layers.clone())
            .with_channels(self.channels.clone())
            .with_histogram_bins(self.histogram_bins)
            .with_geometry(self.geometry()?)
            .with_columns(self.columns.clone()))
    }
}

/// Checks that `ext` is a supported input extension.
///
/// # Errors
/// Returns [`Error::UnsupportedExtension`] otherwise.
pub fn check_extension(ext: &str) -> Result<()> {
    if ALLOWED_INPUT_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    {
        Ok(())
    } else {
        Err(Error::UnsupportedExtension {
            found: ext.to_string(),
            expected: ALLOWED_INPUT_EXTENSIONS.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.layers.len(), 10);
        assert_eq!(config.channels.len(), 256);
        assert_eq!(config.histogram_bins, 100);
        assert_eq!(config.drop_columns, vec!["toa".to_string()]);
        assert!(config.noisy().is_empty());
        assert_eq!(config.geometry().unwrap(), SensorGeometry::default());
    }

    #[test]
    fn test_derived_paths() {
        let config = RunConfig::default();
        assert_eq!(
            config.input_path(1234, ".jsonl"),
            PathBuf::from("../TB_FIRE_1234.jsonl")
        );
        assert_eq!(config.input_glob(".h5"), "../TB_FIRE_*.h5");
        assert_eq!(
            config.run_results_dir(7),
            PathBuf::from("./Plots").join("Run 7")
        );
    }

    #[test]
    fn test_partial_json_and_noisy_channels() {
        let json = r#"{
            "results_dir": "out",
            "layers": [0, 1],
            "layer_names": ["front", "back"],
            "noisy_channels": {"1": [5, 6]},
            "histogram_bins": 20
        }"#;
        let config = RunConfig::from_json(json).unwrap();

        assert_eq!(config.results_dir, PathBuf::from("out"));
        assert_eq!(config.histogram_bins, 20);
        assert_eq!(config.channels.len(), 256);
        assert_eq!(config.layer_name(1), "back");
        assert_eq!(config.layer_name(4), "4");

        let noisy = config.noisy();
        assert!(noisy.contains(1, 5) && noisy.contains(1, 6));
        assert!(!noisy.contains(0, 5));
        assert_eq!(config.flatten_config().noisy, noisy);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(RunConfig::from_json(r#"{"sensor_rows": 0}"#).is_err());
        assert!(RunConfig::from_json(r#"{"layers": [0], "layer_names": ["a", "b"]}"#).is_err());
        assert!(RunConfig::from_json("{").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"input_pattern": "data/run_*"}}"#).unwrap();
        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.input_path(3, ".json"),
            PathBuf::from("data/run_3.json")
        );
    }

    #[test]
    fn test_check_extension() {
        assert!(check_extension(".jsonl").is_ok());
        assert!(check_extension(".H5").is_ok());
        assert!(matches!(
            check_extension(".root"),
            Err(Error::UnsupportedExtension { .. })
        ));
    }
}
