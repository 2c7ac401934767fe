//! Analysis products computed from a flattened hit table.
//!
//! Per-event and per-layer quantities are read from the broadcast energy
//! columns after removing the duplicates flattening introduced, so every
//! event (or event and plane) contributes exactly once.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tbcalo_core::config::ColumnNames;
use tbcalo_core::error::{Error, Result};
use tbcalo_core::table::{Table, Value};

use crate::select::{dedup, filter_column, select, HitSelection, Selection};

/// Entries, mean and population standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SummaryStats {
    /// Sample size.
    pub entries: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Standard deviation with `ddof = 0`.
    pub std: f64,
}

impl SummaryStats {
    /// Computes the statistics of `values`. Returns `None` for an empty sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            entries: values.len(),
            mean,
            std: variance.sqrt(),
        })
    }

    /// Standard error of the mean, `std / sqrt(entries)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sem(&self) -> f64 {
        self.std / (self.entries as f64).sqrt()
    }
}

/// Fixed-width 1D histogram over the sample range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram {
    /// Bin edges, `counts.len() + 1` values.
    pub edges: Vec<f64>,
    /// Entries per bin.
    pub counts: Vec<u64>,
    /// Statistics of the binned sample.
    pub stats: SummaryStats,
}

impl Histogram {
    /// Bins `values` into `bins` equal bins spanning `[min, max]`.
    ///
    /// The last bin is closed on the right. A constant sample is spread over
    /// `[v - 0.5, v + 0.5]`. Non-finite values are ignored; `None` is
    /// returned when nothing is left to bin or `bins` is zero.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp
    )]
    pub fn from_values(values: &[f64], bins: usize) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if bins == 0 {
            return None;
        }
        let stats = SummaryStats::from_values(&finite)?;

        let (mut lo, mut hi) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0u64; bins];
        for v in &finite {
            let bin = (((v - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }

        Some(Self {
            edges,
            counts,
            stats,
        })
    }

    /// Number of bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }
}

/// Mean layer energy with its standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerProfile {
    /// Layer index.
    pub layer: i64,
    /// Number of events with energy in the layer.
    pub entries: usize,
    /// Mean layer energy, `None` when the layer has no entries.
    pub mean: Option<f64>,
    /// Standard error of the mean.
    pub sem: Option<f64>,
}

/// Shower energy of every event, one value per event.
///
/// Events whose shower energy is `Null` (all hits noisy) are skipped.
///
/// # Errors
/// Returns an error if the event id or shower energy column is missing.
pub fn shower_energies(hits: &Table, columns: &ColumnNames) -> Result<Vec<f64>> {
    let showers = hits.select_columns(&[
        columns.event_id.as_str(),
        columns.shower_energy.as_str(),
    ])?;
    let showers = dedup(&showers);
    numeric_values(&showers, &columns.shower_energy)
}

/// Distinct (event, plane, plane energy) rows of a flattened table.
///
/// # Errors
/// Returns an error if one of the three columns is missing.
pub fn plane_energies(hits: &Table, columns: &ColumnNames) -> Result<Table> {
    let planes = hits.select_columns(&[
        columns.event_id.as_str(),
        columns.plane.as_str(),
        columns.plane_energy.as_str(),
    ])?;
    Ok(dedup(&planes))
}

/// Energy deposited in `layer`, one value per event that hit it.
///
/// # Errors
/// Returns an error if a required column is missing.
pub fn layer_energies(hits: &Table, layer: i64, columns: &ColumnNames) -> Result<Vec<f64>> {
    let planes = plane_energies(hits, columns)?;
    let selection = Selection::One(Value::Int(layer));
    let layer_rows = filter_column(&planes, &columns.plane, Some(&selection))?;
    numeric_values(&layer_rows, &columns.plane_energy)
}

/// Amplitudes of every hit on one channel of one layer, noisy hits included.
///
/// # Errors
/// Returns an error if a required column is missing.
pub fn channel_amplitudes(
    hits: &Table,
    layer: i64,
    channel: i64,
    columns: &ColumnNames,
) -> Result<Vec<f64>> {
    let selection = HitSelection::new().planes(layer).channels(channel);
    let channel_hits = select(hits, &selection, columns)?;
    numeric_values(&channel_hits, &columns.amplitude)
}

/// Mean energy per layer with the standard error of the mean.
///
/// # Errors
/// Returns an error if a required column is missing.
pub fn longitudinal_profile(
    hits: &Table,
    layers: &[i64],
    columns: &ColumnNames,
) -> Result<Vec<LayerProfile>> {
    let planes = plane_energies(hits, columns)?;
    layers
        .iter()
        .map(|&layer| {
            let selection = Selection::One(Value::Int(layer));
            let rows = filter_column(&planes, &columns.plane, Some(&selection))?;
            let energies = numeric_values(&rows, &columns.plane_energy)?;
            let stats = SummaryStats::from_values(&energies);
            Ok(LayerProfile {
                layer,
                entries: energies.len(),
                mean: stats.map(|s| s.mean),
                sem: stats.map(|s| s.sem()),
            })
        })
        .collect()
}

/// Numeric cells of `column`, skipping `Null`s.
fn numeric_values(table: &Table, column: &str) -> Result<Vec<f64>> {
    table
        .require(column)?
        .iter()
        .enumerate()
        .filter(|(_, value)| !value.is_null())
        .map(|(row, value)| {
            value.as_f64().ok_or_else(|| Error::TypeMismatch {
                column: column.to_string(),
                row,
                expected: "number",
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten_events;
    use approx::assert_relative_eq;
    use tbcalo_core::config::{FlattenConfig, NoisyChannels};
    use tbcalo_core::event::{events_to_table, EventRecord};

    fn flat(config: &FlattenConfig) -> Table {
        let records = vec![
            EventRecord::new(1, vec![0, 0, 1], vec![3, 4, 3], vec![1.0, 2.0, 4.0]),
            EventRecord::new(2, vec![0, 1], vec![3, 3], vec![5.0, 6.0]),
            EventRecord::new(3, vec![1], vec![7], vec![2.0]),
        ];
        let events = events_to_table(&records, &config.columns).unwrap();
        flatten_events(&events, config).unwrap()
    }

    #[test]
    fn test_summary_stats() {
        let stats = SummaryStats::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.entries, 4);
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.std, 1.25_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(stats.sem(), 1.25_f64.sqrt() / 2.0, epsilon = 1e-12);
        assert!(SummaryStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_histogram_binning() {
        let hist = Histogram::from_values(&[0.0, 1.0, 2.0, 3.0, 4.0], 4).unwrap();
        assert_eq!(hist.n_bins(), 4);
        assert_eq!(hist.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist.counts, vec![1, 1, 1, 2]);
        assert_eq!(hist.stats.entries, 5);
    }

    #[test]
    fn test_histogram_degenerate_inputs() {
        let constant = Histogram::from_values(&[2.0, 2.0], 2).unwrap();
        assert_eq!(constant.edges, vec![1.5, 2.0, 2.5]);
        assert_eq!(constant.counts, vec![0, 2]);

        assert!(Histogram::from_values(&[], 10).is_none());
        assert!(Histogram::from_values(&[1.0], 0).is_none());
        assert!(Histogram::from_values(&[f64::NAN], 10).is_none());
    }

    #[test]
    fn test_shower_and_layer_energies() {
        let hits = flat(&FlattenConfig::default());
        let columns = ColumnNames::default();

        assert_eq!(shower_energies(&hits, &columns).unwrap(), vec![7.0, 11.0, 2.0]);
        assert_eq!(layer_energies(&hits, 0, &columns).unwrap(), vec![3.0, 5.0]);
        assert_eq!(layer_energies(&hits, 1, &columns).unwrap(), vec![4.0, 6.0, 2.0]);
        assert!(layer_energies(&hits, 9, &columns).unwrap().is_empty());
        assert_eq!(plane_energies(&hits, &columns).unwrap().n_rows(), 5);
    }

    #[test]
    fn test_channel_amplitudes_include_noisy_hits() {
        let config =
            FlattenConfig::new().with_noisy(NoisyChannels::from_planes([(0, vec![3])]));
        let hits = flat(&config);
        let columns = ColumnNames::default();

        assert_eq!(
            channel_amplitudes(&hits, 0, 3, &columns).unwrap(),
            vec![1.0, 5.0]
        );
        assert_eq!(shower_energies(&hits, &columns).unwrap(), vec![6.0, 6.0, 2.0]);
    }

    #[test]
    fn test_longitudinal_profile() {
        let hits = flat(&FlattenConfig::default());
        let profile = longitudinal_profile(&hits, &[0, 1, 2], &ColumnNames::default()).unwrap();

        assert_eq!(profile.len(), 3);
        assert_eq!(profile[0].entries, 2);
        assert_relative_eq!(profile[0].mean.unwrap(), 4.0);
        assert_relative_eq!(profile[0].sem.unwrap(), 1.0 / 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(profile[1].mean.unwrap(), 4.0);
        assert_eq!(profile[2].entries, 0);
        assert!(profile[2].mean.is_none());
    }
}
