//! Run-level analysis driver combining flattening output with the
//! per-layer analysis products.

use log::{debug, warn};
use ndarray::Array2;
use rayon::prelude::*;
use tbcalo_core::config::ColumnNames;
use tbcalo_core::error::Result;
use tbcalo_core::geometry::SensorGeometry;
use tbcalo_core::table::{Table, Value};

use crate::analysis::{
    channel_amplitudes, layer_energies, longitudinal_profile, shower_energies, Histogram,
    LayerProfile,
};
use crate::frequency::plane_occupancy;
use crate::select::{filter_column, Selection};

/// Parameters of a run analysis.
#[derive(Clone, Debug)]
pub struct AnalysisParams {
    /// Layers to analyse, in output order.
    pub layers: Vec<i64>,
    /// Channels for which amplitude histograms are built.
    pub channels: Vec<i64>,
    /// Number of bins of every histogram.
    pub histogram_bins: usize,
    /// Pad layout used for occupancy grids.
    pub geometry: SensorGeometry,
    /// Column names of the hit table.
    pub columns: ColumnNames,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            layers: (0..10).collect(),
            channels: (0..256).collect(),
            histogram_bins: 100,
            geometry: SensorGeometry::default(),
            columns: ColumnNames::default(),
        }
    }
}

impl AnalysisParams {
    /// Sets the analysed layers.
    #[must_use]
    pub fn with_layers(mut self, layers: Vec<i64>) -> Self {
        self.layers = layers;
        self
    }

    /// Sets the channels that get amplitude histograms.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<i64>) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the histogram bin count.
    #[must_use]
    pub fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins;
        self
    }

    /// Sets the sensor geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: SensorGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Sets the column names.
    #[must_use]
    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }
}

/// Amplitude histogram of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelHistogram {
    /// Channel index.
    pub channel: i64,
    /// Amplitude distribution.
    pub histogram: Histogram,
}

/// Products of one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerAnalysis {
    /// Layer index.
    pub layer: i64,
    /// Layer energy distribution; `None` if no event reached the layer.
    pub energy: Option<Histogram>,
    /// Hit occupancy in display order.
    pub occupancy: Array2<u64>,
    /// Channels without hits are left out.
    pub channels: Vec<ChannelHistogram>,
}

/// All products of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunAnalysis {
    /// Rows of the flattened table.
    pub n_hits: usize,
    /// Events with a shower energy.
    pub n_events: usize,
    /// Shower energy distribution; `None` if no event has a shower energy.
    pub shower: Option<Histogram>,
    /// Average longitudinal profile.
    pub profile: Vec<LayerProfile>,
    /// One entry per requested layer, in request order.
    pub layers: Vec<LayerAnalysis>,
}

/// Computes every analysis product of a flattened run.
///
/// Layers are processed in parallel and collected in the requested order.
///
/// # Errors
/// Returns an error if a required column is missing, holds the wrong type,
/// or a channel is outside the sensor.
pub fn analyze_run(hits: &Table, params: &AnalysisParams) -> Result<RunAnalysis> {
    let columns = &params.columns;
    let showers = shower_energies(hits, columns)?;
    let shower = Histogram::from_values(&showers, params.histogram_bins);
    if shower.is_none() {
        warn!("run has no shower energies to histogram");
    }
    let profile = longitudinal_profile(hits, &params.layers, columns)?;

    let layers = params
        .layers
        .par_iter()
        .map(|&layer| analyze_layer(hits, layer, params))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "analysed {} hits over {} layers",
        hits.n_rows(),
        layers.len()
    );
    Ok(RunAnalysis {
        n_hits: hits.n_rows(),
        n_events: showers.len(),
        shower,
        profile,
        layers,
    })
}

/// Computes the products of one layer.
///
/// # Errors
/// See [`analyze_run`].
pub fn analyze_layer(hits: &Table, layer: i64, params: &AnalysisParams) -> Result<LayerAnalysis> {
    let columns = &params.columns;
    let energies = layer_energies(hits, layer, columns)?;
    let energy = Histogram::from_values(&energies, params.histogram_bins);
    let occupancy = plane_occupancy(hits, layer, columns, &params.geometry)?;

    let selection = Selection::One(Value::Int(layer));
    let layer_hits = filter_column(hits, &columns.plane, Some(&selection))?;
    let mut channels = Vec::new();
    for &channel in &params.channels {
        params.geometry.coordinate(channel)?;
        let amplitudes = channel_amplitudes(&layer_hits, layer, channel, columns)?;
        if let Some(histogram) = Histogram::from_values(&amplitudes, params.histogram_bins) {
            channels.push(ChannelHistogram { channel, histogram });
        }
    }

    debug!(
        "layer {layer}: {} hits, {} channels with data",
        layer_hits.n_rows(),
        channels.len()
    );
    Ok(LayerAnalysis {
        layer,
        energy,
        occupancy,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten_events;
    use approx::assert_relative_eq;
    use tbcalo_core::config::FlattenConfig;
    use tbcalo_core::error::Error;
    use tbcalo_core::event::{events_to_table, EventRecord};

    fn hits() -> Table {
        let records = vec![
            EventRecord::new(1, vec![0, 0, 1], vec![3, 4, 3], vec![1.0, 2.0, 4.0]),
            EventRecord::new(2, vec![0, 1], vec![3, 23], vec![5.0, 6.0]),
        ];
        let config = FlattenConfig::default();
        let events = events_to_table(&records, &config.columns).unwrap();
        flatten_events(&events, &config).unwrap()
    }

    #[test]
    fn test_analyze_run() {
        let params = AnalysisParams::default()
            .with_layers(vec![1, 0, 5])
            .with_histogram_bins(10);
        let run = analyze_run(&hits(), &params).unwrap();

        assert_eq!(run.n_hits, 5);
        assert_eq!(run.n_events, 2);
        assert_eq!(run.shower.as_ref().unwrap().stats.entries, 2);
        assert_relative_eq!(run.shower.as_ref().unwrap().stats.mean, 9.0);

        let order: Vec<i64> = run.layers.iter().map(|l| l.layer).collect();
        assert_eq!(order, vec![1, 0, 5]);
        assert_eq!(run.profile.len(), 3);

        let layer0 = &run.layers[1];
        assert_eq!(layer0.occupancy.sum(), 3);
        assert_eq!(layer0.occupancy[[12, 3]], 2);
        assert_eq!(
            layer0.channels.iter().map(|c| c.channel).collect::<Vec<_>>(),
            vec![3, 4]
        );
        assert_eq!(layer0.channels[0].histogram.stats.entries, 2);

        let layer1 = &run.layers[0];
        assert_eq!(layer1.occupancy[[11, 3]], 1);

        let empty = &run.layers[2];
        assert!(empty.energy.is_none());
        assert!(empty.channels.is_empty());
        assert_eq!(empty.occupancy.sum(), 0);
    }

    #[test]
    fn test_channel_outside_sensor_fails() {
        let params = AnalysisParams::default()
            .with_layers(vec![0])
            .with_channels(vec![300]);
        assert!(matches!(
            analyze_run(&hits(), &params),
            Err(Error::ChannelOutOfRange { channel: 300, .. })
        ));
    }
}
