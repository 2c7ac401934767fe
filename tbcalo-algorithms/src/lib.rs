//! tbcalo-algorithms: Table transformations for calorimeter test-beam data.
//!
//! This crate provides the stages applied to a loaded event table:
//! - **Flatten** - one row per hit with shower and plane energy sums
//! - **Select** - plane, channel and amplitude filters plus deduplication
//! - **Group** - regroup hit rows by key with per-column reductions
//! - **Frequency** - channel occupancy grids in sensor display order
//! - **Analysis** - energy distributions, longitudinal profile and the
//!   run-level driver
//!
#![warn(missing_docs)]

pub mod analysis;
mod flatten;
mod frequency;
mod group;
pub mod merge;
mod processing;
mod select;

pub use analysis::{Histogram, LayerProfile, SummaryStats};
pub use flatten::flatten_events;
pub use frequency::{channel_frequency, plane_occupancy};
pub use group::{group, group_hits, AggregationPlan, Reduction};
pub use merge::{first_element, inner_join};
pub use processing::{
    analyze_layer, analyze_run, AnalysisParams, ChannelHistogram, LayerAnalysis, RunAnalysis,
};
pub use select::{dedup, filter_column, filter_range, select, HitSelection, Selection};

// Re-export core configuration types used by every stage
pub use tbcalo_core::config::{ColumnNames, FlattenConfig, NoisyChannels};
