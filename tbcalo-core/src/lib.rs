//! tbcalo-core: Core types for test-beam calorimeter data processing.
//!
//! This crate provides the columnar table model, the sensor geometry
//! mapping and the run-scoped configuration shared by the hit flattening,
//! selection and aggregation stages.
//!

pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod table;

pub use config::{ColumnNames, FlattenConfig, NoisyChannels};
pub use error::{Error, Result};
pub use event::{events_to_table, EventRecord};
pub use geometry::{SensorCoord, SensorGeometry, SENSOR_COLS, SENSOR_ROWS};
pub use table::{Table, Value};
