//! tbcalo-io: File I/O for tbcalo.
//!
//! This crate loads raw event files through memory-mapped readers,
//! discovers runs on disk, holds the run configuration and writes tables
//! and analysis products. The optional `hdf5` feature adds a cache for
//! flattened hit tables and occupancy grids.
//!

pub mod config;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
pub mod scanner;
mod writer;

pub use config::{check_extension, RunConfig, ALLOWED_INPUT_EXTENSIONS};
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use self::hdf5::{
    read_grid_hdf5, read_hits_hdf5, write_grids_hdf5, write_hits_hdf5, HitCacheOptions,
};
pub use reader::{read_events, read_run_events, EventFileReader, MappedFileReader};
pub use scanner::{RunFile, RunScanner};
pub use writer::{write_table, LayerSummary, RunSummary, TableFormat, TableWriter};
