//! Export Garmin Connect daily health metrics and activities to CSV.
//!
//! The binary authenticates once (resuming garth-compatible tokens when
//! possible), then walks a date range in chunks and appends the results to
//! two CSV files.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod storage;

pub use error::{GarminError, Result};
