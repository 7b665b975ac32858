#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Goal engines for expansion planning: the 6-month ramp curve that maps
//! (city, calendar month) to a target ride count, and the penetration
//! scenario table that maps a city's addressable market to projected
//! volume and revenue.
//!
//! Every tunable constant lives in [`economics::Economics`] so that block
//! totals, city cards, and ROI tables all compute from the same numbers.

pub mod curve;
pub mod economics;
pub mod potential;

pub use economics::Economics;

use thiserror::Error;

/// Errors from loading the economics configuration.
#[derive(Debug, Error)]
pub enum GoalsError {
    /// The economics TOML file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The economics TOML file could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
