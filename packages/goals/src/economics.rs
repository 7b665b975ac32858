//! Unit-economics configuration.
//!
//! All per-ride multipliers used by the goal curve, the market potential
//! calculator, and the projection aggregator are hoisted here. Loaded from
//! a TOML file when one is configured, with calibrated defaults otherwise.

use std::path::Path;

use serde::Deserialize;

use crate::GoalsError;

/// Per-ride unit economics and planning assumptions.
///
/// Historical versions of the planning tool drifted between 2.50 and 8.00
/// BRL per ride in different call paths. The constant is hoisted here so
/// there is exactly one answer; 2.50 matches the value used by the revenue
/// projection tables, which is the surface the finance team reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Economics {
    /// Net revenue per completed ride, in BRL.
    pub revenue_per_ride: f64,
    /// Projected marketing spend per goal ride, in BRL. Calibrated from
    /// historical project data.
    pub marketing_cost_per_ride: f64,
    /// Projected operational spend per goal ride, in BRL. Calibrated from
    /// historical project data.
    pub operational_cost_per_ride: f64,
    /// Factor applied to projected costs when no measured costs were
    /// entered for a month. The result is always labelled as an estimate.
    pub simulated_cost_factor: f64,
    /// Fraction of the 15-44 population targeted at full ramp, the
    /// "Média" planning scenario.
    pub target_penetration: f64,
}

impl Default for Economics {
    fn default() -> Self {
        Self {
            revenue_per_ride: 2.50,
            marketing_cost_per_ride: 0.85,
            operational_cost_per_ride: 0.35,
            simulated_cost_factor: 0.95,
            target_penetration: 0.10,
        }
    }
}

impl Economics {
    /// Parses an economics config from TOML. Missing keys keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GoalsError`] if the TOML is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, GoalsError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads the economics config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GoalsError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, GoalsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads from `path` when given, falling back to defaults (with a log
    /// line) when no path is configured.
    ///
    /// # Errors
    ///
    /// Returns [`GoalsError`] if a configured file cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, GoalsError> {
        match path {
            Some(path) => {
                let economics = Self::load(path)?;
                log::info!("Loaded economics config from {}", path.display());
                Ok(economics)
            }
            None => {
                log::info!("No economics config path set, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_calibrated_values() {
        let economics = Economics::default();
        assert!((economics.revenue_per_ride - 2.50).abs() < f64::EPSILON);
        assert!((economics.marketing_cost_per_ride - 0.85).abs() < f64::EPSILON);
        assert!((economics.operational_cost_per_ride - 0.35).abs() < f64::EPSILON);
        assert!((economics.simulated_cost_factor - 0.95).abs() < f64::EPSILON);
        assert!((economics.target_penetration - 0.10).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let economics = Economics::from_toml_str("revenue_per_ride = 3.0").unwrap();
        assert!((economics.revenue_per_ride - 3.0).abs() < f64::EPSILON);
        assert!((economics.marketing_cost_per_ride - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Economics::from_toml_str("revenue_per_ride = \"muito\"").is_err());
    }
}
