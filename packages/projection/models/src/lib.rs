#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types produced by the financial projection aggregator.
//!
//! Serialized to JSON for the dashboard API. Monetary values are BRL.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use urban_passageiro_city_models::{EffectiveStart, MonthKey};

/// Where a month's "actual" cost figure came from.
///
/// `Estimated` months carry the simulated-actuals fallback (a fixed factor
/// of the projection) because no measured costs were entered. The marker is
/// part of the API contract so the dashboard can render estimates as
/// estimates instead of passing fabricated numbers off as measurements.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CostSource {
    /// Measured or user-entered costs exist for the month.
    Real,
    /// Simulated from the projection; no measured data exists.
    Estimated,
}

/// One reconciled month of a city's projection: ramp goal, projected
/// revenue and costs, and whatever actuals exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProjection {
    /// Calendar month.
    pub month: MonthKey,
    /// 1-indexed position on the ramp curve.
    pub ramp_month: i64,
    /// Goal ride count from the ramp curve.
    pub goal: u64,
    /// Projected revenue: saved-plan value when one exists, else
    /// `goal × revenue_per_ride`.
    pub projected_revenue: f64,
    /// Rides measured by the telemetry platform (0 when none).
    pub actual_rides: u64,
    /// Revenue measured by the telemetry platform (0 when none).
    pub actual_revenue: f64,
    /// Projected marketing spend.
    pub marketing_cost_projected: f64,
    /// Projected operational spend.
    pub operational_cost_projected: f64,
    /// Marketing spend used as "actual" (see `cost_source`).
    pub marketing_cost_actual: f64,
    /// Operational spend used as "actual" (see `cost_source`).
    pub operational_cost_actual: f64,
    /// Whether the actual costs are measured or simulated.
    pub cost_source: CostSource,
}

impl MonthlyProjection {
    /// Revenue used in cumulative ROI math: measured when any exists,
    /// projected otherwise.
    #[must_use]
    pub fn effective_revenue(&self) -> f64 {
        if self.actual_revenue > 0.0 {
            self.actual_revenue
        } else {
            self.projected_revenue
        }
    }

    /// Combined actual cost used in cumulative ROI math.
    #[must_use]
    pub fn effective_cost(&self) -> f64 {
        self.marketing_cost_actual + self.operational_cost_actual
    }
}

/// Result of the ROI breakeven search over a city's projection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Breakeven {
    /// Cumulative revenue covered cumulative cost within the explicit
    /// window; `month` is the first (1-indexed) such ramp month.
    Reached {
        /// First ramp month at breakeven.
        month: u32,
    },
    /// Not reached in the window; projected forward on the final month's
    /// run-rate.
    Projected {
        /// Estimated ramp month of breakeven.
        month: u32,
    },
    /// The final window month runs at a loss; no projection is possible.
    NotProjectable,
}

/// The full reconciled projection for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityProjection {
    /// IBGE code.
    pub city_id: i32,
    /// Municipality name.
    pub city_name: String,
    /// The ramp start used, with its provenance (configured or
    /// hypothetical).
    pub effective_start: EffectiveStart,
    /// Reconciled months, chronological, covering at least the explicit
    /// 6-month window.
    pub months: Vec<MonthlyProjection>,
    /// Breakeven over the explicit window.
    pub breakeven: Breakeven,
}

/// Per-month totals summed across a block's member cities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMonthTotals {
    /// Calendar month.
    pub month: MonthKey,
    /// Sum of member goals.
    pub goal: u64,
    /// Sum of member projected revenue.
    pub projected_revenue: f64,
    /// Sum of member measured rides.
    pub actual_rides: u64,
    /// Sum of member measured revenue.
    pub actual_revenue: f64,
    /// Sum of member actual costs (measured or estimated).
    pub cost_actual: f64,
}

/// Aggregated statistics for a market block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStats {
    /// Block UUID.
    pub block_id: String,
    /// Block display name.
    pub block_name: String,
    /// Number of member cities.
    pub city_count: usize,
    /// Member cities that could not be resolved or fetched and were
    /// skipped. Non-empty means the totals below are partial.
    pub skipped_cities: Vec<String>,
    /// Month-by-month totals across members, chronological.
    pub months: Vec<BlockMonthTotals>,
    /// Sum of member goals for the current month.
    pub current_month_goal: u64,
    /// Total measured rides across all members and months.
    pub accumulated_rides: u64,
    /// Maximum-potential ceiling: sum over members of the current-month
    /// goal (inactive members contribute their theoretical plateau).
    pub max_potential_ceiling: u64,
    /// `accumulated_rides` as a percentage of the ceiling.
    pub potential_attainment_pct: f64,
}
