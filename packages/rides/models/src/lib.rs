#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wire types for the external rides-telemetry and planning-revenue HTTP
//! services.
//!
//! These mirror the upstream JSON contracts exactly. Every numeric field
//! carries `#[serde(default)]`; the upstream occasionally omits fields for
//! cities with sparse data, and a missing number means 0, never a failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use urban_passageiro_city_models::MonthKey;

/// `GET /rides/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RidesStatus {
    /// Whether the telemetry service has data to serve.
    #[serde(default)]
    pub available: bool,
    /// Human-readable status message.
    #[serde(default)]
    pub message: String,
}

/// `GET /rides/cities`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitiesResponse {
    /// Names of cities with at least one recorded ride.
    #[serde(default)]
    pub cities: Vec<String>,
}

/// `GET /rides/city/:name/stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRideStats {
    /// Total rides in the requested range.
    #[serde(default)]
    pub total_rides: u64,
    /// Total revenue in BRL.
    #[serde(default)]
    pub total_revenue: f64,
    /// Mean ride value in BRL.
    #[serde(default)]
    pub average_value: f64,
    /// Date of the first recorded ride, when any exist.
    #[serde(default)]
    pub first_ride: Option<String>,
    /// Date of the most recent recorded ride, when any exist.
    #[serde(default)]
    pub last_ride: Option<String>,
    /// Number of months with at least one ride.
    #[serde(default)]
    pub active_months: u32,
    /// Mean rides per day over the range.
    #[serde(default)]
    pub average_rides_per_day: f64,
    /// Mean rides per month over the range.
    #[serde(default)]
    pub average_rides_per_month: f64,
}

/// One month of telemetry for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRides {
    /// Month label as the upstream formats it (e.g. "junho").
    #[serde(default)]
    pub month: String,
    /// Calendar year.
    #[serde(default)]
    pub year: i32,
    /// Month of year, 1-12.
    #[serde(default)]
    pub month_number: u32,
    /// Rides recorded in this month.
    #[serde(default)]
    pub rides: u64,
    /// Revenue recorded in this month, BRL.
    #[serde(default)]
    pub revenue: f64,
    /// Mean ride value in BRL.
    #[serde(default)]
    pub average_value: f64,
    /// Days of the month with at least one ride.
    #[serde(default)]
    pub unique_days: u32,
}

impl MonthlyRides {
    /// The calendar month this row describes, when year/month are sane.
    #[must_use]
    pub fn month_key(&self) -> Option<MonthKey> {
        MonthKey::new(self.year, self.month_number).ok()
    }
}

/// `GET /rides/city/:name/monthly`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRidesResponse {
    /// Per-month telemetry, most recent first as the upstream returns it.
    #[serde(default)]
    pub data: Vec<MonthlyRides>,
}

/// One day of telemetry for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRides {
    /// Date as `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Rides recorded on this date.
    #[serde(default)]
    pub rides: u64,
    /// Revenue recorded on this date, BRL.
    #[serde(default)]
    pub revenue: f64,
}

/// `GET /rides/city/:name/daily`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRidesResponse {
    /// Per-day telemetry.
    #[serde(default)]
    pub data: Vec<DailyRides>,
}

/// One entry of the top-cities ranking in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRanking {
    /// City name as the telemetry platform spells it.
    #[serde(default)]
    pub city: String,
    /// Total rides in the range.
    #[serde(default)]
    pub rides: u64,
    /// Total revenue in the range, BRL.
    #[serde(default)]
    pub revenue: f64,
}

/// `GET /rides/summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RidesSummary {
    /// Total rides across all cities in the range.
    #[serde(default)]
    pub total_rides: u64,
    /// Total revenue across all cities in the range, BRL.
    #[serde(default)]
    pub total_revenue: f64,
    /// Mean ride value in BRL.
    #[serde(default)]
    pub average_value: f64,
    /// Cities ranked by ride volume, busiest first.
    #[serde(default)]
    pub top_cities: Vec<CityRanking>,
}

/// `GET /plannings/revenue/:cityName`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningRevenueResponse {
    /// Whether a saved plan existed for the city.
    #[serde(default)]
    pub success: bool,
    /// Projected revenue by calendar month for the saved plan.
    #[serde(default)]
    pub data: BTreeMap<MonthKey, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_numeric_fields_default_to_zero() {
        let stats: CityRideStats = serde_json::from_str("{\"totalRides\": 42}").unwrap();
        assert_eq!(stats.total_rides, 42);
        assert!(stats.total_revenue.abs() < f64::EPSILON);
        assert_eq!(stats.first_ride, None);
        assert_eq!(stats.active_months, 0);
    }

    #[test]
    fn monthly_row_resolves_its_month_key() {
        let row: MonthlyRides = serde_json::from_str(
            "{\"month\": \"junho\", \"year\": 2025, \"monthNumber\": 6, \"rides\": 310}",
        )
        .unwrap();
        assert_eq!(row.month_key(), MonthKey::new(2025, 6).ok());

        let bogus: MonthlyRides = serde_json::from_str("{\"year\": 2025}").unwrap();
        assert_eq!(bogus.month_key(), None);
    }

    #[test]
    fn planning_revenue_map_is_month_keyed() {
        let resp: PlanningRevenueResponse = serde_json::from_str(
            "{\"success\": true, \"data\": {\"2025-06\": 1125.0, \"2025-07\": 2250.0}}",
        )
        .unwrap();
        assert!(resp.success);
        let june = MonthKey::new(2025, 6).unwrap();
        assert!((resp.data[&june] - 1_125.0).abs() < f64::EPSILON);
    }
}
