#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the expansion planning server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the stored types to allow independent evolution of the API
//! contract; most notably the city's status field carries the derived
//! status, not the stored one.

use serde::{Deserialize, Serialize};
use urban_passageiro_city_models::{City, CityStatus, Mesorregion, MonthKey};
use urban_passageiro_goals::potential::ScenarioPotential;
use urban_passageiro_planning_models::{CityPlan, derived_status};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// A municipality as returned by the API.
///
/// `status` is the derived status: stored status overridden by plan
/// progress, with Consolidated always sticky.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCity {
    /// IBGE municipality code.
    pub id: i32,
    /// Municipality name.
    pub name: String,
    /// Total population.
    pub population: u64,
    /// Addressable population aged 15-44.
    pub population_15_to_44: u64,
    /// Average monthly income in BRL.
    pub average_income: f64,
    /// Mesorregion of Mato Grosso.
    pub mesorregion: Mesorregion,
    /// Derived operational status.
    pub status: CityStatus,
    /// Month operations started (or are scheduled to start).
    pub implementation_start_date: Option<MonthKey>,
    /// Urban population, when known.
    pub urban_population: Option<u64>,
    /// Vehicles per inhabitant, when known.
    pub motorization_rate: Option<f64>,
    /// Whether a plan exists for this city.
    pub has_plan: bool,
    /// Block this city belongs to, if any.
    pub block_id: Option<String>,
}

impl ApiCity {
    /// Builds the API view of a city from its stored row, its plan (if
    /// any), and the block it belongs to (if any).
    #[must_use]
    pub fn from_parts(city: City, plan: Option<&CityPlan>, block_id: Option<String>) -> Self {
        let status = derived_status(city.status, plan);
        Self {
            id: city.id,
            name: city.name,
            population: city.population,
            population_15_to_44: city.population_15_to_44,
            average_income: city.average_income,
            mesorregion: city.mesorregion,
            status,
            implementation_start_date: city.implementation_start_date,
            urban_population: city.urban_population,
            motorization_rate: city.motorization_rate,
            has_plan: plan.is_some(),
            block_id,
        }
    }
}

/// Body for `PUT /api/cities/{id}/implementation-date`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationDateRequest {
    /// New start month, or `null` to clear.
    pub date: Option<MonthKey>,
}

/// Response for `GET /api/cities/{id}/potential`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPotential {
    /// IBGE municipality code.
    pub city_id: i32,
    /// Addressable market at the standard penetration.
    pub market_potential: u64,
    /// The five penetration scenarios, pessimistic first.
    pub scenarios: Vec<ScenarioPotential>,
}

/// Body for `POST /api/blocks` and `PUT /api/blocks/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNameRequest {
    /// Display name for the block.
    pub name: String,
}

/// Body for `POST /api/blocks/{id}/cities`. Removing a city from its
/// block goes through `DELETE /api/blocks/{id}/cities/{city_id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCityRequest {
    /// City to move into this block.
    pub city_id: i32,
}

/// Body for `POST /api/plans/{city_id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    /// First implementation month.
    pub start_date: MonthKey,
}

/// Body for `PUT /api/plans/{city_id}/phases/{index}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDatesRequest {
    /// Month the phase started.
    pub start_date: Option<MonthKey>,
    /// Planned completion month.
    pub estimated_completion_date: Option<MonthKey>,
}

/// Body for `POST /api/plans/{city_id}/phases/{index}/actions`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// What needs to be done.
    pub description: String,
    /// Target month, if any.
    pub estimated_completion_date: Option<MonthKey>,
    /// Link to supporting material.
    pub drive_link: Option<String>,
    /// Tags to attach.
    #[serde(default)]
    pub tag_ids: Vec<String>,
    /// Person accountable.
    pub responsible_id: Option<String>,
}

/// Body for `PUT /api/plans/{city_id}/results/{month_index}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthResultRequest {
    /// Rides actually delivered.
    pub rides: u64,
    /// Marketing spend in BRL.
    pub marketing_cost: f64,
    /// Operational spend in BRL.
    pub operational_cost: f64,
}

/// Body for `PUT /api/plans/{city_id}/real-costs/{month}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealCostRequest {
    /// Measured marketing spend in BRL.
    pub marketing_cost: f64,
    /// Measured operational spend in BRL.
    pub operational_cost: f64,
}

/// Body for tag create/update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRequest {
    /// Display label.
    pub label: String,
    /// Display color (CSS hex).
    pub color: String,
}

/// Body for responsible create/update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsibleRequest {
    /// Full name.
    pub name: String,
    /// Avatar initials.
    pub initials: String,
    /// Avatar color (CSS hex).
    pub color: String,
}

/// Uniform error body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable error message.
    pub error: String,
}

impl ApiError {
    /// Builds an error body from anything displayable.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_city() -> City {
        City {
            id: 5107909,
            name: "Sorriso".to_string(),
            population: 91_000,
            population_15_to_44: 41_000,
            average_income: 2_300.0,
            mesorregion: Mesorregion::Norte,
            status: CityStatus::NotServed,
            implementation_start_date: None,
            urban_population: None,
            motorization_rate: None,
        }
    }

    #[test]
    fn api_city_reports_derived_status() {
        let plan = CityPlan::from_template(5107909, MonthKey::new(2025, 6).unwrap());
        let api = ApiCity::from_parts(sample_city(), Some(&plan), None);
        // A plan with incomplete pre-launch phases derives Planning
        assert_eq!(api.status, CityStatus::Planning);
        assert!(api.has_plan);
    }

    #[test]
    fn api_city_serializes_camel_case() {
        let api = ApiCity::from_parts(sample_city(), None, Some("b-1".to_string()));
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["population15To44"], 41_000);
        assert_eq!(json["blockId"], "b-1");
        assert_eq!(json["status"], "NOT_SERVED");
    }
}
