//! Market potential scenarios.
//!
//! A penetration scenario is a named fraction of the 15-44 population
//! assumed to become active riders. "Média" is the default planning
//! scenario and is the same fraction the ramp curve targets.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use urban_passageiro_city_models::City;

use crate::economics::Economics;

/// Named penetration scenarios, from pessimistic to optimistic.
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
)]
pub enum PenetrationScenario {
    /// 2% of the addressable market.
    #[serde(rename = "Muito Baixa")]
    #[strum(serialize = "Muito Baixa")]
    MuitoBaixa,
    /// 5% of the addressable market.
    #[serde(rename = "Baixa")]
    #[strum(serialize = "Baixa")]
    Baixa,
    /// 10% of the addressable market, the default planning scenario.
    #[serde(rename = "Média")]
    #[strum(serialize = "Média")]
    Media,
    /// 15% of the addressable market.
    #[serde(rename = "Alta")]
    #[strum(serialize = "Alta")]
    Alta,
    /// 20% of the addressable market.
    #[serde(rename = "Muito Alta")]
    #[strum(serialize = "Muito Alta")]
    MuitoAlta,
}

impl PenetrationScenario {
    /// The fraction of the 15-44 population this scenario assumes.
    #[must_use]
    pub const fn fraction(self) -> f64 {
        match self {
            Self::MuitoBaixa => 0.02,
            Self::Baixa => 0.05,
            Self::Media => 0.10,
            Self::Alta => 0.15,
            Self::MuitoAlta => 0.20,
        }
    }

    /// Returns all variants of this enum, pessimistic first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::MuitoBaixa,
            Self::Baixa,
            Self::Media,
            Self::Alta,
            Self::MuitoAlta,
        ]
    }
}

/// Projected monthly volume and revenue for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPotential {
    /// The scenario these numbers assume.
    pub scenario: PenetrationScenario,
    /// Projected monthly rides at full adoption.
    pub rides: u64,
    /// Projected monthly revenue in BRL.
    pub revenue: f64,
}

/// Projected monthly rides for `city` under `scenario`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn potential_rides(city: &City, scenario: PenetrationScenario) -> u64 {
    (city.population_15_to_44 as f64 * scenario.fraction()).round() as u64
}

/// Projected monthly revenue for `city` under `scenario`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn potential_revenue(city: &City, scenario: PenetrationScenario, economics: &Economics) -> f64 {
    potential_rides(city, scenario) as f64 * economics.revenue_per_ride
}

/// The full scenario table for `city`, pessimistic first.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn market_potential(city: &City, economics: &Economics) -> Vec<ScenarioPotential> {
    PenetrationScenario::all()
        .iter()
        .map(|&scenario| {
            let rides = potential_rides(city, scenario);
            ScenarioPotential {
                scenario,
                rides,
                revenue: rides as f64 * economics.revenue_per_ride,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use urban_passageiro_city_models::{CityStatus, Mesorregion, MonthKey};

    use super::*;

    fn city(population_15_to_44: u64) -> City {
        City {
            id: 5102504,
            name: "Barra do Garças".to_string(),
            population: population_15_to_44 * 10,
            population_15_to_44,
            average_income: 2_100.0,
            mesorregion: Mesorregion::Nordeste,
            status: CityStatus::NotServed,
            implementation_start_date: MonthKey::new(2025, 6).ok(),
            urban_population: None,
            motorization_rate: None,
        }
    }

    #[test]
    fn scenario_table_covers_two_to_twenty_percent() {
        let city = city(10_000);
        let table = market_potential(&city, &Economics::default());

        let rides: Vec<u64> = table.iter().map(|s| s.rides).collect();
        assert_eq!(rides, vec![200, 500, 1_000, 1_500, 2_000]);

        // revenue = rides × revenue_per_ride, single constant everywhere
        for row in &table {
            assert!((row.revenue - row.rides as f64 * 2.50).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn media_scenario_matches_ramp_target() {
        // The ramp curve targets the "Média" fraction, so the plateau goal
        // and the Média scenario must agree.
        let city = city(10_000);
        let economics = Economics::default();
        assert_eq!(
            potential_rides(&city, PenetrationScenario::Media),
            crate::curve::theoretical_plateau_goal(&city, &economics)
        );
    }

    #[test]
    fn zero_population_produces_zero_potential() {
        let city = city(0);
        for row in market_potential(&city, &Economics::default()) {
            assert_eq!(row.rides, 0);
            assert!(row.revenue.abs() < f64::EPSILON);
        }
    }

    #[test]
    fn scenario_names_round_trip() {
        assert_eq!(PenetrationScenario::MuitoBaixa.to_string(), "Muito Baixa");
        assert_eq!(
            "Média".parse::<PenetrationScenario>().unwrap(),
            PenetrationScenario::Media
        );
    }
}
