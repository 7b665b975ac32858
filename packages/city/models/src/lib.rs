#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Municipality and calendar-month types for the expansion planner.
//!
//! This crate defines the canonical [`City`] record seeded from the census
//! import, the Mato Grosso mesorregion taxonomy, and the [`MonthKey`] value
//! type that every engine uses for calendar-month arithmetic. Month math is
//! written exactly once here: the goal curve, the projection aggregator,
//! and the planning store all agree on what "month 3 of the ramp" means.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// The five geographic zones (mesorregions) of Mato Grosso.
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
pub enum Mesorregion {
    /// Norte Mato-grossense (Sinop, Sorriso, Lucas do Rio Verde)
    Norte,
    /// Nordeste Mato-grossense (Barra do Garças, Água Boa)
    Nordeste,
    /// Centro-Sul Mato-grossense (Cuiabá, Várzea Grande, Rondonópolis)
    CentroSul,
    /// Sudeste Mato-grossense (Primavera do Leste, Campo Verde)
    Sudeste,
    /// Sudoeste Mato-grossense (Cáceres, Pontes e Lacerda)
    Sudoeste,
}

impl Mesorregion {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Norte,
            Self::Nordeste,
            Self::CentroSul,
            Self::Sudeste,
            Self::Sudoeste,
        ]
    }
}

/// Rollout status of a municipality.
///
/// `Planning` vs `Expansion` is normally *derived* from plan-phase
/// completion rather than read from this field; see the planning models
/// crate for the single derivation function.
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
pub enum CityStatus {
    /// No service and no active plan.
    NotServed,
    /// Pre-launch phases in progress.
    Planning,
    /// Launched; post-launch phases in progress.
    Expansion,
    /// Mature operation, no active rollout work.
    Consolidated,
}

impl CityStatus {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::NotServed,
            Self::Planning,
            Self::Expansion,
            Self::Consolidated,
        ]
    }

    /// Whether this status counts as an active operation (rides expected).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Expansion | Self::Consolidated)
    }
}

/// A calendar month, e.g. `2025-06`.
///
/// Parsed from `"YYYY-MM"` or `"YYYY-MM-DD"` (the day is ignored) and
/// serialized back as `"YYYY-MM"`. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    /// Calendar year.
    pub year: i32,
    /// Month of year, 1-12.
    pub month: u32,
}

impl MonthKey {
    /// Creates a month key.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidMonthError`] if `month` is not in 1-12.
    pub const fn new(year: i32, month: u32) -> Result<Self, InvalidMonthError> {
        if month == 0 || month > 12 {
            Err(InvalidMonthError { month })
        } else {
            Ok(Self { year, month })
        }
    }

    /// The current calendar month (UTC).
    #[must_use]
    pub fn now() -> Self {
        use chrono::Datelike as _;
        let today = chrono::Utc::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// 1-indexed ramp position of `target` relative to `self`.
    ///
    /// The month the ramp starts is month 1; earlier months yield values
    /// `< 1` (zero or negative).
    #[must_use]
    #[allow(clippy::cast_lossless)] // i64::from is not const
    pub const fn ramp_month(self, target: Self) -> i64 {
        let years = target.year as i64 - self.year as i64;
        let months = target.month as i64 - self.month as i64;
        years * 12 + months + 1
    }

    /// The month `n` months after this one (`n` may be negative).
    #[must_use]
    #[allow(clippy::cast_lossless, clippy::cast_possible_truncation)] // i64::from is not const
    pub const fn plus_months(self, n: i64) -> Self {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) + n;
        Self {
            year: zero_based.div_euclid(12) as i32,
            month: (zero_based.rem_euclid(12) + 1) as u32,
        }
    }

    /// Iterates every month from `self` through `end` inclusive.
    ///
    /// Empty when `end` precedes `self`.
    pub fn months_through(self, end: Self) -> impl Iterator<Item = Self> {
        let count = self.ramp_month(end).max(0);
        (0..count).map(move |i| self.plus_months(i))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = ParseMonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "YYYY-MM" or "YYYY-MM-DD"; any trailing day component is ignored
        let mut parts = s.splitn(3, '-');
        let year = parts
            .next()
            .and_then(|y| y.parse::<i32>().ok())
            .ok_or_else(|| ParseMonthKeyError {
                input: s.to_string(),
            })?;
        let month = parts
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(|| ParseMonthKeyError {
                input: s.to_string(),
            })?;
        Self::new(year, month).map_err(|_| ParseMonthKeyError {
            input: s.to_string(),
        })
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when a month number is outside 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMonthError {
    /// The invalid month number.
    pub month: u32,
}

impl fmt::Display for InvalidMonthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid month {}: expected 1-12", self.month)
    }
}

impl std::error::Error for InvalidMonthError {}

/// Error returned when a string cannot be parsed as a [`MonthKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMonthKeyError {
    /// The string that failed to parse.
    pub input: String,
}

impl fmt::Display for ParseMonthKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid month key '{}': expected YYYY-MM or YYYY-MM-DD",
            self.input
        )
    }
}

impl std::error::Error for ParseMonthKeyError {}

/// A municipality of Mato Grosso as seeded by the census import.
///
/// Demographic fields beyond `population_15_to_44` are display-only; the
/// engines never read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    /// IBGE municipality code.
    pub id: i32,
    /// Municipality name.
    pub name: String,
    /// Total population.
    pub population: u64,
    /// Working-age (15-44) population, the addressable market.
    /// Invariant: `population_15_to_44 <= population`.
    pub population_15_to_44: u64,
    /// Average monthly income in BRL.
    pub average_income: f64,
    /// Geographic zone.
    pub mesorregion: Mesorregion,
    /// Stored rollout status. Planning/Expansion is derived from the plan
    /// where one exists.
    pub status: CityStatus,
    /// Month the ramp curve starts, when configured.
    pub implementation_start_date: Option<MonthKey>,
    /// Urban share of the population, display only.
    pub urban_population: Option<u64>,
    /// Vehicles per capita, display only.
    pub motorization_rate: Option<f64>,
}

/// The month a city's ramp is evaluated from, with provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveStart {
    /// First month of the ramp.
    pub month: MonthKey,
    /// `true` when no start date is configured and `month` is a synthesized
    /// placeholder anchored to "now" so projections still render.
    pub hypothetical: bool,
}

impl City {
    /// Resolves the effective implementation start for projections.
    ///
    /// Uses the configured start date when present; otherwise substitutes
    /// the given current month and flags the result as hypothetical.
    #[must_use]
    pub const fn effective_start(&self, now: MonthKey) -> EffectiveStart {
        match self.implementation_start_date {
            Some(month) => EffectiveStart {
                month,
                hypothetical: false,
            },
            None => EffectiveStart {
                month: now,
                hypothetical: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32) -> MonthKey {
        MonthKey::new(year, month).unwrap()
    }

    #[test]
    fn ramp_month_is_one_indexed() {
        let start = month(2025, 6);
        assert_eq!(start.ramp_month(month(2025, 6)), 1);
        assert_eq!(start.ramp_month(month(2025, 8)), 3);
        assert_eq!(start.ramp_month(month(2026, 3)), 10);
        assert_eq!(start.ramp_month(month(2025, 5)), 0);
        assert_eq!(start.ramp_month(month(2024, 12)), -5);
    }

    #[test]
    fn parses_with_and_without_day() {
        assert_eq!("2025-06".parse::<MonthKey>().unwrap(), month(2025, 6));
        assert_eq!("2025-06-15".parse::<MonthKey>().unwrap(), month(2025, 6));
        assert!("2025".parse::<MonthKey>().is_err());
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("junho".parse::<MonthKey>().is_err());
    }

    #[test]
    fn plus_months_wraps_year_boundaries() {
        assert_eq!(month(2025, 11).plus_months(3), month(2026, 2));
        assert_eq!(month(2025, 1).plus_months(-1), month(2024, 12));
        assert_eq!(month(2025, 6).plus_months(0), month(2025, 6));
    }

    #[test]
    fn months_through_is_inclusive() {
        let range: Vec<MonthKey> = month(2025, 11).months_through(month(2026, 1)).collect();
        assert_eq!(range, vec![month(2025, 11), month(2025, 12), month(2026, 1)]);
        assert_eq!(month(2025, 6).months_through(month(2025, 5)).count(), 0);
    }

    #[test]
    fn serializes_as_yyyy_mm() {
        let json = serde_json::to_string(&month(2025, 6)).unwrap();
        assert_eq!(json, "\"2025-06\"");
        let back: MonthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month(2025, 6));
    }

    #[test]
    fn effective_start_falls_back_to_now() {
        let mut city = sample_city();
        let now = month(2025, 9);

        let start = city.effective_start(now);
        assert_eq!(start.month, month(2025, 6));
        assert!(!start.hypothetical);

        city.implementation_start_date = None;
        let start = city.effective_start(now);
        assert_eq!(start.month, now);
        assert!(start.hypothetical);
    }

    fn sample_city() -> City {
        City {
            id: 5107909,
            name: "Sorriso".to_string(),
            population: 100_000,
            population_15_to_44: 10_000,
            average_income: 2_400.0,
            mesorregion: Mesorregion::Norte,
            status: CityStatus::Planning,
            implementation_start_date: Some(month(2025, 6)),
            urban_population: Some(85_000),
            motorization_rate: Some(0.62),
        }
    }
}
