//! The gradual-goal ramp curve.
//!
//! New cities do not reach their steady-state ride volume immediately:
//! driver and passenger acquisition lag behind launch. The curve below is a
//! hand-calibrated adoption S-curve, neither geometric nor logistic, tuned
//! against the first implemented municipalities. It must stay a verbatim
//! lookup table: block totals, per-city cards, and ROI tables all recompute
//! it independently over different windows and have to agree.

use urban_passageiro_city_models::{City, MonthKey};

use crate::economics::Economics;

/// Fraction of the month-6 target reached in each ramp month (1-indexed).
pub const RAMP_CURVE: [f64; 6] = [0.045, 0.09, 0.18, 0.36, 0.63, 1.0];

/// Target ride count for `city` in the calendar month `target`, given the
/// ramp started at `effective_start`.
///
/// Months before the start yield 0. Months 1-6 follow [`RAMP_CURVE`]
/// applied to the addressable market at the target penetration. From month
/// 7 on the goal plateaus at the full month-6 value.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gradual_monthly_goal(
    city: &City,
    target: MonthKey,
    effective_start: MonthKey,
    economics: &Economics,
) -> u64 {
    let ramp_month = effective_start.ramp_month(target);
    if ramp_month < 1 {
        return 0;
    }

    let market = city.population_15_to_44 as f64 * economics.target_penetration;
    if ramp_month <= RAMP_CURVE.len() as i64 {
        (market * RAMP_CURVE[(ramp_month - 1) as usize]).round() as u64
    } else {
        market.round() as u64
    }
}

/// The full 100%-of-curve plateau goal for `city`, independent of any
/// start date. Used by block ceilings where inactive cities contribute
/// their theoretical maximum rather than their current ramp value.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn theoretical_plateau_goal(city: &City, economics: &Economics) -> u64 {
    (city.population_15_to_44 as f64 * economics.target_penetration).round() as u64
}

#[cfg(test)]
mod tests {
    use urban_passageiro_city_models::{CityStatus, Mesorregion};

    use super::*;

    fn month(year: i32, m: u32) -> MonthKey {
        MonthKey::new(year, m).unwrap()
    }

    fn city(population_15_to_44: u64) -> City {
        City {
            id: 5107909,
            name: "Sorriso".to_string(),
            population: population_15_to_44 * 10,
            population_15_to_44,
            average_income: 2_400.0,
            mesorregion: Mesorregion::Norte,
            status: CityStatus::Planning,
            implementation_start_date: Some(month(2025, 6)),
            urban_population: None,
            motorization_rate: None,
        }
    }

    #[test]
    fn zero_before_the_ramp_starts() {
        let city = city(10_000);
        let start = month(2025, 6);
        assert_eq!(gradual_monthly_goal(&city, month(2025, 5), start, &Economics::default()), 0);
        assert_eq!(gradual_monthly_goal(&city, month(2024, 1), start, &Economics::default()), 0);
    }

    #[test]
    fn ramp_months_follow_the_curve_exactly() {
        let city = city(10_000);
        let start = month(2025, 6);
        let economics = Economics::default();

        // round(10000 × factor × 0.10) for each of the six ramp months
        let expected = [45, 90, 180, 360, 630, 1_000];
        for (i, want) in expected.iter().enumerate() {
            let target = start.plus_months(i64::try_from(i).unwrap());
            assert_eq!(
                gradual_monthly_goal(&city, target, start, &economics),
                *want,
                "ramp month {}",
                i + 1
            );
        }
    }

    #[test]
    fn month_three_worked_example() {
        let city = city(10_000);
        let start = month(2025, 6);
        assert_eq!(
            gradual_monthly_goal(&city, month(2025, 8), start, &Economics::default()),
            180
        );
    }

    #[test]
    fn ramp_is_monotonically_non_decreasing() {
        let city = city(7_341);
        let start = month(2025, 1);
        let economics = Economics::default();
        let mut previous = 0;
        for i in 0..12_i64 {
            let goal = gradual_monthly_goal(&city, start.plus_months(i), start, &economics);
            assert!(goal >= previous, "goal dropped at ramp month {}", i + 1);
            previous = goal;
        }
    }

    #[test]
    fn plateau_is_flat_and_equals_month_six() {
        let city = city(10_000);
        let start = month(2025, 6);
        let economics = Economics::default();

        let month_six = gradual_monthly_goal(&city, month(2025, 11), start, &economics);
        assert_eq!(month_six, 1_000);
        assert_eq!(gradual_monthly_goal(&city, month(2026, 3), start, &economics), month_six);
        assert_eq!(gradual_monthly_goal(&city, month(2030, 1), start, &economics), month_six);
    }

    #[test]
    fn pure_function_is_idempotent() {
        let city = city(10_000);
        let start = month(2025, 6);
        let economics = Economics::default();
        let first = gradual_monthly_goal(&city, month(2025, 9), start, &economics);
        let second = gradual_monthly_goal(&city, month(2025, 9), start, &economics);
        assert_eq!(first, second);
    }

    #[test]
    fn plateau_matches_theoretical_goal() {
        let city = city(10_000);
        let economics = Economics::default();
        assert_eq!(theoretical_plateau_goal(&city, &economics), 1_000);
        assert_eq!(
            theoretical_plateau_goal(&city, &economics),
            gradual_monthly_goal(&city, month(2027, 1), month(2025, 6), &economics)
        );
    }

    #[test]
    fn zero_population_yields_zero_goal() {
        let city = city(0);
        assert_eq!(
            gradual_monthly_goal(&city, month(2025, 8), month(2025, 6), &Economics::default()),
            0
        );
    }
}
