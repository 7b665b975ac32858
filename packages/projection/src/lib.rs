#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Financial projection aggregator.
//!
//! Reconciles the ramp curve goal, telemetry from the ride platform, and
//! user-entered costs into month-by-month tables, block-level totals, and
//! the ROI breakeven search.
//!
//! Everything degrades gracefully: a missing or failing external service
//! produces zeros and a log line, never an aborted aggregation. Divisions
//! guard their denominators. Months whose costs had to be simulated are
//! labelled [`CostSource::Estimated`] all the way to the API.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use urban_passageiro_city_models::{City, MonthKey};
use urban_passageiro_goals::curve::{gradual_monthly_goal, theoretical_plateau_goal};
use urban_passageiro_goals::economics::Economics;
use urban_passageiro_planning_models::{CityPlan, MarketBlock, derived_status};
use urban_passageiro_projection_models::{
    BlockMonthTotals, BlockStats, Breakeven, CityProjection, CostSource, MonthlyProjection,
};
use urban_passageiro_rides::RidesProvider;

/// Bounded fan-out for per-city fetches inside a block aggregation. There
/// is no ordering dependency between cities.
const FAN_OUT_CONCURRENCY: usize = 4;

/// The explicit projection window: every city table covers at least this
/// many ramp months, extending into the future when the city is young.
const PROJECTION_WINDOW_MONTHS: i64 = 6;

/// How many months of telemetry to request per city. Covers the longest
/// ramp plus two years of plateau.
const TELEMETRY_MONTHS: u32 = 30;

/// Reconciles goals, telemetry, and entered costs for cities and blocks.
pub struct ProjectionAggregator {
    provider: Arc<dyn RidesProvider>,
    economics: Economics,
}

impl ProjectionAggregator {
    /// Creates an aggregator reading telemetry from `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn RidesProvider>, economics: Economics) -> Self {
        Self {
            provider,
            economics,
        }
    }

    /// The economics this aggregator computes with.
    #[must_use]
    pub const fn economics(&self) -> &Economics {
        &self.economics
    }

    /// Builds the reconciled projection for one city.
    ///
    /// The table runs from the city's effective start through the current
    /// month or the end of the explicit 6-month window, whichever is
    /// later. External fetch failures degrade to zero actuals and are
    /// logged, not propagated.
    pub async fn city_projection(
        &self,
        city: &City,
        plan: Option<&CityPlan>,
        now: MonthKey,
    ) -> CityProjection {
        let start = city.effective_start(now);

        let telemetry = match self.provider.city_monthly(&city.name, TELEMETRY_MONTHS).await {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Failed to fetch telemetry for {}: {e}", city.name);
                Vec::new()
            }
        };
        let actuals: HashMap<MonthKey, (u64, f64)> = telemetry
            .iter()
            .filter_map(|row| row.month_key().map(|key| (key, (row.rides, row.revenue))))
            .collect();

        let planned_revenue = match self.provider.planning_revenue(&city.name).await {
            Ok(map) => map,
            Err(e) => {
                log::error!("Failed to fetch planned revenue for {}: {e}", city.name);
                BTreeMap::new()
            }
        };

        let window_end = start.month.plus_months(PROJECTION_WINDOW_MONTHS - 1).max(now);
        let months: Vec<MonthlyProjection> = start
            .month
            .months_through(window_end)
            .map(|month| self.reconcile_month(city, plan, month, start.month, &actuals, &planned_revenue))
            .collect();

        let breakeven = roi_breakeven(&months);

        CityProjection {
            city_id: city.id,
            city_name: city.name.clone(),
            effective_start: start,
            months,
            breakeven,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn reconcile_month(
        &self,
        city: &City,
        plan: Option<&CityPlan>,
        month: MonthKey,
        start: MonthKey,
        actuals: &HashMap<MonthKey, (u64, f64)>,
        planned_revenue: &BTreeMap<MonthKey, f64>,
    ) -> MonthlyProjection {
        let goal = gradual_monthly_goal(city, month, start, &self.economics);
        let ramp_month = start.ramp_month(month);
        let projected_revenue = planned_revenue
            .get(&month)
            .copied()
            .unwrap_or(goal as f64 * self.economics.revenue_per_ride);

        // User-entered actuals for this ramp month, when any were saved
        let entered = plan.and_then(|p| {
            u32::try_from(ramp_month)
                .ok()
                .and_then(|index| p.results.get(&index))
        });

        // Telemetry is authoritative when the platform reports the month;
        // entered ride counts stand in when it does not
        let (actual_rides, actual_revenue) = actuals
            .get(&month)
            .copied()
            .unwrap_or_else(|| (entered.map_or(0, |result| result.rides), 0.0));

        let marketing_cost_projected = goal as f64 * self.economics.marketing_cost_per_ride;
        let operational_cost_projected = goal as f64 * self.economics.operational_cost_per_ride;

        let (marketing_cost_actual, operational_cost_actual, cost_source) =
            match plan.and_then(|p| p.real_monthly_costs.get(&month)) {
                Some(real) => (real.marketing_cost, real.operational_cost, CostSource::Real),
                None => match entered {
                    Some(result) => (
                        result.marketing_cost,
                        result.operational_cost,
                        CostSource::Real,
                    ),
                    None => (
                        marketing_cost_projected * self.economics.simulated_cost_factor,
                        operational_cost_projected * self.economics.simulated_cost_factor,
                        CostSource::Estimated,
                    ),
                },
            };

        MonthlyProjection {
            month,
            ramp_month,
            goal,
            projected_revenue,
            actual_rides,
            actual_revenue,
            marketing_cost_projected,
            operational_cost_projected,
            marketing_cost_actual,
            operational_cost_actual,
            cost_source,
        }
    }

    /// Aggregates projections across a block's member cities.
    ///
    /// Member fetches fan out concurrently (bounded). Block ids that do
    /// not resolve to a known city are recorded in `skipped_cities` and
    /// excluded from the totals.
    pub async fn block_stats(
        &self,
        block: &MarketBlock,
        cities: &[City],
        plans: &HashMap<i32, CityPlan>,
        now: MonthKey,
    ) -> BlockStats {
        use futures::stream::{self, StreamExt as _};

        let mut members: Vec<&City> = Vec::new();
        let mut skipped_cities: Vec<String> = Vec::new();
        for city_id in &block.city_ids {
            match cities.iter().find(|c| c.id == *city_id) {
                Some(city) => members.push(city),
                None => {
                    log::warn!("Block '{}' references unknown city {city_id}, skipping", block.name);
                    skipped_cities.push(city_id.to_string());
                }
            }
        }

        let projections: Vec<CityProjection> = stream::iter(members.iter().copied().map(|city| {
            let plan = plans.get(&city.id);
            async move { self.city_projection(city, plan, now).await }
        }))
        .buffer_unordered(FAN_OUT_CONCURRENCY)
        .collect()
        .await;

        // Union the per-city tables by calendar month
        let mut by_month: BTreeMap<MonthKey, BlockMonthTotals> = BTreeMap::new();
        let mut accumulated_rides: u64 = 0;
        for projection in &projections {
            for row in &projection.months {
                let entry = by_month.entry(row.month).or_insert_with(|| BlockMonthTotals {
                    month: row.month,
                    goal: 0,
                    projected_revenue: 0.0,
                    actual_rides: 0,
                    actual_revenue: 0.0,
                    cost_actual: 0.0,
                });
                entry.goal += row.goal;
                entry.projected_revenue += row.projected_revenue;
                entry.actual_rides += row.actual_rides;
                entry.actual_revenue += row.actual_revenue;
                entry.cost_actual += row.effective_cost();
                accumulated_rides += row.actual_rides;
            }
        }

        let mut current_month_goal: u64 = 0;
        let mut max_potential_ceiling: u64 = 0;
        for &city in &members {
            let start = city.effective_start(now).month;
            let current_goal = gradual_monthly_goal(city, now, start, &self.economics);
            current_month_goal += current_goal;

            // Inactive members count at their theoretical 100%-of-curve
            // value, so the ceiling reflects what the block could do, not
            // where its ramps happen to be today.
            let status = derived_status(city.status, plans.get(&city.id));
            max_potential_ceiling += if status.is_active() {
                current_goal
            } else {
                theoretical_plateau_goal(city, &self.economics)
            };
        }

        #[allow(clippy::cast_precision_loss)]
        let potential_attainment_pct =
            (accumulated_rides as f64 / max_potential_ceiling.max(1) as f64) * 100.0;

        BlockStats {
            block_id: block.id.clone(),
            block_name: block.name.clone(),
            city_count: members.len(),
            skipped_cities,
            months: by_month.into_values().collect(),
            current_month_goal,
            accumulated_rides,
            max_potential_ceiling,
            potential_attainment_pct,
        }
    }
}

/// Walks the explicit projection window accumulating revenue and cost, and
/// reports the first month where cumulative revenue covers cumulative
/// cost.
///
/// When the window ends in deficit, remaining months are projected on the
/// final month's run-rate: `extra = ceil(deficit / final_month_profit)`.
/// A window whose final month runs at a loss is not projectable.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn roi_breakeven(months: &[MonthlyProjection]) -> Breakeven {
    let window: Vec<&MonthlyProjection> = months
        .iter()
        .take(PROJECTION_WINDOW_MONTHS as usize)
        .collect();
    if window.is_empty() {
        return Breakeven::NotProjectable;
    }

    let mut cumulative_revenue = 0.0;
    let mut cumulative_cost = 0.0;
    for (i, row) in window.iter().enumerate() {
        cumulative_revenue += row.effective_revenue();
        cumulative_cost += row.effective_cost();
        if cumulative_revenue >= cumulative_cost {
            return Breakeven::Reached {
                month: (i + 1) as u32,
            };
        }
    }

    let last = window[window.len() - 1];
    let run_rate_profit = last.effective_revenue() - last.effective_cost();
    if run_rate_profit <= 0.0 {
        return Breakeven::NotProjectable;
    }

    let deficit = cumulative_cost - cumulative_revenue;
    let extra = (deficit / run_rate_profit).ceil().max(1.0) as u32;
    Breakeven::Projected {
        month: window.len() as u32 + extra,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use urban_passageiro_city_models::{CityStatus, Mesorregion};
    use urban_passageiro_planning_models::{MonthResult, RealMonthlyCost};
    use urban_passageiro_rides::RidesError;
    use urban_passageiro_rides_models::MonthlyRides;

    use super::*;

    fn month(year: i32, m: u32) -> MonthKey {
        MonthKey::new(year, m).unwrap()
    }

    fn city(id: i32, name: &str, pop_15_to_44: u64, start: Option<MonthKey>) -> City {
        City {
            id,
            name: name.to_string(),
            population: pop_15_to_44 * 10,
            population_15_to_44: pop_15_to_44,
            average_income: 2_200.0,
            mesorregion: Mesorregion::Norte,
            status: CityStatus::Planning,
            implementation_start_date: start,
            urban_population: None,
            motorization_rate: None,
        }
    }

    /// In-memory provider: telemetry and planned revenue keyed by city
    /// name; names listed in `fail` answer with a server error.
    #[derive(Default)]
    struct StubProvider {
        monthly: HashMap<String, Vec<MonthlyRides>>,
        revenue: HashMap<String, BTreeMap<MonthKey, f64>>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl RidesProvider for StubProvider {
        async fn city_monthly(
            &self,
            city: &str,
            _months: u32,
        ) -> Result<Vec<MonthlyRides>, RidesError> {
            if self.fail.iter().any(|name| name == city) {
                return Err(RidesError::Status {
                    status: 500,
                    url: format!("stub://{city}"),
                });
            }
            Ok(self.monthly.get(city).cloned().unwrap_or_default())
        }

        async fn planning_revenue(
            &self,
            city: &str,
        ) -> Result<BTreeMap<MonthKey, f64>, RidesError> {
            Ok(self.revenue.get(city).cloned().unwrap_or_default())
        }
    }

    fn aggregator(provider: StubProvider) -> ProjectionAggregator {
        ProjectionAggregator::new(Arc::new(provider), Economics::default())
    }

    fn telemetry_row(year: i32, m: u32, rides: u64, revenue: f64) -> MonthlyRides {
        MonthlyRides {
            month: String::new(),
            year,
            month_number: m,
            rides,
            revenue,
            average_value: 0.0,
            unique_days: 0,
        }
    }

    #[test]
    fn aggregator_accepts_a_loaded_economics_config() {
        // The startup path: resolve the config Result, then hand the
        // struct to the aggregator by value
        let economics = Economics::load_or_default(None).unwrap();
        let aggregator = ProjectionAggregator::new(Arc::new(StubProvider::default()), economics);
        assert!((aggregator.economics().revenue_per_ride - 2.50).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn window_covers_six_months_even_for_a_new_city() {
        let aggregator = aggregator(StubProvider::default());
        let city = city(1, "Sorriso", 10_000, None);

        let projection = aggregator.city_projection(&city, None, month(2025, 9)).await;
        assert!(projection.effective_start.hypothetical);
        assert_eq!(projection.months.len(), 6);
        assert_eq!(projection.months[0].month, month(2025, 9));
        assert_eq!(projection.months[5].month, month(2026, 2));

        let goals: Vec<u64> = projection.months.iter().map(|m| m.goal).collect();
        assert_eq!(goals, vec![45, 90, 180, 360, 630, 1_000]);
    }

    #[tokio::test]
    async fn table_extends_to_the_current_month_for_old_cities() {
        let aggregator = aggregator(StubProvider::default());
        let city = city(1, "Sorriso", 10_000, Some(month(2025, 1)));

        let projection = aggregator.city_projection(&city, None, month(2025, 10)).await;
        assert_eq!(projection.months.len(), 10);
        // Plateau past month 6
        assert_eq!(projection.months[9].goal, 1_000);
        assert_eq!(projection.months[9].ramp_month, 10);
    }

    #[tokio::test]
    async fn telemetry_lands_on_the_matching_month() {
        let mut provider = StubProvider::default();
        provider.monthly.insert(
            "Sorriso".to_string(),
            vec![telemetry_row(2025, 7, 120, 480.0), telemetry_row(2025, 6, 40, 150.0)],
        );
        let aggregator = aggregator(provider);
        let city = city(1, "Sorriso", 10_000, Some(month(2025, 6)));

        let projection = aggregator.city_projection(&city, None, month(2025, 8)).await;
        assert_eq!(projection.months[0].actual_rides, 40);
        assert_eq!(projection.months[1].actual_rides, 120);
        assert!((projection.months[1].actual_revenue - 480.0).abs() < f64::EPSILON);
        assert_eq!(projection.months[2].actual_rides, 0);
    }

    #[tokio::test]
    async fn planned_revenue_overrides_the_goal_fallback() {
        let mut provider = StubProvider::default();
        provider.revenue.insert(
            "Sorriso".to_string(),
            BTreeMap::from([(month(2025, 6), 999.0)]),
        );
        let aggregator = aggregator(provider);
        let city = city(1, "Sorriso", 10_000, Some(month(2025, 6)));

        let projection = aggregator.city_projection(&city, None, month(2025, 7)).await;
        assert!((projection.months[0].projected_revenue - 999.0).abs() < f64::EPSILON);
        // No saved value for July: goal 90 × 2.50
        assert!((projection.months[1].projected_revenue - 225.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn real_costs_bypass_the_simulated_fallback_exactly() {
        let aggregator = aggregator(StubProvider::default());
        let city = city(1, "Sorriso", 10_000, Some(month(2025, 6)));

        let mut plan = CityPlan::from_template(1, month(2025, 6));
        plan.real_monthly_costs.insert(
            month(2025, 7),
            RealMonthlyCost {
                marketing_cost: 1_234.56,
                operational_cost: 78.9,
            },
        );

        let projection = aggregator
            .city_projection(&city, Some(&plan), month(2025, 8))
            .await;

        let july = &projection.months[1];
        assert_eq!(july.cost_source, CostSource::Real);
        assert!((july.marketing_cost_actual - 1_234.56).abs() < f64::EPSILON);
        assert!((july.operational_cost_actual - 78.9).abs() < f64::EPSILON);

        // June has no entry: simulated at 0.95 of projected and labelled so
        let june = &projection.months[0];
        assert_eq!(june.cost_source, CostSource::Estimated);
        assert!((june.marketing_cost_actual - june.marketing_cost_projected * 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn entered_month_results_feed_the_reconciliation() {
        let aggregator = aggregator(StubProvider::default());
        let city = city(1, "Sorriso", 10_000, Some(month(2025, 6)));

        // Actuals entered for ramp month 2 (July), nothing for June
        let mut plan = CityPlan::from_template(1, month(2025, 6));
        plan.results.insert(
            2,
            MonthResult {
                rides: 70,
                marketing_cost: 500.0,
                operational_cost: 200.0,
            },
        );

        let projection = aggregator
            .city_projection(&city, Some(&plan), month(2025, 8))
            .await;

        let july = &projection.months[1];
        assert_eq!(july.cost_source, CostSource::Real);
        assert!((july.marketing_cost_actual - 500.0).abs() < f64::EPSILON);
        assert!((july.operational_cost_actual - 200.0).abs() < f64::EPSILON);
        // No telemetry for July, so the entered ride count stands in
        assert_eq!(july.actual_rides, 70);

        let june = &projection.months[0];
        assert_eq!(june.cost_source, CostSource::Estimated);
        assert_eq!(june.actual_rides, 0);
    }

    #[tokio::test]
    async fn measured_sources_outrank_entered_results() {
        let mut provider = StubProvider::default();
        provider
            .monthly
            .insert("Sorriso".to_string(), vec![telemetry_row(2025, 7, 130, 390.0)]);
        let aggregator = aggregator(provider);
        let city = city(1, "Sorriso", 10_000, Some(month(2025, 6)));

        let mut plan = CityPlan::from_template(1, month(2025, 6));
        plan.results.insert(
            2,
            MonthResult {
                rides: 70,
                marketing_cost: 500.0,
                operational_cost: 200.0,
            },
        );
        plan.real_monthly_costs.insert(
            month(2025, 7),
            RealMonthlyCost {
                marketing_cost: 333.0,
                operational_cost: 111.0,
            },
        );

        let projection = aggregator
            .city_projection(&city, Some(&plan), month(2025, 8))
            .await;

        // Measured monthly costs and platform telemetry both win over the
        // hand-entered result for the same month
        let july = &projection.months[1];
        assert_eq!(july.cost_source, CostSource::Real);
        assert!((july.marketing_cost_actual - 333.0).abs() < f64::EPSILON);
        assert!((july.operational_cost_actual - 111.0).abs() < f64::EPSILON);
        assert_eq!(july.actual_rides, 130);
    }

    #[tokio::test]
    async fn failed_fetch_degrades_to_zero_actuals() {
        let provider = StubProvider {
            fail: vec!["Sorriso".to_string()],
            ..StubProvider::default()
        };
        let aggregator = aggregator(provider);
        let city = city(1, "Sorriso", 10_000, Some(month(2025, 6)));

        let projection = aggregator.city_projection(&city, None, month(2025, 8)).await;
        assert!(projection.months.iter().all(|m| m.actual_rides == 0));
        // Goals still computed from the curve
        assert_eq!(projection.months[2].goal, 180);
    }

    #[test]
    fn breakeven_reports_the_first_covering_month() {
        // Revenue covers cost from month 3 onward
        let months: Vec<MonthlyProjection> = (1..=6)
            .map(|i| projection_row(i, if i >= 3 { 500.0 } else { 10.0 }, 100.0))
            .collect();
        assert_eq!(roi_breakeven(&months), Breakeven::Reached { month: 3 });
    }

    #[test]
    fn breakeven_within_window_is_at_most_six() {
        let months: Vec<MonthlyProjection> =
            (1..=6).map(|i| projection_row(i, 200.0, 100.0)).collect();
        match roi_breakeven(&months) {
            Breakeven::Reached { month } => assert!(month <= 6),
            other => panic!("expected Reached, got {other:?}"),
        }
    }

    #[test]
    fn breakeven_projects_forward_on_the_month_six_run_rate() {
        // Months 1-5: revenue 100, cost 140. Month 6: revenue 140, cost
        // 100. Cumulative deficit 160 at month 6, run-rate profit 40 →
        // ceil(160 / 40) = 4 extra months.
        let mut months: Vec<MonthlyProjection> =
            (1..=6).map(|i| projection_row(i, 100.0, 140.0)).collect();
        months[5] = projection_row(6, 140.0, 100.0);
        assert_eq!(roi_breakeven(&months), Breakeven::Projected { month: 10 });
    }

    #[test]
    fn breakeven_not_projectable_when_month_six_loses_money() {
        let months: Vec<MonthlyProjection> =
            (1..=6).map(|i| projection_row(i, 50.0, 100.0)).collect();
        assert_eq!(roi_breakeven(&months), Breakeven::NotProjectable);
    }

    #[test]
    fn breakeven_extra_months_follow_the_ceiling_formula() {
        // Months 1-5: revenue 90, cost 100. Month 6: revenue 125, cost
        // 100. Cumulative revenue 575 vs cost 600 leaves a deficit of 25;
        // month-6 run-rate profit is 25, so exactly one extra month.
        let mut months: Vec<MonthlyProjection> =
            (1..=6).map(|i| projection_row(i, 90.0, 100.0)).collect();
        months[5] = projection_row(6, 125.0, 100.0);
        assert_eq!(roi_breakeven(&months), Breakeven::Projected { month: 7 });
    }

    fn projection_row(ramp_month: i64, revenue: f64, cost: f64) -> MonthlyProjection {
        MonthlyProjection {
            month: month(2025, 1).plus_months(ramp_month - 1),
            ramp_month,
            goal: 0,
            projected_revenue: revenue,
            actual_rides: 0,
            actual_revenue: 0.0,
            marketing_cost_projected: cost,
            operational_cost_projected: 0.0,
            marketing_cost_actual: cost,
            operational_cost_actual: 0.0,
            cost_source: CostSource::Estimated,
        }
    }

    #[tokio::test]
    async fn ceiling_counts_inactive_members_at_full_plateau() {
        let aggregator = aggregator(StubProvider::default());
        let now = month(2025, 9);

        // Active city three months into its ramp; inactive city unstarted
        let mut active = city(1, "Sorriso", 10_000, Some(month(2025, 7)));
        active.status = CityStatus::Expansion;
        let inactive = city(2, "Sinop", 20_000, None);

        let block = MarketBlock {
            id: "b1".to_string(),
            name: "Norte".to_string(),
            city_ids: vec![1, 2],
        };
        let cities = vec![active.clone(), inactive.clone()];
        let stats = aggregator.block_stats(&block, &cities, &HashMap::new(), now).await;

        // Active contributes its ramp-month-3 goal, inactive its plateau
        let active_goal =
            gradual_monthly_goal(&active, now, month(2025, 7), &Economics::default());
        let inactive_plateau = theoretical_plateau_goal(&inactive, &Economics::default());
        assert_eq!(stats.max_potential_ceiling, active_goal + inactive_plateau);

        // With an inactive member the ceiling dominates the current goals
        assert!(stats.max_potential_ceiling >= stats.current_month_goal);
    }

    #[tokio::test]
    async fn block_totals_sum_members_by_calendar_month() {
        let mut provider = StubProvider::default();
        provider.monthly.insert(
            "Sorriso".to_string(),
            vec![telemetry_row(2025, 7, 100, 250.0)],
        );
        provider.monthly.insert(
            "Sinop".to_string(),
            vec![telemetry_row(2025, 7, 40, 100.0)],
        );
        let aggregator = aggregator(provider);
        let now = month(2025, 8);

        let cities = vec![
            city(1, "Sorriso", 10_000, Some(month(2025, 7))),
            city(2, "Sinop", 20_000, Some(month(2025, 7))),
        ];
        let block = MarketBlock {
            id: "b1".to_string(),
            name: "Norte".to_string(),
            city_ids: vec![1, 2],
        };

        let stats = aggregator.block_stats(&block, &cities, &HashMap::new(), now).await;
        assert_eq!(stats.city_count, 2);
        assert_eq!(stats.accumulated_rides, 140);

        let july = stats.months.iter().find(|m| m.month == month(2025, 7)).unwrap();
        assert_eq!(july.actual_rides, 140);
        // Month-1 goals: 45 + 90
        assert_eq!(july.goal, 135);
    }

    #[tokio::test]
    async fn unknown_block_members_are_skipped_not_fatal() {
        let aggregator = aggregator(StubProvider::default());
        let cities = vec![city(1, "Sorriso", 10_000, Some(month(2025, 6)))];
        let block = MarketBlock {
            id: "b1".to_string(),
            name: "Norte".to_string(),
            city_ids: vec![1, 999],
        };

        let stats = aggregator
            .block_stats(&block, &cities, &HashMap::new(), month(2025, 8))
            .await;
        assert_eq!(stats.city_count, 1);
        assert_eq!(stats.skipped_cities, vec!["999".to_string()]);
    }

    #[tokio::test]
    async fn attainment_guards_a_zero_ceiling() {
        let aggregator = aggregator(StubProvider::default());
        let block = MarketBlock {
            id: "b1".to_string(),
            name: "Vazio".to_string(),
            city_ids: vec![],
        };
        let stats = aggregator
            .block_stats(&block, &[], &HashMap::new(), month(2025, 8))
            .await;
        assert_eq!(stats.max_potential_ceiling, 0);
        assert!(stats.potential_attainment_pct.abs() < f64::EPSILON);
    }
}
