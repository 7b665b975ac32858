#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rollout plan types: per-city phase checklists, user-entered monthly
//! actuals, annotation entities (tags, responsibles), and market blocks.
//!
//! Also home to [`derived_status`], the single place where "are phases 1
//! and 2 both complete?" is answered. Every surface that distinguishes
//! Planning from Expansion goes through it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use urban_passageiro_city_models::{CityStatus, MonthKey};

/// The fixed phase template, in rollout order. The first
/// [`PRE_LAUNCH_PHASES`] entries are pre-launch; completing them moves a
/// city from Planning to Expansion.
pub const PHASE_TEMPLATE: [&str; 6] = [
    "Análise & Viabilidade",
    "Preparação Operacional",
    "Aquisição de Motoristas",
    "Marketing & Lançamento",
    "Aquisição de Passageiros",
    "Pós-Lançamento & Otimização",
];

/// Number of phases that must complete before a city counts as launched.
pub const PRE_LAUNCH_PHASES: usize = 2;

/// A single checklist item within a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningAction {
    /// Action UUID.
    pub id: String,
    /// What needs to be done.
    pub description: String,
    /// Whether the action is done.
    pub completed: bool,
    /// When the action was created.
    pub created_at: DateTime<Utc>,
    /// Target month, when one was set.
    pub estimated_completion_date: Option<MonthKey>,
    /// Link to supporting material (Drive doc, sheet).
    pub drive_link: Option<String>,
    /// Tags attached to this action.
    #[serde(default)]
    pub tag_ids: Vec<String>,
    /// Person accountable for this action.
    pub responsible_id: Option<String>,
}

/// One phase of the rollout checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningPhase {
    /// Phase name from [`PHASE_TEMPLATE`].
    pub name: String,
    /// Month the phase started, once work began.
    pub start_date: Option<MonthKey>,
    /// Planned completion month.
    pub estimated_completion_date: Option<MonthKey>,
    /// Actual completion month. Kept in lockstep with action completion by
    /// [`PlanningPhase::sync_completion_date`], never set by hand.
    pub completion_date: Option<MonthKey>,
    /// Ordered checklist items.
    #[serde(default)]
    pub actions: Vec<PlanningAction>,
}

impl PlanningPhase {
    /// An empty phase with the given name.
    #[must_use]
    pub const fn named(name: String) -> Self {
        Self {
            name,
            start_date: None,
            estimated_completion_date: None,
            completion_date: None,
            actions: Vec::new(),
        }
    }

    /// Fraction of actions completed, in `0.0..=1.0`.
    ///
    /// A phase with no actions yet counts as 0%; an empty checklist is
    /// unstarted work, not finished work.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.actions.is_empty() {
            return 0.0;
        }
        let done = self.actions.iter().filter(|a| a.completed).count();
        done as f64 / self.actions.len() as f64
    }

    /// Whether every action is complete (and there is at least one).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.actions.is_empty() && self.actions.iter().all(|a| a.completed)
    }

    /// Reconciles `completion_date` with action completion: stamps the
    /// given month when the phase just reached 100%, clears it when an
    /// action was reopened. An already-stamped complete phase keeps its
    /// original month.
    pub fn sync_completion_date(&mut self, now: MonthKey) {
        if self.is_complete() {
            if self.completion_date.is_none() {
                self.completion_date = Some(now);
            }
        } else {
            self.completion_date = None;
        }
    }
}

/// User-entered actuals for one relative implementation month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthResult {
    /// Rides completed that month.
    pub rides: u64,
    /// Marketing spend in BRL.
    pub marketing_cost: f64,
    /// Operational spend in BRL.
    pub operational_cost: f64,
}

/// Real (measured) costs for one absolute calendar month.
///
/// When present for a month, the projection aggregator uses these verbatim
/// instead of the simulated-actuals estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealMonthlyCost {
    /// Marketing spend in BRL.
    pub marketing_cost: f64,
    /// Operational spend in BRL.
    pub operational_cost: f64,
}

/// The full rollout plan for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityPlan {
    /// IBGE code of the planned city.
    pub city_id: i32,
    /// Month the plan was created.
    pub start_date: MonthKey,
    /// Phases in [`PHASE_TEMPLATE`] order. The order is fixed; only the
    /// contents of each phase change.
    pub phases: Vec<PlanningPhase>,
    /// Sparse user-entered actuals keyed by 1-based relative month.
    #[serde(default)]
    pub results: BTreeMap<u32, MonthResult>,
    /// Measured costs keyed by absolute calendar month.
    #[serde(default)]
    pub real_monthly_costs: BTreeMap<MonthKey, RealMonthlyCost>,
}

impl CityPlan {
    /// A fresh plan for `city_id` with the template phases, all empty.
    #[must_use]
    pub fn from_template(city_id: i32, start_date: MonthKey) -> Self {
        Self {
            city_id,
            start_date,
            phases: PHASE_TEMPLATE
                .iter()
                .map(|name| PlanningPhase::named((*name).to_string()))
                .collect(),
            results: BTreeMap::new(),
            real_monthly_costs: BTreeMap::new(),
        }
    }

    /// Whether every pre-launch phase is 100% action-complete.
    #[must_use]
    pub fn pre_launch_complete(&self) -> bool {
        self.phases.len() >= PRE_LAUNCH_PHASES
            && self.phases[..PRE_LAUNCH_PHASES]
                .iter()
                .all(PlanningPhase::is_complete)
    }
}

/// Resolves a city's effective status from its stored status and plan.
///
/// Planning vs Expansion is derived, not stored: a city with an active plan
/// is Expansion once both pre-launch phases are complete, Planning until
/// then. Consolidated cities keep their status regardless of plan state,
/// and cities without a plan keep whatever was stored.
#[must_use]
pub fn derived_status(stored: CityStatus, plan: Option<&CityPlan>) -> CityStatus {
    if stored == CityStatus::Consolidated {
        return CityStatus::Consolidated;
    }
    match plan {
        Some(plan) if plan.pre_launch_complete() => CityStatus::Expansion,
        Some(_) => CityStatus::Planning,
        None => stored,
    }
}

/// A user-defined group of cities for aggregated reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketBlock {
    /// Block UUID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Member cities, in display order. Move operations keep a city in at
    /// most one block.
    pub city_ids: Vec<i32>,
}

/// An annotation label for planning actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag UUID.
    pub id: String,
    /// Label text.
    pub label: String,
    /// Display color (hex).
    pub color: String,
}

/// A person who can be assigned to planning actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Responsible {
    /// Responsible UUID.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Initials shown on avatars.
    pub initials: String,
    /// Display color (hex).
    pub color: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, m: u32) -> MonthKey {
        MonthKey::new(year, m).unwrap()
    }

    fn action(done: bool) -> PlanningAction {
        PlanningAction {
            id: "a1".to_string(),
            description: "Mapear pontos de apoio".to_string(),
            completed: done,
            created_at: Utc::now(),
            estimated_completion_date: None,
            drive_link: None,
            tag_ids: Vec::new(),
            responsible_id: None,
        }
    }

    #[test]
    fn template_order_is_fixed() {
        let plan = CityPlan::from_template(5107909, month(2025, 6));
        let names: Vec<&str> = plan.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, PHASE_TEMPLATE);
    }

    #[test]
    fn empty_phase_is_not_complete() {
        let phase = PlanningPhase::named("Análise & Viabilidade".to_string());
        assert!(!phase.is_complete());
        assert!((phase.progress() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_counts_completed_fraction() {
        let mut phase = PlanningPhase::named("Preparação Operacional".to_string());
        phase.actions = vec![action(true), action(true), action(false), action(false)];
        assert!((phase.progress() - 0.5).abs() < f64::EPSILON);
        assert!(!phase.is_complete());
    }

    #[test]
    fn completion_date_follows_action_state() {
        let mut phase = PlanningPhase::named("Análise & Viabilidade".to_string());
        phase.actions = vec![action(true)];

        phase.sync_completion_date(month(2025, 7));
        assert_eq!(phase.completion_date, Some(month(2025, 7)));

        // Completing again later must not move the stamp
        phase.sync_completion_date(month(2025, 9));
        assert_eq!(phase.completion_date, Some(month(2025, 7)));

        // Reopening an action clears it
        phase.actions[0].completed = false;
        phase.sync_completion_date(month(2025, 9));
        assert_eq!(phase.completion_date, None);
    }

    #[test]
    fn status_derives_from_pre_launch_phases() {
        let mut plan = CityPlan::from_template(1, month(2025, 6));
        assert_eq!(
            derived_status(CityStatus::NotServed, Some(&plan)),
            CityStatus::Planning
        );

        plan.phases[0].actions = vec![action(true)];
        plan.phases[1].actions = vec![action(true)];
        assert_eq!(
            derived_status(CityStatus::NotServed, Some(&plan)),
            CityStatus::Expansion
        );

        // One reopened pre-launch action drops the city back to Planning
        plan.phases[1].actions.push(action(false));
        assert_eq!(
            derived_status(CityStatus::Expansion, Some(&plan)),
            CityStatus::Planning
        );
    }

    #[test]
    fn consolidated_is_never_derived_away() {
        let plan = CityPlan::from_template(1, month(2025, 6));
        assert_eq!(
            derived_status(CityStatus::Consolidated, Some(&plan)),
            CityStatus::Consolidated
        );
    }

    #[test]
    fn no_plan_keeps_stored_status() {
        assert_eq!(
            derived_status(CityStatus::NotServed, None),
            CityStatus::NotServed
        );
    }

    #[test]
    fn real_costs_serialize_keyed_by_month() {
        let mut plan = CityPlan::from_template(1, month(2025, 6));
        plan.real_monthly_costs.insert(
            month(2025, 7),
            RealMonthlyCost {
                marketing_cost: 1_200.0,
                operational_cost: 340.0,
            },
        );
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"2025-07\""));
        let back: CityPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
