#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Planning state store backed by `SQLite`.
//!
//! One [`PlanningStore`] is constructed at startup and injected into
//! whatever needs it. It holds an in-memory snapshot (loaded once from the
//! database) and writes through on every mutation: the database write
//! happens first, the snapshot is updated after it succeeds. Last write
//! wins; there is no optimistic concurrency.
//!
//! Uses `switchy_database` for all database operations. Cities and the
//! small reference entities are relational rows; plans are stored as one
//! JSON document per city since they are always read and written whole.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};
use switchy_database_connection::init_sqlite_rusqlite;
use thiserror::Error;
use urban_passageiro_city_models::{City, CityStatus, Mesorregion, MonthKey};
use urban_passageiro_planning_models::{
    CityPlan, MarketBlock, MonthResult, PlanningAction, RealMonthlyCost, Responsible, Tag,
};

/// Errors from planning store operations.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored plan document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The referenced city does not exist.
    #[error("Unknown city {city_id}")]
    UnknownCity {
        /// IBGE code that did not resolve.
        city_id: i32,
    },

    /// The referenced city has no plan.
    #[error("City {city_id} has no plan")]
    NoPlan {
        /// IBGE code of the plan-less city.
        city_id: i32,
    },

    /// A referenced entity (tag, responsible, block, phase, action,
    /// month index) does not exist.
    #[error("Not found: {what}")]
    NotFound {
        /// Description of what was missing.
        what: String,
    },
}

/// Everything the store holds, cloned out to readers.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// All known cities.
    pub cities: Vec<City>,
    /// Active plans keyed by city id.
    pub plans: HashMap<i32, CityPlan>,
    /// Annotation tags.
    pub tags: Vec<Tag>,
    /// Assignable people.
    pub responsibles: Vec<Responsible>,
    /// Market blocks in display order.
    pub blocks: Vec<MarketBlock>,
}

/// Fields for a new planning action; ids and timestamps are assigned by
/// the store.
#[derive(Debug, Clone, Default)]
pub struct NewAction {
    /// What needs to be done.
    pub description: String,
    /// Target month, if any.
    pub estimated_completion_date: Option<MonthKey>,
    /// Link to supporting material.
    pub drive_link: Option<String>,
    /// Tags to attach.
    pub tag_ids: Vec<String>,
    /// Person accountable.
    pub responsible_id: Option<String>,
}

/// The shared planning state store.
pub struct PlanningStore {
    db: Box<dyn Database>,
    state: RwLock<Snapshot>,
}

impl PlanningStore {
    /// Opens (or creates) the planning database, ensures the schema, and
    /// loads the full snapshot into memory.
    ///
    /// `None` opens an in-memory database (used by tests).
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the database cannot be opened, the
    /// schema cannot be created, or the initial load fails.
    pub async fn open(path: Option<&Path>) -> Result<Self, PlanningError> {
        if let Some(parent) = path.and_then(Path::parent) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PlanningError::Database(e.to_string()))?;
        }

        let db = init_sqlite_rusqlite(path).map_err(|e| PlanningError::Database(e.to_string()))?;
        ensure_schema(db.as_ref()).await?;

        let store = Self {
            db,
            state: RwLock::new(Snapshot::default()),
        };
        store.reload().await?;
        Ok(store)
    }

    /// Re-reads the whole snapshot from the database.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if any query fails or a plan document is
    /// corrupt.
    pub async fn reload(&self) -> Result<(), PlanningError> {
        let snapshot = load_snapshot(self.db.as_ref()).await?;
        log::info!(
            "Loaded planning state: {} cities, {} plans, {} blocks",
            snapshot.cities.len(),
            snapshot.plans.len(),
            snapshot.blocks.len()
        );
        *self.write() = snapshot;
        Ok(())
    }

    // Lock poisoning is unrecoverable in-process state corruption for a
    // snapshot that can always be reloaded, so writers that panicked are
    // simply read through.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ── Read access ──────────────────────────────────────────────────

    /// Clones the full snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// All known cities.
    #[must_use]
    pub fn cities(&self) -> Vec<City> {
        self.read().cities.clone()
    }

    /// Looks up one city by IBGE code.
    #[must_use]
    pub fn city(&self, city_id: i32) -> Option<City> {
        self.read().cities.iter().find(|c| c.id == city_id).cloned()
    }

    /// The plan for a city, when one exists.
    #[must_use]
    pub fn plan(&self, city_id: i32) -> Option<CityPlan> {
        self.read().plans.get(&city_id).cloned()
    }

    /// All tags.
    #[must_use]
    pub fn tags(&self) -> Vec<Tag> {
        self.read().tags.clone()
    }

    /// All responsibles.
    #[must_use]
    pub fn responsibles(&self) -> Vec<Responsible> {
        self.read().responsibles.clone()
    }

    /// All market blocks, in display order.
    #[must_use]
    pub fn blocks(&self) -> Vec<MarketBlock> {
        self.read().blocks.clone()
    }

    // ── Cities ───────────────────────────────────────────────────────

    /// Inserts or updates a city row. Called by the census import and by
    /// tests; in-app mutation goes through
    /// [`PlanningStore::set_implementation_date`].
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the write fails.
    pub async fn upsert_city(&self, city: City) -> Result<(), PlanningError> {
        self.db
            .exec_raw_params(
                "INSERT INTO cities (id, name, population, population_15_to_44,
                                     average_income, mesorregion, status,
                                     implementation_start_date, urban_population,
                                     motorization_rate)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (id) DO UPDATE SET
                   name = excluded.name,
                   population = excluded.population,
                   population_15_to_44 = excluded.population_15_to_44,
                   average_income = excluded.average_income,
                   mesorregion = excluded.mesorregion,
                   status = excluded.status,
                   implementation_start_date = excluded.implementation_start_date,
                   urban_population = excluded.urban_population,
                   motorization_rate = excluded.motorization_rate",
                &[
                    DatabaseValue::Int32(city.id),
                    DatabaseValue::String(city.name.clone()),
                    DatabaseValue::Int64(to_i64(city.population)),
                    DatabaseValue::Int64(to_i64(city.population_15_to_44)),
                    DatabaseValue::Real64(city.average_income),
                    DatabaseValue::String(city.mesorregion.to_string()),
                    DatabaseValue::String(city.status.to_string()),
                    city.implementation_start_date
                        .map_or(DatabaseValue::Null, |m| DatabaseValue::String(m.to_string())),
                    city.urban_population
                        .map_or(DatabaseValue::Null, |p| DatabaseValue::Int64(to_i64(p))),
                    city.motorization_rate
                        .map_or(DatabaseValue::Null, DatabaseValue::Real64),
                ],
            )
            .await
            .map_err(db_err)?;

        let mut state = self.write();
        match state.cities.iter_mut().find(|c| c.id == city.id) {
            Some(existing) => *existing = city,
            None => state.cities.push(city),
        }
        Ok(())
    }

    /// Sets (or clears) a city's implementation start month.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::UnknownCity`] if the city does not exist,
    /// or a database error if the write fails.
    pub async fn set_implementation_date(
        &self,
        city_id: i32,
        date: Option<MonthKey>,
    ) -> Result<City, PlanningError> {
        if self.city(city_id).is_none() {
            return Err(PlanningError::UnknownCity { city_id });
        }

        self.db
            .exec_raw_params(
                "UPDATE cities SET implementation_start_date = $1 WHERE id = $2",
                &[
                    date.map_or(DatabaseValue::Null, |m| DatabaseValue::String(m.to_string())),
                    DatabaseValue::Int32(city_id),
                ],
            )
            .await
            .map_err(db_err)?;

        let mut state = self.write();
        let city = state
            .cities
            .iter_mut()
            .find(|c| c.id == city_id)
            .ok_or(PlanningError::UnknownCity { city_id })?;
        city.implementation_start_date = date;
        Ok(city.clone())
    }

    // ── Tags ─────────────────────────────────────────────────────────

    /// Creates a tag.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the write fails.
    pub async fn add_tag(&self, label: String, color: String) -> Result<Tag, PlanningError> {
        let tag = Tag {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            color,
        };
        self.db
            .exec_raw_params(
                "INSERT INTO tags (id, label, color) VALUES ($1, $2, $3)",
                &[
                    DatabaseValue::String(tag.id.clone()),
                    DatabaseValue::String(tag.label.clone()),
                    DatabaseValue::String(tag.color.clone()),
                ],
            )
            .await
            .map_err(db_err)?;

        self.write().tags.push(tag.clone());
        Ok(tag)
    }

    /// Updates a tag's label and color.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NotFound`] if the tag does not exist.
    pub async fn update_tag(&self, tag: Tag) -> Result<(), PlanningError> {
        let updated = self
            .db
            .exec_raw_params(
                "UPDATE tags SET label = $1, color = $2 WHERE id = $3",
                &[
                    DatabaseValue::String(tag.label.clone()),
                    DatabaseValue::String(tag.color.clone()),
                    DatabaseValue::String(tag.id.clone()),
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(PlanningError::NotFound {
                what: format!("tag {}", tag.id),
            });
        }

        let mut state = self.write();
        if let Some(existing) = state.tags.iter_mut().find(|t| t.id == tag.id) {
            *existing = tag;
        }
        Ok(())
    }

    /// Deletes a tag and strips it from every plan action that carried it.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if a write fails.
    pub async fn delete_tag(&self, tag_id: &str) -> Result<(), PlanningError> {
        self.db
            .exec_raw_params(
                "DELETE FROM tags WHERE id = $1",
                &[DatabaseValue::String(tag_id.to_string())],
            )
            .await
            .map_err(db_err)?;

        // Strip the tag from actions: persist each touched plan, then
        // apply to the snapshot
        let mut touched = Vec::new();
        for plan in self.read().plans.values() {
            let mut plan = plan.clone();
            let mut changed = false;
            for phase in &mut plan.phases {
                for action in &mut phase.actions {
                    let before = action.tag_ids.len();
                    action.tag_ids.retain(|id| id != tag_id);
                    changed |= action.tag_ids.len() != before;
                }
            }
            if changed {
                touched.push(plan);
            }
        }
        for plan in &touched {
            self.persist_plan(plan).await?;
        }

        let mut state = self.write();
        state.tags.retain(|t| t.id != tag_id);
        for plan in touched {
            state.plans.insert(plan.city_id, plan);
        }
        Ok(())
    }

    // ── Responsibles ─────────────────────────────────────────────────

    /// Creates a responsible.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the write fails.
    pub async fn add_responsible(
        &self,
        name: String,
        initials: String,
        color: String,
    ) -> Result<Responsible, PlanningError> {
        let responsible = Responsible {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            initials,
            color,
        };
        self.db
            .exec_raw_params(
                "INSERT INTO responsibles (id, name, initials, color) VALUES ($1, $2, $3, $4)",
                &[
                    DatabaseValue::String(responsible.id.clone()),
                    DatabaseValue::String(responsible.name.clone()),
                    DatabaseValue::String(responsible.initials.clone()),
                    DatabaseValue::String(responsible.color.clone()),
                ],
            )
            .await
            .map_err(db_err)?;

        self.write().responsibles.push(responsible.clone());
        Ok(responsible)
    }

    /// Updates a responsible.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NotFound`] if it does not exist.
    pub async fn update_responsible(&self, responsible: Responsible) -> Result<(), PlanningError> {
        let updated = self
            .db
            .exec_raw_params(
                "UPDATE responsibles SET name = $1, initials = $2, color = $3 WHERE id = $4",
                &[
                    DatabaseValue::String(responsible.name.clone()),
                    DatabaseValue::String(responsible.initials.clone()),
                    DatabaseValue::String(responsible.color.clone()),
                    DatabaseValue::String(responsible.id.clone()),
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(PlanningError::NotFound {
                what: format!("responsible {}", responsible.id),
            });
        }

        let mut state = self.write();
        if let Some(existing) = state
            .responsibles
            .iter_mut()
            .find(|r| r.id == responsible.id)
        {
            *existing = responsible;
        }
        Ok(())
    }

    /// Deletes a responsible and unassigns them from every action.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if a write fails.
    pub async fn delete_responsible(&self, responsible_id: &str) -> Result<(), PlanningError> {
        self.db
            .exec_raw_params(
                "DELETE FROM responsibles WHERE id = $1",
                &[DatabaseValue::String(responsible_id.to_string())],
            )
            .await
            .map_err(db_err)?;

        let mut touched = Vec::new();
        for plan in self.read().plans.values() {
            let mut plan = plan.clone();
            let mut changed = false;
            for phase in &mut plan.phases {
                for action in &mut phase.actions {
                    if action.responsible_id.as_deref() == Some(responsible_id) {
                        action.responsible_id = None;
                        changed = true;
                    }
                }
            }
            if changed {
                touched.push(plan);
            }
        }
        for plan in &touched {
            self.persist_plan(plan).await?;
        }

        let mut state = self.write();
        state.responsibles.retain(|r| r.id != responsible_id);
        for plan in touched {
            state.plans.insert(plan.city_id, plan);
        }
        Ok(())
    }

    // ── Market blocks ────────────────────────────────────────────────

    /// Creates an empty block at the end of the display order.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the write fails.
    pub async fn create_block(&self, name: String) -> Result<MarketBlock, PlanningError> {
        let block = MarketBlock {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            city_ids: Vec::new(),
        };
        let position = i64::try_from(self.read().blocks.len()).unwrap_or(i64::MAX);
        self.db
            .exec_raw_params(
                "INSERT INTO blocks (id, name, position) VALUES ($1, $2, $3)",
                &[
                    DatabaseValue::String(block.id.clone()),
                    DatabaseValue::String(block.name.clone()),
                    DatabaseValue::Int64(position),
                ],
            )
            .await
            .map_err(db_err)?;

        self.write().blocks.push(block.clone());
        Ok(block)
    }

    /// Renames a block.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NotFound`] if the block does not exist.
    pub async fn rename_block(&self, block_id: &str, name: String) -> Result<(), PlanningError> {
        let updated = self
            .db
            .exec_raw_params(
                "UPDATE blocks SET name = $1 WHERE id = $2",
                &[
                    DatabaseValue::String(name.clone()),
                    DatabaseValue::String(block_id.to_string()),
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(PlanningError::NotFound {
                what: format!("block {block_id}"),
            });
        }

        let mut state = self.write();
        if let Some(block) = state.blocks.iter_mut().find(|b| b.id == block_id) {
            block.name = name;
        }
        Ok(())
    }

    /// Deletes a block; its cities simply become unassigned.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the write fails.
    pub async fn delete_block(&self, block_id: &str) -> Result<(), PlanningError> {
        self.db
            .exec_raw_params(
                "DELETE FROM blocks WHERE id = $1",
                &[DatabaseValue::String(block_id.to_string())],
            )
            .await
            .map_err(db_err)?;
        self.db
            .exec_raw_params(
                "DELETE FROM block_cities WHERE block_id = $1",
                &[DatabaseValue::String(block_id.to_string())],
            )
            .await
            .map_err(db_err)?;

        self.write().blocks.retain(|b| b.id != block_id);
        Ok(())
    }

    /// Moves a city into `target_block_id`, or out of all blocks when
    /// `None`. Keeps the "at most one block per city" rule by removing the
    /// city from every other block first.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NotFound`] if the target block does not
    /// exist, or a database error if a write fails.
    pub async fn move_city_to_block(
        &self,
        city_id: i32,
        target_block_id: Option<&str>,
    ) -> Result<(), PlanningError> {
        if let Some(target) = target_block_id
            && !self.read().blocks.iter().any(|b| b.id == target)
        {
            return Err(PlanningError::NotFound {
                what: format!("block {target}"),
            });
        }

        self.db
            .exec_raw_params(
                "DELETE FROM block_cities WHERE city_id = $1",
                &[DatabaseValue::Int32(city_id)],
            )
            .await
            .map_err(db_err)?;

        if let Some(target) = target_block_id {
            self.db
                .exec_raw_params(
                    "INSERT INTO block_cities (block_id, city_id, position)
                     VALUES ($1, $2, (SELECT COALESCE(MAX(position), -1) + 1
                                      FROM block_cities WHERE block_id = $1))",
                    &[
                        DatabaseValue::String(target.to_string()),
                        DatabaseValue::Int32(city_id),
                    ],
                )
                .await
                .map_err(db_err)?;
        }

        let mut state = self.write();
        for block in &mut state.blocks {
            block.city_ids.retain(|id| *id != city_id);
        }
        if let Some(target) = target_block_id
            && let Some(block) = state.blocks.iter_mut().find(|b| b.id == target)
        {
            block.city_ids.push(city_id);
        }
        Ok(())
    }

    // ── Plans ────────────────────────────────────────────────────────

    /// Creates a plan for a city from the fixed phase template, starting
    /// at the given month. Returns the existing plan unchanged when one is
    /// already active (plan creation is idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::UnknownCity`] if the city does not exist,
    /// or a database error if the write fails.
    pub async fn create_plan(
        &self,
        city_id: i32,
        start_date: MonthKey,
    ) -> Result<CityPlan, PlanningError> {
        if self.city(city_id).is_none() {
            return Err(PlanningError::UnknownCity { city_id });
        }
        if let Some(existing) = self.plan(city_id) {
            return Ok(existing);
        }

        let plan = CityPlan::from_template(city_id, start_date);
        self.persist_plan(&plan).await?;
        self.write().plans.insert(city_id, plan.clone());
        Ok(plan)
    }

    /// Deletes a city's plan.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the write fails.
    pub async fn delete_plan(&self, city_id: i32) -> Result<(), PlanningError> {
        self.db
            .exec_raw_params(
                "DELETE FROM plans WHERE city_id = $1",
                &[DatabaseValue::Int32(city_id)],
            )
            .await
            .map_err(db_err)?;
        self.write().plans.remove(&city_id);
        Ok(())
    }

    /// Sets a phase's start and estimated-completion months. The actual
    /// completion month is managed automatically from action completion
    /// and cannot be set here.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the city has no plan or the phase
    /// index is out of range.
    pub async fn set_phase_dates(
        &self,
        city_id: i32,
        phase_index: usize,
        start_date: Option<MonthKey>,
        estimated_completion_date: Option<MonthKey>,
    ) -> Result<CityPlan, PlanningError> {
        self.mutate_plan(city_id, |plan| {
            let phase = plan
                .phases
                .get_mut(phase_index)
                .ok_or(PlanningError::NotFound {
                    what: format!("phase {phase_index} of city {city_id}"),
                })?;
            phase.start_date = start_date;
            phase.estimated_completion_date = estimated_completion_date;
            Ok(())
        })
        .await
    }

    /// Adds an action to a phase.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`] if the city has no plan or the phase
    /// index is out of range.
    pub async fn add_action(
        &self,
        city_id: i32,
        phase_index: usize,
        new_action: NewAction,
    ) -> Result<PlanningAction, PlanningError> {
        let action = PlanningAction {
            id: uuid::Uuid::new_v4().to_string(),
            description: new_action.description,
            completed: false,
            created_at: chrono::Utc::now(),
            estimated_completion_date: new_action.estimated_completion_date,
            drive_link: new_action.drive_link,
            tag_ids: new_action.tag_ids,
            responsible_id: new_action.responsible_id,
        };

        let inserted = action.clone();
        self.mutate_plan(city_id, move |plan| {
            let phase = plan
                .phases
                .get_mut(phase_index)
                .ok_or(PlanningError::NotFound {
                    what: format!("phase {phase_index} of city {city_id}"),
                })?;
            phase.actions.push(inserted);
            phase.sync_completion_date(MonthKey::now());
            Ok(())
        })
        .await?;
        Ok(action)
    }

    /// Replaces an action's editable fields, matched by id.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NotFound`] if the action does not exist.
    pub async fn update_action(
        &self,
        city_id: i32,
        phase_index: usize,
        action: PlanningAction,
    ) -> Result<CityPlan, PlanningError> {
        self.mutate_plan(city_id, move |plan| {
            let phase = plan
                .phases
                .get_mut(phase_index)
                .ok_or(PlanningError::NotFound {
                    what: format!("phase {phase_index} of city {city_id}"),
                })?;
            let existing = phase
                .actions
                .iter_mut()
                .find(|a| a.id == action.id)
                .ok_or(PlanningError::NotFound {
                    what: format!("action {}", action.id),
                })?;
            *existing = action;
            phase.sync_completion_date(MonthKey::now());
            Ok(())
        })
        .await
    }

    /// Toggles an action's completed flag, resyncing the phase completion
    /// month.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NotFound`] if the action does not exist.
    pub async fn toggle_action(
        &self,
        city_id: i32,
        phase_index: usize,
        action_id: &str,
    ) -> Result<CityPlan, PlanningError> {
        let action_id = action_id.to_string();
        self.mutate_plan(city_id, move |plan| {
            let phase = plan
                .phases
                .get_mut(phase_index)
                .ok_or(PlanningError::NotFound {
                    what: format!("phase {phase_index} of city {city_id}"),
                })?;
            let action = phase
                .actions
                .iter_mut()
                .find(|a| a.id == action_id)
                .ok_or(PlanningError::NotFound {
                    what: format!("action {action_id}"),
                })?;
            action.completed = !action.completed;
            phase.sync_completion_date(MonthKey::now());
            Ok(())
        })
        .await
    }

    /// Deletes an action.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NotFound`] if the action does not exist.
    pub async fn delete_action(
        &self,
        city_id: i32,
        phase_index: usize,
        action_id: &str,
    ) -> Result<CityPlan, PlanningError> {
        let action_id = action_id.to_string();
        self.mutate_plan(city_id, move |plan| {
            let phase = plan
                .phases
                .get_mut(phase_index)
                .ok_or(PlanningError::NotFound {
                    what: format!("phase {phase_index} of city {city_id}"),
                })?;
            let before = phase.actions.len();
            phase.actions.retain(|a| a.id != action_id);
            if phase.actions.len() == before {
                return Err(PlanningError::NotFound {
                    what: format!("action {action_id}"),
                });
            }
            phase.sync_completion_date(MonthKey::now());
            Ok(())
        })
        .await
    }

    /// Records user-entered actuals for a relative implementation month
    /// (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NoPlan`] if the city has no plan, or
    /// [`PlanningError::NotFound`] for month index 0: no ramp month maps
    /// to it, so a stored entry would never be read back.
    pub async fn set_month_result(
        &self,
        city_id: i32,
        month_index: u32,
        result: MonthResult,
    ) -> Result<CityPlan, PlanningError> {
        if month_index == 0 {
            return Err(PlanningError::NotFound {
                what: format!("month 0 of city {city_id} (months are 1-based)"),
            });
        }
        self.mutate_plan(city_id, move |plan| {
            plan.results.insert(month_index, result);
            Ok(())
        })
        .await
    }

    /// Records measured costs for an absolute calendar month.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NoPlan`] if the city has no plan.
    pub async fn set_real_monthly_cost(
        &self,
        city_id: i32,
        month: MonthKey,
        cost: RealMonthlyCost,
    ) -> Result<CityPlan, PlanningError> {
        self.mutate_plan(city_id, move |plan| {
            plan.real_monthly_costs.insert(month, cost);
            Ok(())
        })
        .await
    }

    /// Applies `mutate` to the city's plan, persists the result, and
    /// updates the snapshot. The database write happens on a copy; memory
    /// is only touched after it succeeds.
    async fn mutate_plan<F>(&self, city_id: i32, mutate: F) -> Result<CityPlan, PlanningError>
    where
        F: FnOnce(&mut CityPlan) -> Result<(), PlanningError>,
    {
        let mut plan = self
            .plan(city_id)
            .ok_or(PlanningError::NoPlan { city_id })?;
        mutate(&mut plan)?;
        self.persist_plan(&plan).await?;
        self.write().plans.insert(city_id, plan.clone());
        Ok(plan)
    }

    async fn persist_plan(&self, plan: &CityPlan) -> Result<(), PlanningError> {
        let document = serde_json::to_string(plan)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .exec_raw_params(
                "INSERT INTO plans (city_id, data, updated_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (city_id) DO UPDATE SET
                   data = excluded.data,
                   updated_at = excluded.updated_at",
                &[
                    DatabaseValue::Int32(plan.city_id),
                    DatabaseValue::String(document),
                    DatabaseValue::String(now),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn db_err(e: switchy_database::DatabaseError) -> PlanningError {
    PlanningError::Database(e.to_string())
}

#[allow(clippy::cast_possible_wrap)]
const fn to_i64(value: u64) -> i64 {
    if value > i64::MAX as u64 {
        i64::MAX
    } else {
        value as i64
    }
}

#[allow(clippy::cast_sign_loss)]
const fn to_u64(value: i64) -> u64 {
    if value < 0 { 0 } else { value as u64 }
}

/// Creates all tables if they don't already exist.
async fn ensure_schema(db: &dyn Database) -> Result<(), PlanningError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS cities (
            id                          INTEGER PRIMARY KEY,
            name                        TEXT NOT NULL,
            population                  INTEGER NOT NULL,
            population_15_to_44         INTEGER NOT NULL,
            average_income              REAL NOT NULL,
            mesorregion                 TEXT NOT NULL,
            status                      TEXT NOT NULL,
            implementation_start_date   TEXT,
            urban_population            INTEGER,
            motorization_rate           REAL
        )",
    )
    .await
    .map_err(db_err)?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS plans (
            city_id     INTEGER PRIMARY KEY REFERENCES cities(id),
            data        TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        )",
    )
    .await
    .map_err(db_err)?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS tags (
            id     TEXT PRIMARY KEY,
            label  TEXT NOT NULL,
            color  TEXT NOT NULL
        )",
    )
    .await
    .map_err(db_err)?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS responsibles (
            id        TEXT PRIMARY KEY,
            name      TEXT NOT NULL,
            initials  TEXT NOT NULL,
            color     TEXT NOT NULL
        )",
    )
    .await
    .map_err(db_err)?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS blocks (
            id        TEXT PRIMARY KEY,
            name      TEXT NOT NULL,
            position  INTEGER NOT NULL
        )",
    )
    .await
    .map_err(db_err)?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS block_cities (
            block_id  TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
            city_id   INTEGER NOT NULL,
            position  INTEGER NOT NULL
        )",
    )
    .await
    .map_err(db_err)?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_block_cities_block
         ON block_cities (block_id, position)",
    )
    .await
    .map_err(db_err)?;

    Ok(())
}

/// Reads the whole planning state from the database.
async fn load_snapshot(db: &dyn Database) -> Result<Snapshot, PlanningError> {
    let mut snapshot = Snapshot::default();

    let rows = db
        .query_raw_params("SELECT * FROM cities ORDER BY name", &[])
        .await
        .map_err(db_err)?;
    for row in &rows {
        let mesorregion: String = row.to_value("mesorregion").unwrap_or_default();
        let status: String = row.to_value("status").unwrap_or_default();
        let start_date: Option<String> =
            row.to_value("implementation_start_date").unwrap_or(None);
        let population: i64 = row.to_value("population").unwrap_or(0);
        let population_15_to_44: i64 = row.to_value("population_15_to_44").unwrap_or(0);
        let urban_population: Option<i64> = row.to_value("urban_population").unwrap_or(None);

        snapshot.cities.push(City {
            id: row.to_value("id").unwrap_or(0),
            name: row.to_value("name").unwrap_or_default(),
            population: to_u64(population),
            population_15_to_44: to_u64(population_15_to_44),
            average_income: row.to_value("average_income").unwrap_or(0.0),
            mesorregion: mesorregion.parse().unwrap_or(Mesorregion::CentroSul),
            status: status.parse().unwrap_or(CityStatus::NotServed),
            implementation_start_date: start_date.and_then(|s| s.parse().ok()),
            urban_population: urban_population.map(to_u64),
            motorization_rate: row.to_value("motorization_rate").unwrap_or(None),
        });
    }

    let rows = db
        .query_raw_params("SELECT city_id, data FROM plans", &[])
        .await
        .map_err(db_err)?;
    for row in &rows {
        let city_id: i32 = row.to_value("city_id").unwrap_or(0);
        let document: String = row.to_value("data").unwrap_or_default();
        let plan: CityPlan = serde_json::from_str(&document)?;
        snapshot.plans.insert(city_id, plan);
    }

    let rows = db
        .query_raw_params("SELECT id, label, color FROM tags ORDER BY label", &[])
        .await
        .map_err(db_err)?;
    for row in &rows {
        snapshot.tags.push(Tag {
            id: row.to_value("id").unwrap_or_default(),
            label: row.to_value("label").unwrap_or_default(),
            color: row.to_value("color").unwrap_or_default(),
        });
    }

    let rows = db
        .query_raw_params(
            "SELECT id, name, initials, color FROM responsibles ORDER BY name",
            &[],
        )
        .await
        .map_err(db_err)?;
    for row in &rows {
        snapshot.responsibles.push(Responsible {
            id: row.to_value("id").unwrap_or_default(),
            name: row.to_value("name").unwrap_or_default(),
            initials: row.to_value("initials").unwrap_or_default(),
            color: row.to_value("color").unwrap_or_default(),
        });
    }

    let rows = db
        .query_raw_params("SELECT id, name FROM blocks ORDER BY position", &[])
        .await
        .map_err(db_err)?;
    for row in &rows {
        snapshot.blocks.push(MarketBlock {
            id: row.to_value("id").unwrap_or_default(),
            name: row.to_value("name").unwrap_or_default(),
            city_ids: Vec::new(),
        });
    }

    let rows = db
        .query_raw_params(
            "SELECT block_id, city_id FROM block_cities ORDER BY block_id, position",
            &[],
        )
        .await
        .map_err(db_err)?;
    for row in &rows {
        let block_id: String = row.to_value("block_id").unwrap_or_default();
        let city_id: i32 = row.to_value("city_id").unwrap_or(0);
        if let Some(block) = snapshot.blocks.iter_mut().find(|b| b.id == block_id) {
            block.city_ids.push(city_id);
        }
    }

    Ok(snapshot)
}
