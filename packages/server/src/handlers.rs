//! HTTP handler functions for the expansion planning API.

use actix_web::{HttpResponse, web};
use urban_passageiro_city_models::MonthKey;
use urban_passageiro_goals::{curve, potential};
use urban_passageiro_planning::{NewAction, PlanningError};
use urban_passageiro_planning_models::{
    MarketBlock, MonthResult, PlanningAction, RealMonthlyCost, Responsible, Tag,
};
use urban_passageiro_server_models::{
    ActionRequest, ApiCity, ApiError, ApiHealth, ApiPotential, BlockNameRequest,
    CreatePlanRequest, ImplementationDateRequest, MonthResultRequest, MoveCityRequest,
    PhaseDatesRequest, RealCostRequest, ResponsibleRequest, TagRequest,
};

use crate::AppState;

/// Maps a store error onto the HTTP status it deserves. Missing
/// entities are 404s; everything else is a 500 and gets logged.
fn store_error(context: &str, e: &PlanningError) -> HttpResponse {
    match e {
        PlanningError::UnknownCity { .. }
        | PlanningError::NoPlan { .. }
        | PlanningError::NotFound { .. } => HttpResponse::NotFound().json(ApiError::new(e.to_string())),
        PlanningError::Database(_) | PlanningError::Json(_) => {
            log::error!("{context}: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(context))
        }
    }
}

/// Finds the block a city belongs to, if any.
fn block_of(blocks: &[MarketBlock], city_id: i32) -> Option<String> {
    blocks
        .iter()
        .find(|b| b.city_ids.contains(&city_id))
        .map(|b| b.id.clone())
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/cities`
///
/// All municipalities with their derived status and block membership.
pub async fn cities(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.store.snapshot();
    let api_cities: Vec<ApiCity> = snapshot
        .cities
        .iter()
        .map(|city| {
            ApiCity::from_parts(
                city.clone(),
                snapshot.plans.get(&city.id),
                block_of(&snapshot.blocks, city.id),
            )
        })
        .collect();
    HttpResponse::Ok().json(api_cities)
}

/// `GET /api/cities/{id}`
pub async fn city(state: web::Data<AppState>, path: web::Path<i32>) -> HttpResponse {
    let city_id = path.into_inner();
    let snapshot = state.store.snapshot();
    snapshot.cities.iter().find(|c| c.id == city_id).map_or_else(
        || HttpResponse::NotFound().json(ApiError::new(format!("Unknown city {city_id}"))),
        |city| {
            HttpResponse::Ok().json(ApiCity::from_parts(
                city.clone(),
                snapshot.plans.get(&city_id),
                block_of(&snapshot.blocks, city_id),
            ))
        },
    )
}

/// `PUT /api/cities/{id}/implementation-date`
pub async fn set_implementation_date(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    body: web::Json<ImplementationDateRequest>,
) -> HttpResponse {
    let city_id = path.into_inner();
    match state
        .store
        .set_implementation_date(city_id, body.into_inner().date)
        .await
    {
        Ok(city) => {
            let snapshot = state.store.snapshot();
            HttpResponse::Ok().json(ApiCity::from_parts(
                city,
                snapshot.plans.get(&city_id),
                block_of(&snapshot.blocks, city_id),
            ))
        }
        Err(e) => store_error("Failed to set implementation date", &e),
    }
}

/// `GET /api/cities/{id}/potential`
///
/// The five penetration scenarios for a city's addressable market.
pub async fn potential(state: web::Data<AppState>, path: web::Path<i32>) -> HttpResponse {
    let city_id = path.into_inner();
    let Some(city) = state.store.city(city_id) else {
        return HttpResponse::NotFound().json(ApiError::new(format!("Unknown city {city_id}")));
    };

    let economics = state.aggregator.economics();
    HttpResponse::Ok().json(ApiPotential {
        city_id,
        market_potential: curve::theoretical_plateau_goal(&city, economics),
        scenarios: potential::market_potential(&city, economics),
    })
}

/// `GET /api/cities/{id}/projection`
///
/// Per-month reconciled projection plus the breakeven verdict.
pub async fn projection(state: web::Data<AppState>, path: web::Path<i32>) -> HttpResponse {
    let city_id = path.into_inner();
    let Some(city) = state.store.city(city_id) else {
        return HttpResponse::NotFound().json(ApiError::new(format!("Unknown city {city_id}")));
    };

    let plan = state.store.plan(city_id);
    let projection = state
        .aggregator
        .city_projection(&city, plan.as_ref(), MonthKey::now())
        .await;
    HttpResponse::Ok().json(projection)
}

// ── Blocks ───────────────────────────────────────────────────────────

/// `GET /api/blocks`
pub async fn blocks(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.blocks())
}

/// `POST /api/blocks`
pub async fn create_block(
    state: web::Data<AppState>,
    body: web::Json<BlockNameRequest>,
) -> HttpResponse {
    match state.store.create_block(body.into_inner().name).await {
        Ok(block) => HttpResponse::Created().json(block),
        Err(e) => store_error("Failed to create block", &e),
    }
}

/// `PUT /api/blocks/{id}`
pub async fn rename_block(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<BlockNameRequest>,
) -> HttpResponse {
    let block_id = path.into_inner();
    match state
        .store
        .rename_block(&block_id, body.into_inner().name)
        .await
    {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to rename block", &e),
    }
}

/// `DELETE /api/blocks/{id}`
pub async fn delete_block(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let block_id = path.into_inner();
    match state.store.delete_block(&block_id).await {
        Ok(()) => {
            state
                .block_stats
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&block_id);
            HttpResponse::NoContent().finish()
        }
        Err(e) => store_error("Failed to delete block", &e),
    }
}

/// `POST /api/blocks/{id}/cities`
///
/// Moves a city into this block, removing it from any other first.
pub async fn move_city_to_block(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<MoveCityRequest>,
) -> HttpResponse {
    let block_id = path.into_inner();
    match state
        .store
        .move_city_to_block(body.city_id, Some(&block_id))
        .await
    {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to move city to block", &e),
    }
}

/// `DELETE /api/blocks/{id}/cities/{city_id}`
///
/// Removes a city from its block.
pub async fn remove_city_from_block(
    state: web::Data<AppState>,
    path: web::Path<(String, i32)>,
) -> HttpResponse {
    let (_, city_id) = path.into_inner();
    match state.store.move_city_to_block(city_id, None).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to remove city from block", &e),
    }
}

/// `GET /api/blocks/{id}/stats`
///
/// Served from the periodically refreshed cache; blocks created since
/// the last sweep are computed on demand.
pub async fn block_stats(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let block_id = path.into_inner();

    let cached = state
        .block_stats
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&block_id)
        .cloned();
    if let Some(stats) = cached {
        return HttpResponse::Ok().json(stats);
    }

    let snapshot = state.store.snapshot();
    let Some(block) = snapshot.blocks.iter().find(|b| b.id == block_id) else {
        return HttpResponse::NotFound().json(ApiError::new(format!("Unknown block {block_id}")));
    };

    let stats = state
        .aggregator
        .block_stats(block, &snapshot.cities, &snapshot.plans, MonthKey::now())
        .await;
    state
        .block_stats
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .insert(block_id, stats.clone());
    HttpResponse::Ok().json(stats)
}

// ── Plans ────────────────────────────────────────────────────────────

/// `GET /api/plans/{city_id}`
pub async fn plan(state: web::Data<AppState>, path: web::Path<i32>) -> HttpResponse {
    let city_id = path.into_inner();
    state.store.plan(city_id).map_or_else(
        || HttpResponse::NotFound().json(ApiError::new(format!("City {city_id} has no plan"))),
        |plan| HttpResponse::Ok().json(plan),
    )
}

/// `POST /api/plans/{city_id}`
///
/// Creates a plan from the fixed phase template. Returns the existing
/// plan unchanged when one is already active.
pub async fn create_plan(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    body: web::Json<CreatePlanRequest>,
) -> HttpResponse {
    match state
        .store
        .create_plan(path.into_inner(), body.into_inner().start_date)
        .await
    {
        Ok(plan) => HttpResponse::Created().json(plan),
        Err(e) => store_error("Failed to create plan", &e),
    }
}

/// `DELETE /api/plans/{city_id}`
pub async fn delete_plan(state: web::Data<AppState>, path: web::Path<i32>) -> HttpResponse {
    match state.store.delete_plan(path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to delete plan", &e),
    }
}

/// `PUT /api/plans/{city_id}/phases/{index}`
pub async fn set_phase_dates(
    state: web::Data<AppState>,
    path: web::Path<(i32, usize)>,
    body: web::Json<PhaseDatesRequest>,
) -> HttpResponse {
    let (city_id, index) = path.into_inner();
    let body = body.into_inner();
    match state
        .store
        .set_phase_dates(city_id, index, body.start_date, body.estimated_completion_date)
        .await
    {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => store_error("Failed to set phase dates", &e),
    }
}

/// `POST /api/plans/{city_id}/phases/{index}/actions`
pub async fn add_action(
    state: web::Data<AppState>,
    path: web::Path<(i32, usize)>,
    body: web::Json<ActionRequest>,
) -> HttpResponse {
    let (city_id, index) = path.into_inner();
    let body = body.into_inner();
    let new_action = NewAction {
        description: body.description,
        estimated_completion_date: body.estimated_completion_date,
        drive_link: body.drive_link,
        tag_ids: body.tag_ids,
        responsible_id: body.responsible_id,
    };
    match state.store.add_action(city_id, index, new_action).await {
        Ok(action) => HttpResponse::Created().json(action),
        Err(e) => store_error("Failed to add action", &e),
    }
}

/// `PUT /api/plans/{city_id}/phases/{index}/actions/{action_id}`
///
/// Replaces the action's editable fields; id, completion flag, and
/// creation timestamp are preserved from the stored action.
pub async fn update_action(
    state: web::Data<AppState>,
    path: web::Path<(i32, usize, String)>,
    body: web::Json<ActionRequest>,
) -> HttpResponse {
    let (city_id, index, action_id) = path.into_inner();

    let Some(stored) = state.store.plan(city_id).and_then(|plan| {
        plan.phases
            .get(index)
            .and_then(|phase| phase.actions.iter().find(|a| a.id == action_id).cloned())
    }) else {
        return HttpResponse::NotFound().json(ApiError::new(format!("Not found: action {action_id}")));
    };

    let body = body.into_inner();
    let action = PlanningAction {
        description: body.description,
        estimated_completion_date: body.estimated_completion_date,
        drive_link: body.drive_link,
        tag_ids: body.tag_ids,
        responsible_id: body.responsible_id,
        ..stored
    };
    match state.store.update_action(city_id, index, action).await {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => store_error("Failed to update action", &e),
    }
}

/// `POST /api/plans/{city_id}/phases/{index}/actions/{action_id}/toggle`
pub async fn toggle_action(
    state: web::Data<AppState>,
    path: web::Path<(i32, usize, String)>,
) -> HttpResponse {
    let (city_id, index, action_id) = path.into_inner();
    match state.store.toggle_action(city_id, index, &action_id).await {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => store_error("Failed to toggle action", &e),
    }
}

/// `DELETE /api/plans/{city_id}/phases/{index}/actions/{action_id}`
pub async fn delete_action(
    state: web::Data<AppState>,
    path: web::Path<(i32, usize, String)>,
) -> HttpResponse {
    let (city_id, index, action_id) = path.into_inner();
    match state.store.delete_action(city_id, index, &action_id).await {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => store_error("Failed to delete action", &e),
    }
}

/// `PUT /api/plans/{city_id}/results/{month_index}`
pub async fn set_month_result(
    state: web::Data<AppState>,
    path: web::Path<(i32, u32)>,
    body: web::Json<MonthResultRequest>,
) -> HttpResponse {
    let (city_id, month_index) = path.into_inner();
    let body = body.into_inner();
    let result = MonthResult {
        rides: body.rides,
        marketing_cost: body.marketing_cost,
        operational_cost: body.operational_cost,
    };
    match state
        .store
        .set_month_result(city_id, month_index, result)
        .await
    {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => store_error("Failed to set month result", &e),
    }
}

/// `PUT /api/plans/{city_id}/real-costs/{month}`
///
/// `month` is an absolute calendar month in `YYYY-MM` form.
pub async fn set_real_monthly_cost(
    state: web::Data<AppState>,
    path: web::Path<(i32, String)>,
    body: web::Json<RealCostRequest>,
) -> HttpResponse {
    let (city_id, month) = path.into_inner();
    let Ok(month) = month.parse::<MonthKey>() else {
        return HttpResponse::BadRequest()
            .json(ApiError::new(format!("Invalid month key: {month}")));
    };

    let body = body.into_inner();
    let cost = RealMonthlyCost {
        marketing_cost: body.marketing_cost,
        operational_cost: body.operational_cost,
    };
    match state
        .store
        .set_real_monthly_cost(city_id, month, cost)
        .await
    {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => store_error("Failed to set real monthly cost", &e),
    }
}

// ── Tags ─────────────────────────────────────────────────────────────

/// `GET /api/tags`
pub async fn tags(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.tags())
}

/// `POST /api/tags`
pub async fn create_tag(state: web::Data<AppState>, body: web::Json<TagRequest>) -> HttpResponse {
    let body = body.into_inner();
    match state.store.add_tag(body.label, body.color).await {
        Ok(tag) => HttpResponse::Created().json(tag),
        Err(e) => store_error("Failed to create tag", &e),
    }
}

/// `PUT /api/tags/{id}`
pub async fn update_tag(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<TagRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let tag = Tag {
        id: path.into_inner(),
        label: body.label,
        color: body.color,
    };
    match state.store.update_tag(tag).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to update tag", &e),
    }
}

/// `DELETE /api/tags/{id}`
///
/// Also strips the tag from every plan action that carried it.
pub async fn delete_tag(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.store.delete_tag(&path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to delete tag", &e),
    }
}

// ── Responsibles ─────────────────────────────────────────────────────

/// `GET /api/responsibles`
pub async fn responsibles(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.responsibles())
}

/// `POST /api/responsibles`
pub async fn create_responsible(
    state: web::Data<AppState>,
    body: web::Json<ResponsibleRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    match state
        .store
        .add_responsible(body.name, body.initials, body.color)
        .await
    {
        Ok(responsible) => HttpResponse::Created().json(responsible),
        Err(e) => store_error("Failed to create responsible", &e),
    }
}

/// `PUT /api/responsibles/{id}`
pub async fn update_responsible(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ResponsibleRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let responsible = Responsible {
        id: path.into_inner(),
        name: body.name,
        initials: body.initials,
        color: body.color,
    };
    match state.store.update_responsible(responsible).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to update responsible", &e),
    }
}

/// `DELETE /api/responsibles/{id}`
///
/// Also unassigns them from every plan action.
pub async fn delete_responsible(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    match state.store.delete_responsible(&path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error("Failed to delete responsible", &e),
    }
}

// ── Rides pass-through ───────────────────────────────────────────────

/// `GET /api/rides/status`
pub async fn rides_status(state: web::Data<AppState>) -> HttpResponse {
    match state.rides.status().await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => {
            log::error!("Failed to fetch rides status: {e}");
            HttpResponse::BadGateway().json(ApiError::new("Rides API unavailable"))
        }
    }
}

/// `GET /api/rides/cities`
///
/// City names known to the rides API (cached 30 s upstream).
pub async fn rides_cities(state: web::Data<AppState>) -> HttpResponse {
    match state.rides.cities().await {
        Ok(cities) => HttpResponse::Ok().json(cities),
        Err(e) => {
            log::error!("Failed to fetch rides cities: {e}");
            HttpResponse::BadGateway().json(ApiError::new("Rides API unavailable"))
        }
    }
}
