#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the expansion planning dashboard.
//!
//! Serves the REST API the dashboard frontend consumes: cities with
//! derived status, market potential scenarios, reconciled financial
//! projections, market block aggregation, and the full planning CRUD
//! surface. Planning state is persisted in a `SQLite` database at
//! `data/planning.db`; ride telemetry comes from the rides API over
//! HTTP. Block statistics are recomputed in the background every 60
//! seconds so reads never fan out on the request path.

mod handlers;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use urban_passageiro_city_models::MonthKey;
use urban_passageiro_goals::Economics;
use urban_passageiro_planning::PlanningStore;
use urban_passageiro_projection::ProjectionAggregator;
use urban_passageiro_projection_models::BlockStats;
use urban_passageiro_rides::RidesClient;

/// How often the background task recomputes block statistics.
pub const BLOCK_STATS_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state.
pub struct AppState {
    /// Planning state store (cities, plans, blocks, tags, responsibles).
    pub store: Arc<PlanningStore>,
    /// Projection aggregator reading ride telemetry.
    pub aggregator: Arc<ProjectionAggregator>,
    /// Rides API client for pass-through telemetry endpoints.
    pub rides: Arc<RidesClient>,
    /// Most recent block statistics, keyed by block id. Refreshed by the
    /// background task and on demand for blocks created since the last
    /// sweep.
    pub block_stats: RwLock<HashMap<String, BlockStats>>,
}

/// Recomputes statistics for every block and swaps the cache.
///
/// Failures inside the aggregator degrade to zeros and are logged there;
/// this function itself cannot fail.
pub async fn refresh_block_stats(state: &AppState) {
    let snapshot = state.store.snapshot();
    let now = MonthKey::now();

    let mut fresh = HashMap::with_capacity(snapshot.blocks.len());
    for block in &snapshot.blocks {
        let stats = state
            .aggregator
            .block_stats(block, &snapshot.cities, &snapshot.plans, now)
            .await;
        fresh.insert(block.id.clone(), stats);
    }

    log::debug!("Refreshed statistics for {} blocks", fresh.len());
    *state
        .block_stats
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner) = fresh;
}

fn planning_db_path() -> PathBuf {
    std::env::var("PLANNING_DB_PATH")
        .map_or_else(|_| PathBuf::from("data/planning.db"), PathBuf::from)
}

fn rides_api_url() -> String {
    std::env::var("RIDES_API_URL").unwrap_or_else(|_| "http://127.0.0.1:3000/api".to_string())
}

/// Starts the expansion planning API server.
///
/// Opens the planning `SQLite` database, loads the economics config,
/// connects the rides API client, spawns the periodic block statistics
/// refresh, and starts the Actix-Web HTTP server. This is a regular
/// async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind
/// or encounters a runtime error.
///
/// # Panics
///
/// Panics if the planning database cannot be opened, a configured
/// economics file cannot be loaded, or the rides API base URL is
/// malformed.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let db_path = planning_db_path();
    log::info!("Opening planning database at {}...", db_path.display());
    let store = PlanningStore::open(Some(&db_path))
        .await
        .expect("Failed to open planning database");

    let economics_path = std::env::var("ECONOMICS_CONFIG").ok().map(PathBuf::from);
    let economics = Economics::load_or_default(economics_path.as_deref())
        .expect("Failed to load economics config");

    let rides_url = rides_api_url();
    log::info!("Rides API at {rides_url}");
    let rides = Arc::new(RidesClient::new(&rides_url).expect("Invalid rides API base URL"));

    let aggregator = Arc::new(ProjectionAggregator::new(rides.clone(), economics));

    let state = web::Data::new(AppState {
        store: Arc::new(store),
        aggregator,
        rides,
        block_stats: RwLock::new(HashMap::new()),
    });

    // Warm the cache once, then keep it fresh in the background
    refresh_block_stats(&state).await;
    let task_state = state.clone();
    actix_rt::spawn(async move {
        let mut ticker = tokio::time::interval(BLOCK_STATS_REFRESH_INTERVAL);
        ticker.tick().await; // first tick fires immediately; already warmed
        loop {
            ticker.tick().await;
            refresh_block_stats(&task_state).await;
        }
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/cities", web::get().to(handlers::cities))
                    .route("/cities/{id}", web::get().to(handlers::city))
                    .route(
                        "/cities/{id}/implementation-date",
                        web::put().to(handlers::set_implementation_date),
                    )
                    .route("/cities/{id}/potential", web::get().to(handlers::potential))
                    .route(
                        "/cities/{id}/projection",
                        web::get().to(handlers::projection),
                    )
                    .route("/blocks", web::get().to(handlers::blocks))
                    .route("/blocks", web::post().to(handlers::create_block))
                    .route("/blocks/{id}", web::put().to(handlers::rename_block))
                    .route("/blocks/{id}", web::delete().to(handlers::delete_block))
                    .route(
                        "/blocks/{id}/cities",
                        web::post().to(handlers::move_city_to_block),
                    )
                    .route(
                        "/blocks/{id}/cities/{city_id}",
                        web::delete().to(handlers::remove_city_from_block),
                    )
                    .route("/blocks/{id}/stats", web::get().to(handlers::block_stats))
                    .route("/plans/{city_id}", web::get().to(handlers::plan))
                    .route("/plans/{city_id}", web::post().to(handlers::create_plan))
                    .route("/plans/{city_id}", web::delete().to(handlers::delete_plan))
                    .route(
                        "/plans/{city_id}/phases/{index}",
                        web::put().to(handlers::set_phase_dates),
                    )
                    .route(
                        "/plans/{city_id}/phases/{index}/actions",
                        web::post().to(handlers::add_action),
                    )
                    .route(
                        "/plans/{city_id}/phases/{index}/actions/{action_id}",
                        web::put().to(handlers::update_action),
                    )
                    .route(
                        "/plans/{city_id}/phases/{index}/actions/{action_id}/toggle",
                        web::post().to(handlers::toggle_action),
                    )
                    .route(
                        "/plans/{city_id}/phases/{index}/actions/{action_id}",
                        web::delete().to(handlers::delete_action),
                    )
                    .route(
                        "/plans/{city_id}/results/{month_index}",
                        web::put().to(handlers::set_month_result),
                    )
                    .route(
                        "/plans/{city_id}/real-costs/{month}",
                        web::put().to(handlers::set_real_monthly_cost),
                    )
                    .route("/tags", web::get().to(handlers::tags))
                    .route("/tags", web::post().to(handlers::create_tag))
                    .route("/tags/{id}", web::put().to(handlers::update_tag))
                    .route("/tags/{id}", web::delete().to(handlers::delete_tag))
                    .route("/responsibles", web::get().to(handlers::responsibles))
                    .route("/responsibles", web::post().to(handlers::create_responsible))
                    .route(
                        "/responsibles/{id}",
                        web::put().to(handlers::update_responsible),
                    )
                    .route(
                        "/responsibles/{id}",
                        web::delete().to(handlers::delete_responsible),
                    )
                    .route("/rides/status", web::get().to(handlers::rides_status))
                    .route("/rides/cities", web::get().to(handlers::rides_cities)),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
