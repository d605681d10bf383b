// SPDX-License-Identifier: MIT OR Apache-2.0
//! mission-daemon
#![deny(unsafe_code)]
//!
//! The minimal REST control plane (spec §4.11/§6): every handler delegates
//! straight into `mission-engine`/`mission-store`/`mission-signals`. No
//! business logic lives in this crate beyond request validation and
//! domain-error-to-HTTP-status mapping.

/// Request/response envelopes and the wire error type.
pub mod api;
/// Generic request-id, logging, rate-limiting, and CORS middleware.
pub mod middleware;
/// Route handlers.
pub mod routes;
/// Request payload validation.
pub mod validation;

use mission_config::MissionConfig;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool for the orchestrator's store.
    pub pool: SqlitePool,
    /// Engine/trace/automation configuration.
    pub config: Arc<MissionConfig>,
}

impl AppState {
    /// Build state from an already-migrated pool and a loaded config.
    #[must_use]
    pub fn new(pool: SqlitePool, config: MissionConfig) -> Self {
        Self { pool, config: Arc::new(config) }
    }
}

/// Build the Axum router with every route named in spec §6, plus the
/// additive `/schema/{kind}` debug route.
#[must_use]
pub fn build_router(state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/health", get(routes::health))
        .route("/health/liveness", get(routes::liveness))
        .route("/api/missions", get(routes::list_missions).post(routes::create_mission))
        .route("/missions/{id}/artifacts", get(routes::list_artifacts).post(routes::create_artifact))
        .route("/missions/{id}/run", post(routes::run_mission))
        .route("/api/signals", get(routes::list_signals).post(routes::create_signal))
        .route("/api/signals/import/dangerous", post(routes::import_dangerous_signals))
        .route("/schema/{kind}", get(routes::schema))
        .layer(axum::middleware::from_fn(middleware::RequestLogger::layer))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .with_state(state)
}
