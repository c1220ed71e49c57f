//! # Campus API
//!
//! REST server for school administration: students, staff, timetable,
//! attendance, exams and the fee ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Campus API Server                                │
//! │                                                                         │
//! │  Admin UI ───► HTTP (8080) ───► routes/* ───► campus-db ───► SQLite    │
//! │                    │                              │                     │
//! │               TraceLayer                     campus-core                │
//! │               CorsLayer                   (ledger, conflicts)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers hold no business rules. Every route is one repository call
//! whose error is translated by [`error::ApiError`].

pub mod config;
pub mod error;
pub mod routes;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use campus_db::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db }
    }
}

/// Builds the application router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
