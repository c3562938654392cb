//! # HTTP Routes
//!
//! One module per resource; each exposes a `router()` merged here.
//!
//! ```text
//! /health                      no auth
//! /api/auth/*                  login is open, the rest needs a bearer token
//! /api/products/*              ┐
//! /api/manufacturers/*         │ reads: any signed-in user
//! /api/categories/*            │ writes: per core::access rules
//! /api/customers/*             │
//! /api/bookings/*              ┘
//! /api/activity/*              admin + manager
//! /api/users/*                 admin
//! /api/stats/overview          any signed-in user
//! /api/events                  WebSocket change feed
//! ```

pub mod activity;
pub mod auth;
pub mod bookings;
pub mod categories;
pub mod customers;
pub mod events;
pub mod manufacturers;
pub mod products;
pub mod users;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use stockbook_core::report::OverviewStats;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(products::router())
        .merge(manufacturers::router())
        .merge(categories::router())
        .merge(customers::router())
        .merge(bookings::router())
        .merge(activity::router())
        .merge(users::router())
        .merge(events::router())
        .route("/api/stats/overview", get(overview))
        .route("/health", get(health_check))
}

/// Dashboard headline numbers.
async fn overview(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<OverviewStats>, ApiError> {
    Ok(Json(state.db.stats().overview().await?))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
    migrations_applied: usize,
    migrations_total: usize,
    version: &'static str,
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let (total, applied) = state.db.migration_status().await.unwrap_or((0, 0));

    let healthy = database && applied == total;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            database,
            migrations_applied: applied,
            migrations_total: total,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
