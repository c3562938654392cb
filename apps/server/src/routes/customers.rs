//! Customer routes.
//!
//! Customers are written by anyone who may write bookings; a booking form
//! creates its customer inline. Deleting needs catalog rights.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use stockbook_core::{Booking, Customer, CustomerInput, BOOKING_SEARCH_LIMIT};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route(
            "/api/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/api/customers/{id}/bookings", get(customer_bookings))
}

#[derive(Debug, Default, Deserialize)]
struct CustomerParams {
    /// Typeahead term for the booking form.
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

async fn list_customers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<CustomerParams>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = match params.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => {
            let limit = params.limit.unwrap_or(BOOKING_SEARCH_LIMIT);
            state.db.customers().search(term, limit).await?
        }
        _ => state.db.customers().list().await?,
    };
    Ok(Json(customers))
}

async fn get_customer(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .db
        .customers()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", &id))?;
    Ok(Json(customer))
}

async fn create_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CustomerInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(user.principal.can_write_bookings(), "create customers")?;
    let customer = state.db.customers().create(user.id(), &input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn update_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<Customer>, ApiError> {
    user.require(user.principal.can_write_bookings(), "edit customers")?;
    Ok(Json(
        state.db.customers().update(user.id(), &id, &input).await?,
    ))
}

async fn delete_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(user.principal.can_manage_catalog(), "delete customers")?;
    state.db.customers().delete(user.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn customer_bookings(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    if state.db.customers().get_by_id(&id).await?.is_none() {
        return Err(ApiError::not_found("Customer", &id));
    }
    Ok(Json(state.db.bookings().list_for_customer(&id).await?))
}
