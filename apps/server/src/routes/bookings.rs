//! Booking routes.
//!
//! ```text
//! GET    /api/bookings            newest booking_date first
//! POST   /api/bookings            create (overbooking → 409)
//! GET    /api/bookings/grouped    bookings per customer
//! GET    /api/bookings/{id}
//! PUT    /api/bookings/{id}       replace status, amount, date, notes, items
//! DELETE /api/bookings/{id}       releases the reservation
//! ```
//!
//! A rejected booking writes nothing; the 409 body names every product that
//! could not be reserved.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use stockbook_core::report::CustomerBookings;
use stockbook_core::{Booking, BookingInput};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/grouped", get(grouped_bookings))
        .route(
            "/api/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
}

async fn list_bookings(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Booking>>, ApiError> {
    Ok(Json(state.db.bookings().list().await?))
}

async fn grouped_bookings(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<CustomerBookings>>, ApiError> {
    Ok(Json(state.db.bookings().grouped_by_customer().await?))
}

async fn get_booking(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state
        .db
        .bookings()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking", &id))?;
    Ok(Json(booking))
}

async fn create_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<BookingInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(user.principal.can_write_bookings(), "create bookings")?;
    let booking = state.db.bookings().create(user.id(), &input).await?;

    info!(
        booking_id = %booking.id,
        customer = %booking.customer_name,
        units = booking.total_quantity(),
        "Booking created"
    );
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn update_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<BookingInput>,
) -> Result<Json<Booking>, ApiError> {
    user.require(user.principal.can_write_bookings(), "edit bookings")?;
    Ok(Json(state.db.bookings().update(user.id(), &id, &input).await?))
}

async fn delete_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(user.principal.can_manage_catalog(), "delete bookings")?;
    state.db.bookings().delete(user.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
