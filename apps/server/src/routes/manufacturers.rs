//! Manufacturer routes.
//!
//! Reads are open to every signed-in user; writes need catalog rights.
//! Deleting a manufacturer keeps its products and clears their reference.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use stockbook_core::{Manufacturer, ManufacturerInput};

use super::products::present_products;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/manufacturers",
            get(list_manufacturers).post(create_manufacturer),
        )
        .route(
            "/api/manufacturers/{id}",
            get(get_manufacturer)
                .put(update_manufacturer)
                .delete(delete_manufacturer),
        )
        .route("/api/manufacturers/{id}/products", get(manufacturer_products))
}

async fn list_manufacturers(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Manufacturer>>, ApiError> {
    Ok(Json(state.db.manufacturers().list().await?))
}

async fn get_manufacturer(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Manufacturer>, ApiError> {
    let manufacturer = state
        .db
        .manufacturers()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Manufacturer", &id))?;
    Ok(Json(manufacturer))
}

async fn create_manufacturer(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ManufacturerInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(user.principal.can_manage_catalog(), "create manufacturers")?;
    let manufacturer = state.db.manufacturers().create(user.id(), &input).await?;
    Ok((StatusCode::CREATED, Json(manufacturer)))
}

async fn update_manufacturer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ManufacturerInput>,
) -> Result<Json<Manufacturer>, ApiError> {
    user.require(user.principal.can_manage_catalog(), "edit manufacturers")?;
    let manufacturer = state
        .db
        .manufacturers()
        .update(user.id(), &id, &input)
        .await?;
    Ok(Json(manufacturer))
}

#[derive(Debug, Serialize)]
struct DeleteManufacturerResponse {
    /// Products whose manufacturer was cleared.
    unlinked_products: i64,
}

async fn delete_manufacturer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteManufacturerResponse>, ApiError> {
    user.require(user.principal.can_manage_catalog(), "delete manufacturers")?;
    let unlinked_products = state.db.manufacturers().delete(user.id(), &id).await?;
    Ok(Json(DeleteManufacturerResponse { unlinked_products }))
}

/// Manufacturer detail page: products, category breakdown, stock totals.
async fn manufacturer_products(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let overview = state.db.manufacturers().with_products(&id).await?;
    if user.principal.is_staff() {
        return Ok(Json(
            serde_json::to_value(overview).map_err(|e| ApiError::Internal(e.to_string()))?,
        ));
    }

    let products = present_products(&state, &user, overview.products).await?;
    Ok(Json(json!({
        "manufacturer": overview.manufacturer,
        "products": products,
        "category_counts": overview.category_counts,
        "total_available": overview.total_available,
        "low_stock": overview.low_stock,
        "out_of_stock": overview.out_of_stock,
    })))
}
