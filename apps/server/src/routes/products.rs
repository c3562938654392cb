//! Product routes.
//!
//! ```text
//! GET    /api/products            list (search, stock, sort, order, manufacturer_id)
//! POST   /api/products            create                      catalog
//! GET    /api/products/columns    columns visible to the caller
//! POST   /api/products/import     CSV body, all or nothing    catalog
//! GET    /api/products/export     CSV download (?columns=)
//! GET    /api/products/{id}
//! PUT    /api/products/{id}                                   catalog
//! DELETE /api/products/{id}                                   catalog
//! ```
//!
//! Viewers get every product reduced to their assigned columns.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use stockbook_core::columns::{parse_column_list, project_product};
use stockbook_core::report::ProductQuery;
use stockbook_core::transfer::{export_products_csv, parse_product_csv};
use stockbook_core::{CatalogNames, Product, ProductColumn, ProductInput};
use stockbook_db::ImportSummary;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/columns", get(list_columns))
        .route("/api/products/import", post(import_products))
        .route("/api/products/export", get(export_products))
        .route(
            "/api/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

// =============================================================================
// Presentation
// =============================================================================

async fn catalog_names(state: &AppState) -> Result<CatalogNames, ApiError> {
    let manufacturers = state.db.manufacturers().list().await?;
    let categories = state.db.categories().list().await?;
    Ok(CatalogNames::new(&manufacturers, &categories))
}

/// Full records for staff, column projections for viewers.
pub(crate) async fn present_products(
    state: &AppState,
    user: &CurrentUser,
    products: Vec<Product>,
) -> Result<Value, ApiError> {
    if user.principal.is_staff() {
        return serde_json::to_value(products).map_err(|e| ApiError::Internal(e.to_string()));
    }

    let names = catalog_names(state).await?;
    let columns = user.principal.visible_columns();
    Ok(Value::Array(
        products
            .iter()
            .map(|product| project_product(product, &columns, &names))
            .collect(),
    ))
}

async fn present_product(
    state: &AppState,
    user: &CurrentUser,
    product: Product,
) -> Result<Value, ApiError> {
    let mut list = present_products(state, user, vec![product]).await?;
    Ok(match list.as_array_mut().and_then(|items| items.pop()) {
        Some(item) => item,
        None => Value::Null,
    })
}

// =============================================================================
// Handlers
// =============================================================================

async fn list_products(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Value>, ApiError> {
    let products = state.db.products().query(&query).await?;
    Ok(Json(present_products(&state, &user, products).await?))
}

async fn get_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;
    Ok(Json(present_product(&state, &user, product).await?))
}

async fn create_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(user.principal.can_manage_catalog(), "create products")?;
    let product = state.db.products().create(user.id(), &input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    user.require(user.principal.can_manage_catalog(), "edit products")?;
    let product = state.db.products().update(user.id(), &id, &input).await?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(user.principal.can_manage_catalog(), "delete products")?;
    state.db.products().delete(user.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ColumnInfo {
    key: &'static str,
    label: &'static str,
    derived: bool,
}

async fn list_columns(user: CurrentUser) -> Json<Vec<ColumnInfo>> {
    Json(
        user.principal
            .visible_columns()
            .into_iter()
            .map(|column| ColumnInfo {
                key: column.key(),
                label: column.label(),
                derived: column.is_derived(),
            })
            .collect(),
    )
}

/// CSV import. The request body is the raw file.
async fn import_products(
    State(state): State<AppState>,
    user: CurrentUser,
    body: String,
) -> Result<Json<ImportSummary>, ApiError> {
    user.require(user.principal.can_manage_catalog(), "import products")?;

    let rows = parse_product_csv(body.as_bytes())?;
    let summary = state.db.products().import(user.id(), rows).await?;

    info!(
        user = %user.profile.email,
        created = summary.created,
        updated = summary.updated,
        "CSV import finished"
    );
    Ok(Json(summary))
}

#[derive(Debug, Default, Deserialize)]
struct ExportParams {
    #[serde(default)]
    columns: Option<String>,
    #[serde(flatten)]
    query: ProductQuery,
}

async fn export_products(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let requested = parse_column_list(params.columns.as_deref().unwrap_or_default())
        .map_err(stockbook_core::CoreError::from)?;
    let visible = user.principal.visible_columns();
    let columns: Vec<ProductColumn> = requested
        .into_iter()
        .filter(|column| visible.contains(column))
        .collect();
    if columns.is_empty() {
        return Err(ApiError::bad_request("None of the requested columns are visible"));
    }

    let products = state.db.products().query(&params.query).await?;
    let names = catalog_names(&state).await?;
    let csv = export_products_csv(&products, &columns, &names)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"products.csv\"",
            ),
        ],
        csv,
    ))
}
