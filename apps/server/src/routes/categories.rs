//! Category routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use stockbook_core::{Category, CategoryInput};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

async fn list_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.db.categories().list().await?))
}

async fn get_category(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let category = state
        .db
        .categories()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category", &id))?;
    Ok(Json(category))
}

async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<CategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(user.principal.can_manage_catalog(), "create categories")?;
    let category = state.db.categories().create(user.id(), &input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, ApiError> {
    user.require(user.principal.can_manage_catalog(), "edit categories")?;
    Ok(Json(
        state.db.categories().update(user.id(), &id, &input).await?,
    ))
}

/// 409 while any product still uses the category.
async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(user.principal.can_manage_catalog(), "delete categories")?;
    state.db.categories().delete(user.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
