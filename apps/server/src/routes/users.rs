//! User management routes. Admin only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use stockbook_core::{NewUser, UserProfile, UserUpdate};

use crate::auth::{hash_password, validate_password, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    user.require(user.principal.can_manage_users(), "manage users")?;
    Ok(Json(state.db.users().list().await?))
}

async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    user.require(user.principal.can_manage_users(), "manage users")?;
    let profile = state
        .db
        .users()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &id))?;
    Ok(Json(profile))
}

async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(user.principal.can_manage_users(), "manage users")?;
    validate_password(&input.password)?;

    let hash = hash_password(&input.password)?;
    let created = state.db.users().create(user.id(), &input, &hash).await?;

    info!(admin = %user.profile.email, email = %created.email, role = ?created.role, "User created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    user.require(user.principal.can_manage_users(), "manage users")?;

    let hash = match update.password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let updated = state
        .db
        .users()
        .update(user.id(), &id, &update, hash.as_deref())
        .await?;
    Ok(Json(updated))
}

async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(user.principal.can_manage_users(), "manage users")?;
    if id == user.id() {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    state.db.users().delete(user.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
