//! Login and session routes.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockbook_core::{ProductColumn, UserProfile};

use crate::auth::{verify_password, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Exchange email and password for an access token.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let credentials = state.db.users().get_by_email(&request.email).await?;

    // Same answer for unknown email and wrong password.
    let credentials = match credentials {
        Some(c) if verify_password(&request.password, &c.password_hash) => c,
        _ => {
            warn!(email = %request.email.trim(), "Login failed");
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
    };

    let access_token = state.jwt.generate_access_token(&credentials.profile)?;
    info!(email = %credentials.profile.email, role = ?credentials.profile.role, "Login");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.access_lifetime_secs(),
        user: credentials.profile,
    }))
}

/// The caller's profile and what the dashboard should let them do.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub user: UserProfile,
    pub columns: Vec<ProductColumn>,
    pub can_manage_users: bool,
    pub can_manage_catalog: bool,
    pub can_write_bookings: bool,
    pub can_view_activity: bool,
}

async fn me(user: CurrentUser) -> Json<SessionInfo> {
    let principal = &user.principal;
    Json(SessionInfo {
        columns: principal.visible_columns(),
        can_manage_users: principal.can_manage_users(),
        can_manage_catalog: principal.can_manage_catalog(),
        can_write_bookings: principal.can_write_bookings(),
        can_view_activity: principal.can_view_activity(),
        user: user.profile,
    })
}
