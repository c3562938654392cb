//! Activity feed routes. Staff only.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use stockbook_core::{ActivityLog, EntityType, ACTIVITY_FEED_LIMIT};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/activity", get(recent_activity))
        .route("/api/activity/{entity_type}/{id}", get(entity_history))
}

#[derive(Debug, Default, Deserialize)]
struct FeedParams {
    #[serde(default)]
    limit: Option<u32>,
}

/// Newest first. `limit` is capped at the feed size.
async fn recent_activity(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    user.require(user.principal.can_view_activity(), "view activity")?;
    let limit = params.limit.unwrap_or(ACTIVITY_FEED_LIMIT);
    Ok(Json(state.db.activity().recent(limit).await?))
}

async fn entity_history(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((entity_type, id)): Path<(String, String)>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    user.require(user.principal.can_view_activity(), "view activity")?;
    let entity = EntityType::parse(&entity_type)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown entity type: {}", entity_type)))?;
    Ok(Json(state.db.activity().for_entity(entity, &id).await?))
}
