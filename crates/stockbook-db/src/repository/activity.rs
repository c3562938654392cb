//! # Activity Repository
//!
//! Audit trail of create/update/delete actions.
//!
//! Entries are written by the other repositories inside their own write
//! transaction through [`record`], so an entry exists exactly when its change
//! committed. This repository only reads them back.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqliteConnection;
use tracing::debug;

use super::{new_id, RepoContext};
use crate::error::DbResult;
use stockbook_core::{ActionType, ActivityEntry, ActivityLog, EntityType, ACTIVITY_FEED_LIMIT};

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: String,
    user_id: Option<String>,
    user_email: Option<String>,
    action_type: ActionType,
    entity_type: EntityType,
    entity_id: Option<String>,
    description: String,
    metadata: Json<Value>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityLog {
    fn from(row: ActivityRow) -> Self {
        ActivityLog {
            id: row.id,
            user_id: row.user_id,
            user_email: row.user_email,
            action_type: row.action_type,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            description: row.description,
            metadata: row.metadata.0,
            created_at: row.created_at,
        }
    }
}

const ACTIVITY_SELECT: &str = r#"
    SELECT
        a.id,
        a.user_id,
        u.email AS user_email,
        a.action_type,
        a.entity_type,
        a.entity_id,
        a.description,
        a.metadata,
        a.created_at
    FROM activity_logs a
    LEFT JOIN users u ON u.id = a.user_id
"#;

/// Appends an activity entry on the caller's connection.
///
/// `actor` is the acting user's id. An id with no matching user (the seed
/// tool, a user deleted mid-request) is logged without a user.
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    actor: &str,
    entry: &ActivityEntry,
) -> DbResult<()> {
    debug!(
        action = ?entry.action_type,
        entity = %entry.entity_type.as_str(),
        entity_id = ?entry.entity_id,
        "Recording activity"
    );

    sqlx::query(
        r#"
        INSERT INTO activity_logs (
            id, user_id, action_type, entity_type, entity_id,
            description, metadata, created_at
        ) VALUES (
            ?1, (SELECT id FROM users WHERE id = ?2), ?3, ?4, ?5,
            ?6, ?7, ?8
        )
        "#,
    )
    .bind(new_id())
    .bind(actor)
    .bind(entry.action_type)
    .bind(entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.description)
    .bind(Json(&entry.metadata))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Read access to the activity log.
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    ctx: RepoContext,
}

impl ActivityRepository {
    pub fn new(ctx: RepoContext) -> Self {
        ActivityRepository { ctx }
    }

    /// Newest entries first, at most [`ACTIVITY_FEED_LIMIT`].
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<ActivityLog>> {
        let limit = limit.clamp(1, ACTIVITY_FEED_LIMIT);
        let sql = format!("{ACTIVITY_SELECT} ORDER BY a.created_at DESC, a.rowid DESC LIMIT ?1");

        let rows: Vec<ActivityRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.ctx.pool)
            .await?;

        Ok(rows.into_iter().map(ActivityLog::from).collect())
    }

    /// History of one record, newest first.
    pub async fn for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> DbResult<Vec<ActivityLog>> {
        let sql = format!(
            "{ACTIVITY_SELECT} WHERE a.entity_type = ?1 AND a.entity_id = ?2 \
             ORDER BY a.created_at DESC, a.rowid DESC"
        );

        let rows: Vec<ActivityRow> = sqlx::query_as(&sql)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(&self.ctx.pool)
            .await?;

        Ok(rows.into_iter().map(ActivityLog::from).collect())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activity_logs")
            .fetch_one(&self.ctx.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use stockbook_core::{ActionType, CategoryInput, EntityType};

    #[tokio::test]
    async fn test_mutations_are_logged_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let categories = db.categories();

        let taps = categories
            .create(
                "system",
                &CategoryInput {
                    name: "Taps".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();
        categories
            .update(
                "system",
                &taps.id,
                &CategoryInput {
                    name: "Mixers".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();

        let feed = db.activity().recent(50).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].action_type, ActionType::Update);
        assert_eq!(feed[1].action_type, ActionType::Create);
        // Unknown actor is stored without a user
        assert!(feed[0].user_id.is_none());
        assert_eq!(feed[0].metadata["changes"]["name"]["to"], "Mixers");

        let history = db
            .activity()
            .for_entity(EntityType::Category, &taps.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_recent_caps_limit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for i in 0..3 {
            db.categories()
                .create(
                    "system",
                    &CategoryInput {
                        name: format!("Category {i}"),
                        description: None,
                    },
                )
                .await
                .unwrap();
        }

        assert_eq!(db.activity().recent(2).await.unwrap().len(), 2);
        assert_eq!(db.activity().recent(0).await.unwrap().len(), 1);
        assert_eq!(db.activity().count().await.unwrap(), 3);
    }
}
