//! # User Repository
//!
//! Dashboard accounts. Passwords arrive here already hashed; hashing and
//! verification live in the server's auth module.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqliteConnection;
use tracing::debug;

use super::activity::record;
use super::{commit, new_id, non_blank, snapshot, RepoContext};
use crate::error::{DbError, DbResult};
use stockbook_core::validation::{validate_email, validate_name, MAX_NAME_LEN};
use stockbook_core::{
    AccessLevel, ActionType, ActivityEntry, EntityType, NewUser, ProductColumn, Role, UserProfile,
    UserUpdate, ValidationError,
};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    full_name: Option<String>,
    role: Role,
    access_level: AccessLevel,
    assigned_columns: Json<Vec<ProductColumn>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_credentials(self) -> UserCredentials {
        UserCredentials {
            password_hash: self.password_hash,
            profile: UserProfile {
                id: self.id,
                email: self.email,
                full_name: self.full_name,
                role: self.role,
                access_level: self.access_level,
                assigned_columns: self.assigned_columns.0,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        }
    }
}

/// A profile together with its stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub profile: UserProfile,
    pub password_hash: String,
}

const USER_SELECT: &str = r#"
    SELECT
        id, email, password_hash, full_name, role, access_level,
        assigned_columns, created_at, updated_at
    FROM users
"#;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    ctx: RepoContext,
}

impl UserRepository {
    pub fn new(ctx: RepoContext) -> Self {
        UserRepository { ctx }
    }

    pub async fn list(&self) -> DbResult<Vec<UserProfile>> {
        let sql = format!("{USER_SELECT} ORDER BY email COLLATE NOCASE");
        let rows: Vec<UserRow> = sqlx::query_as(&sql).fetch_all(&self.ctx.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_credentials().profile)
            .collect())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<UserProfile>> {
        let mut conn = self.ctx.pool.acquire().await?;
        Ok(fetch_user(&mut conn, id).await?.map(|c| c.profile))
    }

    /// Looks up a login by email, ignoring case.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<UserCredentials>> {
        let sql = format!("{USER_SELECT} WHERE email = ?1 COLLATE NOCASE");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(email.trim())
            .fetch_optional(&self.ctx.pool)
            .await?;
        Ok(row.map(UserRow::into_credentials))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.ctx.pool)
            .await?;
        Ok(count)
    }

    /// Creates an account.
    ///
    /// ## Arguments
    /// * `user.password` - Ignored here; pass its hash as `password_hash`
    pub async fn create(
        &self,
        actor: &str,
        user: &NewUser,
        password_hash: &str,
    ) -> DbResult<UserProfile> {
        let email = user.email.trim();
        validate_login_email(email)?;
        if let Some(name) = user.full_name.as_deref() {
            validate_name("full_name", name, MAX_NAME_LEN)?;
        }
        debug!(email = %email, role = ?user.role, "Creating user");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let taken: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ?1 COLLATE NOCASE")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;
        if taken.is_some() {
            return Err(DbError::duplicate("email", email));
        }

        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, full_name, role, access_level,
                assigned_columns, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(password_hash)
        .bind(non_blank(&user.full_name))
        .bind(user.role)
        .bind(user.access_level)
        .bind(Json(&user.assigned_columns))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let profile = fetch_user(&mut tx, &id)
            .await?
            .ok_or_else(|| DbError::not_found("User", &id))?
            .profile;

        record(
            &mut tx,
            actor,
            &ActivityEntry::created(
                EntityType::User,
                &profile.id,
                format!("Created user {}", profile.email),
                snapshot(&profile)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::User, ActionType::Create, Some(&profile.id));
        Ok(profile)
    }

    /// Applies the fields present in `update`.
    ///
    /// `update.password` is ignored; pass its hash as `password_hash`.
    pub async fn update(
        &self,
        actor: &str,
        id: &str,
        update: &UserUpdate,
        password_hash: Option<&str>,
    ) -> DbResult<UserProfile> {
        if let Some(name) = update.full_name.as_deref() {
            validate_name("full_name", name, MAX_NAME_LEN)?;
        }
        debug!(id = %id, "Updating user");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_user(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;

        let profile = &before.profile;
        let full_name = match &update.full_name {
            Some(_) => non_blank(&update.full_name),
            None => profile.full_name.clone(),
        };
        let assigned_columns = update
            .assigned_columns
            .clone()
            .unwrap_or_else(|| profile.assigned_columns.clone());

        sqlx::query(
            r#"
            UPDATE users SET
                full_name = ?2,
                role = ?3,
                access_level = ?4,
                assigned_columns = ?5,
                password_hash = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(update.role.unwrap_or(profile.role))
        .bind(update.access_level.unwrap_or(profile.access_level))
        .bind(Json(&assigned_columns))
        .bind(password_hash.unwrap_or(&before.password_hash))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let after = fetch_user(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?
            .profile;

        let mut description = format!("Updated user {}", after.email);
        if password_hash.is_some() {
            description.push_str(" (password changed)");
        }
        record(
            &mut tx,
            actor,
            &ActivityEntry::updated(
                EntityType::User,
                id,
                description,
                snapshot(&before.profile)?,
                snapshot(&after)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::User, ActionType::Update, Some(id));
        Ok(after)
    }

    /// Deletes an account. Their activity entries stay, without a user.
    pub async fn delete(&self, actor: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting user");

        let (_guard, mut tx) = self.ctx.begin_write().await?;
        let before = fetch_user(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?
            .profile;

        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        record(
            &mut tx,
            actor,
            &ActivityEntry::deleted(
                EntityType::User,
                id,
                format!("Deleted user {}", before.email),
                snapshot(&before)?,
            ),
        )
        .await?;
        commit(tx).await?;

        self.ctx.publish(EntityType::User, ActionType::Delete, Some(id));
        Ok(())
    }
}

async fn fetch_user(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<UserCredentials>> {
    let sql = format!("{USER_SELECT} WHERE id = ?1");
    let row: Option<UserRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(UserRow::into_credentials))
}

fn validate_login_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    validate_email(Some(email))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use stockbook_core::{AccessLevel, NewUser, ProductColumn, Role, UserUpdate};

    fn viewer(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: "secret-pass".to_string(),
            full_name: Some("Sales Desk".to_string()),
            role: Role::Viewer,
            access_level: AccessLevel::Read,
            assigned_columns: vec![ProductColumn::ModelNo, ProductColumn::AvailableStock],
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let profile = db
            .users()
            .create("system", &viewer("desk@example.com"), "$argon2id$hash")
            .await
            .unwrap();

        assert_eq!(profile.role, Role::Viewer);
        assert_eq!(profile.assigned_columns.len(), 2);

        let creds = db
            .users()
            .get_by_email("DESK@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.profile.id, profile.id);
        assert_eq!(creds.password_hash, "$argon2id$hash");
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users()
            .create("system", &viewer("desk@example.com"), "h")
            .await
            .unwrap();
        let err = db
            .users()
            .create("system", &viewer("Desk@Example.com"), "h")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let profile = db
            .users()
            .create("system", &viewer("desk@example.com"), "old-hash")
            .await
            .unwrap();

        let updated = db
            .users()
            .update(
                &profile.id,
                &profile.id,
                &UserUpdate {
                    access_level: Some(AccessLevel::Write),
                    ..Default::default()
                },
                Some("new-hash"),
            )
            .await
            .unwrap();

        assert_eq!(updated.access_level, AccessLevel::Write);
        assert_eq!(updated.role, Role::Viewer);
        assert_eq!(updated.full_name.as_deref(), Some("Sales Desk"));
        assert_eq!(updated.assigned_columns, profile.assigned_columns);

        let creds = db
            .users()
            .get_by_email("desk@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.password_hash, "new-hash");

        // Acting user is known, so the entry carries their email
        let feed = db.activity().recent(1).await.unwrap();
        assert_eq!(feed[0].user_email.as_deref(), Some("desk@example.com"));
    }

    #[tokio::test]
    async fn test_delete_keeps_activity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let profile = db
            .users()
            .create("system", &viewer("desk@example.com"), "h")
            .await
            .unwrap();
        db.users()
            .update(&profile.id, &profile.id, &UserUpdate::default(), None)
            .await
            .unwrap();

        db.users().delete("system", &profile.id).await.unwrap();
        assert!(db.users().get_by_id(&profile.id).await.unwrap().is_none());

        let feed = db.activity().recent(50).await.unwrap();
        assert_eq!(feed.len(), 3);
        assert!(feed.iter().all(|entry| entry.user_id.is_none()));
    }

    #[tokio::test]
    async fn test_email_required() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .users()
            .create("system", &viewer("   "), "h")
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(db.users().count().await.unwrap(), 0);
    }
}
