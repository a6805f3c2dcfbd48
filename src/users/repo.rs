use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::{ApiError, ApiResult};

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub name: String,
    pub level: i32,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Profile fields a user may change; absent keys are left untouched.
/// `avatar_url` tracks presence separately so an explicit null clears
/// the field while an absent key preserves it.
#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub level: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_provided")]
    pub avatar_url: Option<Option<String>>,
}

fn deserialize_provided<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, name, level, avatar_url, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, name, level, avatar_url, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password; level defaults in the schema.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name, is_active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING id, email, password_hash, is_active, name, level, avatar_url, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Apply only the provided profile fields.
    pub async fn update_profile(db: &PgPool, id: i64, patch: &ProfilePatch) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                level = COALESCE($3, level),
                avatar_url = CASE WHEN $5 THEN $4 ELSE avatar_url END
            WHERE id = $1
            RETURNING id, email, password_hash, is_active, name, level, avatar_url, created_at
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.level)
        .bind(patch.avatar_url.clone().flatten())
        .bind(patch.avatar_url.is_some())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        Ok(user)
    }

    /// Delete the user and every event they own in one transaction.
    /// Either everything commits or nothing does.
    pub async fn delete_with_events(db: &PgPool, id: i64) -> ApiResult<()> {
        let mut tx = db.begin().await?;

        sqlx::query("DELETE FROM events WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = id, "cascade delete of events failed");
                ApiError::Internal("Failed to delete user events".into())
            })?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls the event deletes back.
            return Err(ApiError::NotFound("User not found".into()));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: 1,
            email: "a@x.com".into(),
            password_hash: "secret-hash".into(),
            is_active: true,
            name: "Ana".into(),
            level: 1,
            avatar_url: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn patch_distinguishes_null_avatar_from_absent() {
        let patch: ProfilePatch = serde_json::from_str("{}").unwrap();
        assert_eq!(patch.avatar_url, None);

        let patch: ProfilePatch = serde_json::from_str(r#"{"avatar_url": null}"#).unwrap();
        assert_eq!(patch.avatar_url, Some(None));
        assert!(patch.avatar_url.is_some());

        let patch: ProfilePatch = serde_json::from_str(r#"{"avatar_url": "pic.png"}"#).unwrap();
        assert_eq!(patch.avatar_url, Some(Some("pic.png".to_string())));
    }

    #[test]
    fn created_at_serializes_as_rfc3339() {
        let user = User {
            id: 1,
            email: "a@x.com".into(),
            password_hash: "h".into(),
            is_active: true,
            name: "Ana".into(),
            level: 1,
            avatar_url: None,
            created_at: time::macros::datetime!(2025-01-01 10:00:00 UTC),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["created_at"], "2025-01-01T10:00:00Z");
    }
}
