use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

/// User record in the database. Emails are stored trimmed and lowercased,
/// so equality on the column is already case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Find a user by normalized email.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, created_at
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, created_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user. The unique index on email backs up the handler's
    /// conflict pre-check.
    pub async fn create(db: &SqlitePool, email: &str) -> Result<User, AppError> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, email, created_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(d) if d.is_unique_violation() => {
                AppError::AlreadyExists("Email already registered".into())
            }
            _ => AppError::from(e),
        })?;
        Ok(user)
    }
}
