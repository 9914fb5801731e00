use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let options =
            SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
        // SQLite wants a single writer; one connection also keeps
        // `sqlite::memory:` pools coherent.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("connect to database")?;
        ensure_schema(&db).await?;
        Ok(Self { db, config })
    }

    /// State backed by an in-memory database, for tests.
    pub async fn for_tests() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                ttl_hours: 1,
            },
        });
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&config.database_url)
            .await?;
        ensure_schema(&db).await?;
        Ok(Self { db, config })
    }
}

async fn ensure_schema(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BLOB PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(db)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            description TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(db)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id)")
        .execute(db)
        .await?;

    Ok(())
}
