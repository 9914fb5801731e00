use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

use super::dto::{CreateTask, TaskFilter, UpdateTask};

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.chars().count();
    if len == 0 {
        return Err(AppError::Validation("Title must not be empty".into()));
    }
    if len > TITLE_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "Title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), AppError> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "Description must be at most {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

impl Task {
    /// List the owner's tasks, optionally narrowed by completion flag
    /// and/or a case-insensitive substring over title and description.
    /// Creation order, stable per call.
    pub async fn list(
        db: &SqlitePool,
        owner_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, AppError> {
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let rows = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, description, completed, created_at, updated_at
            FROM tasks
            WHERE user_id = ?1
              AND (?2 IS NULL OR completed = ?2)
              AND (?3 IS NULL
                   OR instr(lower(title), ?3) > 0
                   OR instr(lower(coalesce(description, '')), ?3) > 0)
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner_id)
        .bind(filter.completed)
        .bind(search)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        db: &SqlitePool,
        owner_id: Uuid,
        data: CreateTask,
    ) -> Result<Task, AppError> {
        validate_title(&data.title)?;
        if let Some(description) = &data.description {
            validate_description(description)?;
        }

        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: owner_id,
            title: data.title,
            description: data.description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO tasks (id, user_id, title, description, completed, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(task.id)
        .bind(task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(db)
        .await?;
        Ok(task)
    }

    /// A task owned by someone else is reported exactly like a missing one.
    pub async fn get(db: &SqlitePool, owner_id: Uuid, task_id: Uuid) -> Result<Task, AppError> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, description, completed, created_at, updated_at
            FROM tasks
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(task_id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))
    }

    pub async fn update(
        db: &SqlitePool,
        owner_id: Uuid,
        task_id: Uuid,
        fields: UpdateTask,
    ) -> Result<Task, AppError> {
        if let Some(title) = &fields.title {
            validate_title(title)?;
        }
        if let Some(description) = &fields.description {
            validate_description(description)?;
        }

        let now = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                title = COALESCE(?1, title),
                description = COALESCE(?2, description),
                completed = COALESCE(?3, completed),
                updated_at = ?4
            WHERE id = ?5 AND user_id = ?6
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.completed)
        .bind(now)
        .bind(task_id)
        .bind(owner_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Task not found".into()));
        }
        Self::get(db, owner_id, task_id).await
    }

    pub async fn delete(db: &SqlitePool, owner_id: Uuid, task_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(task_id)
            .bind(owner_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Task not found".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo::User, state::AppState};

    async fn test_db() -> SqlitePool {
        AppState::for_tests().await.expect("test state").db
    }

    // The tasks table references users, so owners must exist.
    async fn new_owner(db: &SqlitePool, email: &str) -> Uuid {
        User::create(db, email).await.expect("create user").id
    }

    fn create_req(title: &str, description: Option<&str>) -> CreateTask {
        CreateTask {
            title: title.to_string(),
            description: description.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let db = test_db().await;
        let owner = new_owner(&db, "anna@example.com").await;
        let created = Task::create(&db, owner, create_req("Buy milk", Some("2 liters")))
            .await
            .expect("create");
        assert!(!created.completed);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = Task::get(&db, owner, created.id).await.expect("get");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn every_operation_is_scoped_to_the_owner() {
        let db = test_db().await;
        let owner = new_owner(&db, "anna@example.com").await;
        let stranger = new_owner(&db, "bert@example.com").await;
        let task = Task::create(&db, owner, create_req("Private", None))
            .await
            .expect("create");

        // Wrong owner looks identical to a missing task, on every operation.
        let err = Task::get(&db, stranger, task.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = Task::update(&db, stranger, task.id, UpdateTask::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = Task::delete(&db, stranger, task.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert!(Task::list(&db, stranger, &TaskFilter::default())
            .await
            .expect("list")
            .is_empty());

        // The owner still sees the task untouched.
        assert_eq!(Task::get(&db, owner, task.id).await.expect("get"), task);
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() {
        let db = test_db().await;
        let owner = new_owner(&db, "anna@example.com").await;
        let task = Task::create(&db, owner, create_req("Buy milk", Some("2 liters")))
            .await
            .expect("create");

        let updated = Task::update(
            &db,
            owner,
            task.id,
            UpdateTask {
                completed: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("update");

        assert_eq!(updated.title, "Buy milk");
        assert_eq!(updated.description.as_deref(), Some("2 liters"));
        assert!(updated.completed);
        assert!(updated.updated_at >= task.created_at);
    }

    #[tokio::test]
    async fn validation_is_enforced_on_create_and_update() {
        let db = test_db().await;
        let owner = new_owner(&db, "anna@example.com").await;

        let err = Task::create(&db, owner, create_req("", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = Task::create(&db, owner, create_req(&"x".repeat(201), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = Task::create(&db, owner, create_req("ok", Some(&"x".repeat(1001))))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let task = Task::create(&db, owner, create_req("ok", None)).await.expect("create");
        let err = Task::update(
            &db,
            owner,
            task.id,
            UpdateTask {
                title: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_by_completion_and_search() {
        let db = test_db().await;
        let owner = new_owner(&db, "anna@example.com").await;
        let milk = Task::create(&db, owner, create_req("Buy MILK", None))
            .await
            .expect("create");
        let laundry = Task::create(&db, owner, create_req("Laundry", Some("wash and fold milk-white shirts")))
            .await
            .expect("create");
        let taxes = Task::create(&db, owner, create_req("File taxes", None))
            .await
            .expect("create");
        Task::update(
            &db,
            owner,
            taxes.id,
            UpdateTask {
                completed: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("update");

        let done = Task::list(
            &db,
            owner,
            &TaskFilter {
                completed: Some(true),
                search: None,
            },
        )
        .await
        .expect("list");
        assert_eq!(done.iter().map(|t| t.id).collect::<Vec<_>>(), vec![taxes.id]);

        // Substring match is case-insensitive and covers descriptions.
        let found = Task::list(
            &db,
            owner,
            &TaskFilter {
                completed: None,
                search: Some("milk".into()),
            },
        )
        .await
        .expect("list");
        let ids: Vec<_> = found.iter().map(|t| t.id).collect();
        assert!(ids.contains(&milk.id));
        assert!(ids.contains(&laundry.id));
        assert!(!ids.contains(&taxes.id));
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let db = test_db().await;
        let owner = new_owner(&db, "anna@example.com").await;
        let task = Task::create(&db, owner, create_req("Temporary", None))
            .await
            .expect("create");

        Task::delete(&db, owner, task.id).await.expect("delete");
        let err = Task::get(&db, owner, task.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = Task::delete(&db, owner, task.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
