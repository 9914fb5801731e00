use serde::{Deserialize, Serialize};

use super::repo::Task;

/// Request body for task creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Query-string filter for task listing.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}
