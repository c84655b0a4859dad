//! Application domain types

pub mod auth;

use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name, also accepted at the login chat
    pub username: String,
    /// Email address used for login links
    pub email: Option<String>,
    /// Creation timestamp (ISO8601)
    pub created_at: String,
}

/// A project owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Project name (unique per user by convention, enforced by the agent)
    pub name: String,
    /// Creation timestamp (ISO8601)
    pub created_at: String,
}

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Basic check-box task, created by the user or the agent
    #[default]
    Todo,
    /// Draft-and-send-an-email task, only created by the agent
    Email,
    /// Calendar-event task, only created by the agent
    Calendar,
    /// Task that creates another task, only created by the agent
    CreateTask,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Todo => write!(f, "todo"),
            TaskType::Email => write!(f, "email"),
            TaskType::Calendar => write!(f, "calendar"),
            TaskType::CreateTask => write!(f, "create_task"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskType::Todo),
            "email" => Ok(TaskType::Email),
            "calendar" => Ok(TaskType::Calendar),
            "create_task" => Ok(TaskType::CreateTask),
            _ => Err(()),
        }
    }
}

/// A task inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: i64,
    /// Project this task belongs to
    pub project_id: i64,
    /// Short title
    pub title: String,
    /// Optional free-form description
    pub description: Option<String>,
    /// Optional ISO8601 due date
    pub due_date: Option<String>,
    /// Higher values surface first
    pub priority: i64,
    /// Kind of task
    pub task_type: TaskType,
    /// Creation timestamp (ISO8601)
    pub created_at: String,
}

/// Fields for inserting a task
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub task_type: TaskType,
}

fn default_priority() -> i64 {
    1
}

/// Partial task update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<i64>,
}
