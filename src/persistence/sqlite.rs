//! SQLite implementation of [`Storage`]

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{PersistenceError, Storage, StorageResult};
use crate::domain::{NewTask, Project, Task, TaskUpdate, User};

/// SQLite-backed storage
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database and run the schema migration.
    pub async fn connect(url: &str) -> StorageResult<Self> {
        // A second connection to an in-memory database would see a fresh,
        // empty schema, so keep those on a single connection
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.migrate().await?;
        info!("connected to {}", url);
        Ok(storage)
    }

    async fn migrate(&self) -> StorageResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT UNIQUE,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            "CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            "CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id),
                title TEXT NOT NULL,
                description TEXT,
                due_date TEXT,
                priority INTEGER NOT NULL DEFAULT 1,
                task_type TEXT NOT NULL DEFAULT 'todo',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        }
        Ok(())
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

fn project_from_row(row: &sqlx::sqlite::SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> Task {
    let task_type: String = row.get("task_type");
    Task {
        id: row.get("id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        description: row.get("description"),
        due_date: row.get("due_date"),
        priority: row.get("priority"),
        task_type: task_type.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn insert_user(&self, username: &str, email: Option<&str>) -> StorageResult<i64> {
        let result = sqlx::query("INSERT INTO users (username, email) VALUES (?, ?)")
            .bind(username)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_user_by_id(&self, user_id: i64) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn insert_project(&self, user_id: i64, name: &str) -> StorageResult<i64> {
        let result = sqlx::query("INSERT INTO projects (user_id, name) VALUES (?, ?)")
            .bind(user_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_project(&self, project_id: i64) -> StorageResult<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(project_from_row))
    }

    async fn get_projects_by_user(&self, user_id: i64) -> StorageResult<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(project_from_row).collect())
    }

    async fn delete_project(&self, project_id: i64) -> StorageResult<()> {
        sqlx::query("DELETE FROM tasks WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_task(&self, task: NewTask) -> StorageResult<i64> {
        let result = sqlx::query(
            "INSERT INTO tasks (project_id, title, description, due_date, priority, task_type)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.due_date)
        .bind(task.priority)
        .bind(task.task_type.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_task(&self, task_id: i64) -> StorageResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(task_from_row))
    }

    async fn get_tasks_by_project(&self, project_id: i64) -> StorageResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE project_id = ? ORDER BY id")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(task_from_row).collect())
    }

    async fn update_task(&self, task_id: i64, update: TaskUpdate) -> StorageResult<()> {
        if let Some(title) = &update.title {
            sqlx::query("UPDATE tasks SET title = ? WHERE id = ?")
                .bind(title)
                .bind(task_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(description) = &update.description {
            sqlx::query("UPDATE tasks SET description = ? WHERE id = ?")
                .bind(description)
                .bind(task_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(due_date) = &update.due_date {
            sqlx::query("UPDATE tasks SET due_date = ? WHERE id = ?")
                .bind(due_date)
                .bind(task_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(priority) = update.priority {
            sqlx::query("UPDATE tasks SET priority = ? WHERE id = ?")
                .bind(priority)
                .bind(task_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn delete_task(&self, task_id: i64) -> StorageResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn top_task(&self, user_id: i64) -> StorageResult<Option<Task>> {
        let row = sqlx::query(
            "SELECT tasks.* FROM tasks
             JOIN projects ON projects.id = tasks.project_id
             WHERE projects.user_id = ?
             ORDER BY tasks.priority DESC,
                      tasks.due_date IS NULL,
                      tasks.due_date ASC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(task_from_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;

    async fn storage() -> SqliteStorage {
        SqliteStorage::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn user_project_task_round_trip() {
        let storage = storage().await;

        let user_id = storage.insert_user("zech", Some("zech@8ly.example")).await.unwrap();
        let project_id = storage.insert_project(user_id, "Shopping").await.unwrap();
        let task_id = storage
            .insert_task(NewTask {
                project_id,
                title: "Hummus".to_string(),
                description: None,
                due_date: None,
                priority: 1,
                task_type: TaskType::Todo,
            })
            .await
            .unwrap();

        let task = storage.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.title, "Hummus");
        assert_eq!(task.task_type, TaskType::Todo);

        let projects = storage.get_projects_by_user(user_id).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Shopping");

        storage.delete_task(task_id).await.unwrap();
        assert!(storage.get_task(task_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn top_task_prefers_priority_then_due_date() {
        let storage = storage().await;
        let user_id = storage.insert_user("zech", None).await.unwrap();
        let project_id = storage.insert_project(user_id, "Work").await.unwrap();

        for (title, priority, due) in [
            ("low", 1, None),
            ("urgent-later", 3, Some("2026-09-01")),
            ("urgent-soon", 3, Some("2026-08-10")),
        ] {
            storage
                .insert_task(NewTask {
                    project_id,
                    title: title.to_string(),
                    description: None,
                    due_date: due.map(str::to_string),
                    priority,
                    task_type: TaskType::Todo,
                })
                .await
                .unwrap();
        }

        let top = storage.top_task(user_id).await.unwrap().unwrap();
        assert_eq!(top.title, "urgent-soon");
    }

    #[tokio::test]
    async fn delete_project_removes_its_tasks() {
        let storage = storage().await;
        let user_id = storage.insert_user("zech", None).await.unwrap();
        let project_id = storage.insert_project(user_id, "Errands").await.unwrap();
        let task_id = storage
            .insert_task(NewTask {
                project_id,
                title: "Laundry".to_string(),
                description: None,
                due_date: None,
                priority: 1,
                task_type: TaskType::Todo,
            })
            .await
            .unwrap();

        storage.delete_project(project_id).await.unwrap();
        assert!(storage.get_project(project_id).await.unwrap().is_none());
        assert!(storage.get_task(task_id).await.unwrap().is_none());
    }
}
