//! Persistence layer
//!
//! The rest of the crate talks to [`Storage`]: plain data access by id,
//! externally synchronized. The production implementation is SQLite via
//! `sqlx`; tests substitute an in-memory store.

pub mod error;
mod sqlite;

pub use error::PersistenceError;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;

use crate::domain::{NewTask, Project, Task, TaskUpdate, User};

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, PersistenceError>;

/// Data access for users, projects and tasks
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert_user(&self, username: &str, email: Option<&str>) -> StorageResult<i64>;
    async fn get_user_by_id(&self, user_id: i64) -> StorageResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    async fn insert_project(&self, user_id: i64, name: &str) -> StorageResult<i64>;
    async fn get_project(&self, project_id: i64) -> StorageResult<Option<Project>>;
    async fn get_projects_by_user(&self, user_id: i64) -> StorageResult<Vec<Project>>;
    /// Deletes the project and every task in it
    async fn delete_project(&self, project_id: i64) -> StorageResult<()>;

    async fn insert_task(&self, task: NewTask) -> StorageResult<i64>;
    async fn get_task(&self, task_id: i64) -> StorageResult<Option<Task>>;
    async fn get_tasks_by_project(&self, project_id: i64) -> StorageResult<Vec<Task>>;
    async fn update_task(&self, task_id: i64, update: TaskUpdate) -> StorageResult<()>;
    async fn delete_task(&self, task_id: i64) -> StorageResult<()>;

    /// The user's most pressing task: highest priority first, then the
    /// earliest due date, dateless tasks last
    async fn top_task(&self, user_id: i64) -> StorageResult<Option<Task>>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! Hash-map storage used by the agent and chat tests

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Inner {
        next_id: i64,
        users: HashMap<i64, User>,
        projects: HashMap<i64, Project>,
        tasks: HashMap<i64, Task>,
    }

    #[derive(Default)]
    pub(crate) struct MemoryStorage {
        inner: Mutex<Inner>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        fn next_id(inner: &mut Inner) -> i64 {
            inner.next_id += 1;
            inner.next_id
        }
    }

    #[async_trait]
    impl Storage for MemoryStorage {
        async fn insert_user(&self, username: &str, email: Option<&str>) -> StorageResult<i64> {
            let mut inner = self.inner.lock().unwrap();
            let id = Self::next_id(&mut inner);
            inner.users.insert(
                id,
                User {
                    id,
                    username: username.to_string(),
                    email: email.map(str::to_string),
                    created_at: String::new(),
                },
            );
            Ok(id)
        }

        async fn get_user_by_id(&self, user_id: i64) -> StorageResult<Option<User>> {
            Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
        }

        async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .users
                .values()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .users
                .values()
                .find(|u| u.email.as_deref() == Some(email))
                .cloned())
        }

        async fn insert_project(&self, user_id: i64, name: &str) -> StorageResult<i64> {
            let mut inner = self.inner.lock().unwrap();
            let id = Self::next_id(&mut inner);
            inner.projects.insert(
                id,
                Project {
                    id,
                    user_id,
                    name: name.to_string(),
                    created_at: String::new(),
                },
            );
            Ok(id)
        }

        async fn get_project(&self, project_id: i64) -> StorageResult<Option<Project>> {
            Ok(self.inner.lock().unwrap().projects.get(&project_id).cloned())
        }

        async fn get_projects_by_user(&self, user_id: i64) -> StorageResult<Vec<Project>> {
            let mut projects: Vec<Project> = self
                .inner
                .lock()
                .unwrap()
                .projects
                .values()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect();
            projects.sort_by_key(|p| p.id);
            Ok(projects)
        }

        async fn delete_project(&self, project_id: i64) -> StorageResult<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.projects.remove(&project_id);
            inner.tasks.retain(|_, t| t.project_id != project_id);
            Ok(())
        }

        async fn insert_task(&self, task: NewTask) -> StorageResult<i64> {
            let mut inner = self.inner.lock().unwrap();
            let id = Self::next_id(&mut inner);
            inner.tasks.insert(
                id,
                Task {
                    id,
                    project_id: task.project_id,
                    title: task.title,
                    description: task.description,
                    due_date: task.due_date,
                    priority: task.priority,
                    task_type: task.task_type,
                    created_at: String::new(),
                },
            );
            Ok(id)
        }

        async fn get_task(&self, task_id: i64) -> StorageResult<Option<Task>> {
            Ok(self.inner.lock().unwrap().tasks.get(&task_id).cloned())
        }

        async fn get_tasks_by_project(&self, project_id: i64) -> StorageResult<Vec<Task>> {
            let mut tasks: Vec<Task> = self
                .inner
                .lock()
                .unwrap()
                .tasks
                .values()
                .filter(|t| t.project_id == project_id)
                .cloned()
                .collect();
            tasks.sort_by_key(|t| t.id);
            Ok(tasks)
        }

        async fn update_task(&self, task_id: i64, update: TaskUpdate) -> StorageResult<()> {
            let mut inner = self.inner.lock().unwrap();
            if let Some(task) = inner.tasks.get_mut(&task_id) {
                if let Some(title) = update.title {
                    task.title = title;
                }
                if let Some(description) = update.description {
                    task.description = Some(description);
                }
                if let Some(due_date) = update.due_date {
                    task.due_date = Some(due_date);
                }
                if let Some(priority) = update.priority {
                    task.priority = priority;
                }
            }
            Ok(())
        }

        async fn delete_task(&self, task_id: i64) -> StorageResult<()> {
            self.inner.lock().unwrap().tasks.remove(&task_id);
            Ok(())
        }

        async fn top_task(&self, user_id: i64) -> StorageResult<Option<Task>> {
            let inner = self.inner.lock().unwrap();
            let project_ids: Vec<i64> = inner
                .projects
                .values()
                .filter(|p| p.user_id == user_id)
                .map(|p| p.id)
                .collect();
            let mut tasks: Vec<&Task> = inner
                .tasks
                .values()
                .filter(|t| project_ids.contains(&t.project_id))
                .collect();
            tasks.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| match (&a.due_date, &b.due_date) {
                        (Some(x), Some(y)) => x.cmp(y),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    })
            });
            Ok(tasks.first().map(|t| (*t).clone()))
        }
    }
}
