//! The dashboard chat: natural-language task management

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::agents::catalog::{task_agent, TaskDeps};
use crate::agents::core::AgentCore;
use crate::agents::llm::ModelClient;
use crate::chat::connection::{progress_reporter, ChatError, ChatHandler, EventSender};
use crate::chat::protocol::ServerEvent;
use crate::domain::{Project, User};
use crate::persistence::Storage;

/// Floor on the visible latency of the welcome message, so it reads as
/// composed rather than canned
const WELCOME_FLOOR: Duration = Duration::from_millis(1500);

/// Per-connection handler for the task chat
pub struct FlowstateChat {
    agent: AgentCore<TaskDeps>,
    storage: Arc<dyn Storage>,
    user: User,
    bound_project: Option<Project>,
}

impl FlowstateChat {
    pub fn new(
        model: Arc<dyn ModelClient>,
        storage: Arc<dyn Storage>,
        user: User,
        bound_project: Option<Project>,
        events: EventSender,
    ) -> Self {
        let reporter = progress_reporter(events);
        let agent = task_agent(
            model,
            storage.clone(),
            user.clone(),
            bound_project.clone(),
            Some(reporter),
        );
        Self {
            agent,
            storage,
            user,
            bound_project,
        }
    }
}

#[async_trait]
impl ChatHandler for FlowstateChat {
    async fn on_connect(&mut self, events: &EventSender) -> Result<(), ChatError> {
        // Brand-new users (no project bound, none created yet) get a
        // generated welcome
        if self.bound_project.is_some() {
            return Ok(());
        }
        let projects = self.storage.get_projects_by_user(self.user.id).await?;
        if !projects.is_empty() {
            return Ok(());
        }

        let _ = events.send(ServerEvent::typing());
        let started = Instant::now();
        let welcome = self
            .agent
            .send(&format!(
                "This is the software developer: {} is a new user, please greet them and let \
                 them know how they can get started, mention a feature or two. Use markdown to \
                 send a large welcome heading followed by two sentences using normal formatting \
                 (say the user's name somewhere in there). Make sure to mention that you use \
                 'natural language'. Use emoji. Don't forget that you are a helpful assistant \
                 that is an innate extension of the user. Be sure to remain invisible, only \
                 refer to the app Flowstate, not yourself.",
                self.user.username
            ))
            .await?;

        if started.elapsed() < WELCOME_FLOOR {
            tokio::time::sleep(WELCOME_FLOOR - started.elapsed()).await;
        }
        let _ = events.send(ServerEvent::reply(welcome));
        Ok(())
    }

    async fn on_prompt(&mut self, prompt: String, events: &EventSender) -> Result<(), ChatError> {
        let _ = events.send(ServerEvent::typing());
        let reply = self.agent.send(&prompt).await?;
        let _ = events.send(ServerEvent::reply(reply));
        Ok(())
    }

    async fn on_complete_task(
        &mut self,
        task_id: i64,
        _events: &EventSender,
    ) -> Result<(), ChatError> {
        self.storage.delete_task(task_id).await?;
        Ok(())
    }

    async fn on_nudge(&mut self, events: &EventSender) -> Result<(), ChatError> {
        let _ = events.send(ServerEvent::typing());
        let nudge = self
            .agent
            .send(&format!(
                "This is the software developer: {} is inactive and hasn't done anything yet. \
                 Send a message to inspire them to get started.",
                self.user.username
            ))
            .await?;
        let _ = events.send(ServerEvent::reply(nudge));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::agents::error::LlmError;
    use crate::agents::testing::ScriptedModel;
    use crate::chat::connection::run_chat;
    use crate::chat::protocol::Command;
    use crate::persistence::memory::MemoryStorage;

    async fn seeded_storage() -> (Arc<MemoryStorage>, User) {
        let storage = Arc::new(MemoryStorage::new());
        let user_id = storage.insert_user("zech", None).await.unwrap();
        storage.insert_project(user_id, "Shopping").await.unwrap();
        let user = storage.get_user_by_id(user_id).await.unwrap().unwrap();
        (storage, user)
    }

    fn spawn(
        model: Arc<ScriptedModel>,
        storage: Arc<MemoryStorage>,
        user: User,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let chat = FlowstateChat::new(model, storage, user, None, events_tx.clone());
        tokio::spawn(run_chat(chat, inbound_rx, events_tx, None));
        (inbound_tx, events_rx)
    }

    #[tokio::test]
    async fn prompt_creates_a_task_and_confirms() {
        let (storage, user) = seeded_storage().await;
        let model = Arc::new(ScriptedModel::new());
        model.push_tool_call(
            "create_task",
            json!({ "project_name": "Shopping", "title": "Hummus" }),
        );
        model.push_text("Added hummus to your Shopping list. Anything else?");

        let (inbound, mut events) = spawn(model, storage.clone(), user.clone());
        inbound
            .send(r#"{"kind":"prompt","prompt":"Add hummus to my shopping list"}"#.to_string())
            .unwrap();

        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        // The dispatcher reports the tool call as a `using` notice
        let using = events.recv().await.unwrap();
        assert_eq!(
            using,
            ServerEvent::using("Creating task Hummus in Shopping")
        );
        let reply = events.recv().await.unwrap();
        assert!(matches!(reply, ServerEvent::Reply { ref reply } if reply.contains("hummus")));

        let projects = storage.get_projects_by_user(user.id).await.unwrap();
        let tasks = storage.get_tasks_by_project(projects[0].id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].title.to_lowercase().contains("hummus"));
    }

    #[tokio::test]
    async fn complete_task_deletes_from_storage_without_replying() {
        let (storage, user) = seeded_storage().await;
        let projects = storage.get_projects_by_user(user.id).await.unwrap();
        let task_id = storage
            .insert_task(crate::domain::NewTask {
                project_id: projects[0].id,
                title: "Hummus".to_string(),
                description: None,
                due_date: None,
                priority: 1,
                task_type: Default::default(),
            })
            .await
            .unwrap();

        let model = Arc::new(ScriptedModel::new());
        let (inbound, mut events) = spawn(model, storage.clone(), user);

        inbound
            .send(format!(
                r#"{{"type":"complete_task","task_id":"{}"}}"#,
                task_id
            ))
            .unwrap();
        // Force a subsequent event so we can observe that nothing was
        // emitted for the completion itself
        inbound.send(r#"{"kind":"frobnicate"}"#.to_string()).unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ServerEvent::Error { .. }));
        assert!(storage.get_task(task_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn model_outage_apologizes_and_asks_for_a_reload() {
        let (storage, user) = seeded_storage().await;
        let model = Arc::new(ScriptedModel::new());
        for _ in 0..3 {
            model.push_error(LlmError::Timeout);
        }

        let (inbound, mut events) = spawn(model, storage, user);
        inbound
            .send(r#"{"kind":"prompt","prompt":"hello"}"#.to_string())
            .unwrap();

        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        let apology = events.recv().await.unwrap();
        assert!(matches!(apology, ServerEvent::Reply { ref reply } if reply.contains("sorry")));
        let reload = events.recv().await.unwrap();
        assert!(matches!(
            reload,
            ServerEvent::Command {
                command: Command::Reload,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn new_users_get_a_generated_welcome() {
        let storage = Arc::new(MemoryStorage::new());
        let user_id = storage.insert_user("maya", None).await.unwrap();
        let user = storage.get_user_by_id(user_id).await.unwrap().unwrap();

        let model = Arc::new(ScriptedModel::new());
        model.push_text("# Welcome, maya! 🎉\nJust tell Flowstate what you need in natural language.");

        let (_inbound, mut events) = spawn(model, storage, user);

        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        let welcome = events.recv().await.unwrap();
        assert!(matches!(welcome, ServerEvent::Reply { ref reply } if reply.contains("maya")));
    }
}
