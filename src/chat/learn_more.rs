//! The learn-more chat: pitch Q&A with suggested follow-ups

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::agents::catalog::{learn_more_agent, suggestions_agent, LearnMoreDeps, SuggestedActions};
use crate::agents::core::AgentCore;
use crate::agents::llm::ModelClient;
use crate::chat::connection::{progress_reporter, ChatError, ChatHandler, EventSender};
use crate::chat::protocol::ServerEvent;
use crate::domain::User;

/// Floor on the opening sequence so the greeting doesn't flash past
const OPENING_FLOOR: Duration = Duration::from_secs(2);

/// Per-connection handler for the learn-more chat
pub struct LearnMoreChat {
    agent: AgentCore<LearnMoreDeps>,
    suggestions: AgentCore<()>,
    readme: String,
    greeting_name: String,
}

impl LearnMoreChat {
    pub fn new(
        model: Arc<dyn ModelClient>,
        small_model: Arc<dyn ModelClient>,
        docs: Arc<LearnMoreDeps>,
        user: Option<User>,
        events: EventSender,
    ) -> Self {
        let readme = docs.readme();
        let reporter = progress_reporter(events);
        let agent = learn_more_agent(model, docs, user.as_ref(), Some(reporter));
        let greeting_name = user.map(|u| format!(" {}", u.username)).unwrap_or_default();
        Self {
            agent,
            suggestions: suggestions_agent(small_model),
            readme,
            greeting_name,
        }
    }

    /// Best-effort follow-up suggestions; a failure only drops the event
    async fn send_suggestions(&mut self, context: &str, events: &EventSender) {
        match self.suggestions.send_typed::<SuggestedActions>(context).await {
            Ok(actions) => {
                let actions = actions.to_list();
                if !actions.is_empty() {
                    let _ = events.send(ServerEvent::actions(actions));
                }
            }
            Err(e) => warn!(error = %e, "suggested actions failed"),
        }
    }
}

#[async_trait]
impl ChatHandler for LearnMoreChat {
    async fn on_connect(&mut self, events: &EventSender) -> Result<(), ChatError> {
        let _ = events.send(ServerEvent::typing());
        let _ = events.send(ServerEvent::using(format!(
            "Hi{}, I'm thinking, one moment please",
            self.greeting_name
        )));

        let context = format!("AGENT:\n{}", self.readme);
        let (suggested, ()) = tokio::join!(
            self.suggestions.send_typed::<SuggestedActions>(&context),
            tokio::time::sleep(OPENING_FLOOR),
        );

        let _ = events.send(ServerEvent::reply(self.readme.clone()));
        match suggested {
            Ok(actions) => {
                let actions = actions.to_list();
                if !actions.is_empty() {
                    let _ = events.send(ServerEvent::actions(actions));
                }
            }
            Err(e) => warn!(error = %e, "suggested actions failed"),
        }
        Ok(())
    }

    async fn on_prompt(&mut self, prompt: String, events: &EventSender) -> Result<(), ChatError> {
        let _ = events.send(ServerEvent::typing());
        let reply = self.agent.send(&prompt).await?;
        let _ = events.send(ServerEvent::reply(reply.clone()));

        let context = format!("USER:\n{}\nAGENT:\n{}\n", prompt, reply);
        self.send_suggestions(&context, events).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::agents::testing::ScriptedModel;
    use crate::chat::connection::run_chat;

    fn docs() -> (tempfile::TempDir, Arc<LearnMoreDeps>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Flowstate\nThe pitch.").unwrap();
        let deps = Arc::new(LearnMoreDeps::new(dir.path().to_path_buf()));
        (dir, deps)
    }

    #[tokio::test(start_paused = true)]
    async fn opening_sequence_sends_readme_then_actions() {
        let (_dir, deps) = docs();
        let model = Arc::new(ScriptedModel::new());
        let small = Arc::new(ScriptedModel::new());
        small.push_text(
            r#"{"action_1":"What is the roadmap?","action_2":"Who is on the team?","action_3":"How is it funded?"}"#,
        );

        let (_inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let chat = LearnMoreChat::new(model, small, deps, None, events_tx.clone());
        tokio::spawn(run_chat(chat, inbound_rx, events_tx, None));

        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        let greeting = events.recv().await.unwrap();
        assert_eq!(
            greeting,
            ServerEvent::using("Hi, I'm thinking, one moment please")
        );
        let reply = events.recv().await.unwrap();
        assert!(matches!(reply, ServerEvent::Reply { ref reply } if reply.contains("Flowstate")));
        let actions = events.recv().await.unwrap();
        assert!(matches!(actions, ServerEvent::Actions { ref actions } if actions.len() == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn suggestion_failures_only_drop_the_actions_event() {
        let (_dir, deps) = docs();
        let model = Arc::new(ScriptedModel::new());
        model.push_text("It's built on a typed agent runtime.");
        let small = Arc::new(ScriptedModel::new());
        small.push_text("not json at all");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        // Connect-time suggestions also fail quietly
        let chat = LearnMoreChat::new(model, small, deps, None, events_tx.clone());
        tokio::spawn(run_chat(chat, inbound_rx, events_tx, None));

        // Skip the opening sequence: typing, using, reply (no actions)
        for _ in 0..3 {
            events.recv().await.unwrap();
        }

        inbound_tx
            .send(r#"{"kind":"prompt","prompt":"How does it work?"}"#.to_string())
            .unwrap();

        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        let reply = events.recv().await.unwrap();
        assert!(matches!(reply, ServerEvent::Reply { ref reply } if reply.contains("runtime")));
        // No actions event follows; the channel stays quiet
        assert!(events.try_recv().is_err());
    }
}
