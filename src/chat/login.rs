//! The login chat: conversational sign-in

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;

use crate::agents::catalog::{login_agent, LoginDeps};
use crate::agents::core::AgentCore;
use crate::agents::llm::ModelClient;
use crate::chat::connection::{progress_reporter, ChatError, ChatHandler, EventSender};
use crate::chat::protocol::ServerEvent;
use crate::domain::auth::TokenCodec;
use crate::persistence::Storage;

/// Opening lines, one picked at random per connection
const WELCOME_MESSAGES: &[&str] = &[
    "Welcome to Flowstate! What should I call you?",
    "Hey there, tell me your name and we'll get you in.",
    "Good to see you. What's your name?",
    "Flowstate here. Who am I talking to?",
];

/// Per-connection handler for the login chat
pub struct LoginChat {
    agent: AgentCore<LoginDeps>,
    token_inbox: mpsc::UnboundedReceiver<String>,
}

impl LoginChat {
    pub fn new(
        model: Arc<dyn ModelClient>,
        storage: Arc<dyn Storage>,
        tokens: TokenCodec,
        events: EventSender,
    ) -> Self {
        let (token_outbox, token_inbox) = mpsc::unbounded_channel();
        let reporter = progress_reporter(events);
        let agent = login_agent(model, storage, tokens, token_outbox, Some(reporter));
        Self { agent, token_inbox }
    }
}

#[async_trait]
impl ChatHandler for LoginChat {
    async fn on_connect(&mut self, events: &EventSender) -> Result<(), ChatError> {
        let welcome = WELCOME_MESSAGES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Welcome to Flowstate! Please enter your username to continue.");
        let _ = events.send(ServerEvent::reply(welcome));
        Ok(())
    }

    async fn on_prompt(&mut self, prompt: String, events: &EventSender) -> Result<(), ChatError> {
        let _ = events.send(ServerEvent::typing());
        let reply = self.agent.send(&prompt).await?;
        let _ = events.send(ServerEvent::reply(reply));

        // The authenticate_user tool pushes freshly signed tokens here
        while let Ok(token) = self.token_inbox.try_recv() {
            let _ = events.send(ServerEvent::login_success(token));
        }
        Ok(())
    }
}
