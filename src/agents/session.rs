//! Conversation sessions
//!
//! A [`ConversationSession`] owns the message history for one agent
//! instance and mediates every prompt submission to the model
//! collaborator. History is only appended after a successful exchange, so
//! a failed round trip leaves the session exactly as it was.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::agents::definition::parameters_of;
use crate::agents::dispatch::ToolDispatcher;
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{Message, ModelClient};
use crate::agents::runtime::{resolve_exchange, ExchangeError};

/// Attempts per prompt before the model is declared unavailable
const MAX_ATTEMPTS: u32 = 3;
/// Fixed pause between attempts
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Message history plus a handle to the model collaborator
pub struct ConversationSession<D> {
    model: Arc<dyn ModelClient>,
    system_prompt: String,
    dispatchers: Vec<ToolDispatcher<D>>,
    history: Vec<Message>,
}

impl<D> ConversationSession<D> {
    pub fn new(
        model: Arc<dyn ModelClient>,
        system_prompt: String,
        dispatchers: Vec<ToolDispatcher<D>>,
    ) -> Self {
        Self {
            model,
            system_prompt,
            dispatchers,
            history: Vec::new(),
        }
    }

    /// The conversation so far (without the system prompt). Grows without
    /// bound over the life of the session; connections are short-lived
    /// enough that no retention policy is applied.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Send a prompt and return the model's final text.
    ///
    /// Tool calls are resolved transparently inside this one call. Model
    /// failures are retried up to [`MAX_ATTEMPTS`] times; after that the
    /// error propagates as [`AgentError::ModelUnavailable`] and the
    /// history is left unmodified.
    pub async fn send(&mut self, prompt: &str, deps: &Arc<D>) -> AgentResult<String> {
        self.run(prompt, deps, None).await
    }

    /// Send a prompt and parse the reply into `O`.
    ///
    /// The model is constrained to answer with JSON conforming to `O`'s
    /// schema; a reply that does not parse fails with
    /// [`AgentError::OutputValidation`] and is not retried here; the
    /// caller may choose to re-prompt.
    pub async fn send_typed<O>(&mut self, prompt: &str, deps: &Arc<D>) -> AgentResult<O>
    where
        O: DeserializeOwned + schemars::JsonSchema,
    {
        let schema = parameters_of::<O>();
        let text = self.run(prompt, deps, Some(schema)).await?;
        serde_json::from_str(&text).map_err(|e| {
            AgentError::OutputValidation(format!("reply did not match the requested type: {}", e))
        })
    }

    async fn run(
        &mut self,
        prompt: &str,
        deps: &Arc<D>,
        response_schema: Option<serde_json::Value>,
    ) -> AgentResult<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut scratch = Vec::with_capacity(self.history.len() + 2);
            scratch.push(Message::system(&self.system_prompt));
            scratch.extend(self.history.iter().cloned());
            scratch.push(Message::user(prompt));

            match resolve_exchange(
                self.model.as_ref(),
                &self.dispatchers,
                deps,
                &mut scratch,
                response_schema.clone(),
            )
            .await
            {
                Ok(text) => {
                    // Keep everything after the system prompt
                    self.history = scratch.split_off(1);
                    return Ok(text);
                }
                Err(ExchangeError::MaxRounds(rounds)) => {
                    return Err(AgentError::MaxRounds(rounds));
                }
                Err(ExchangeError::Model(e)) if attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "model call failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(ExchangeError::Model(e)) => {
                    return Err(AgentError::ModelUnavailable(e));
                }
            }
        }
    }
}
