//! Agent composition root
//!
//! [`AgentCore`] ties a definition, a model client and a dependency bundle
//! together into a live agent: every descriptor is wrapped in a
//! [`ToolDispatcher`], the always-present `current_date` tool is added so
//! the model can ground relative-date reasoning, and a fresh
//! [`ConversationSession`] is opened. An agent is ready as soon as it is
//! constructed and lives for as long as its owning connection.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::agents::definition::{no_parameters, AgentDefinition, ToolDescriptor};
use crate::agents::dispatch::{ProgressReporter, ToolDispatcher};
use crate::agents::error::AgentResult;
use crate::agents::llm::{Message, ModelClient};
use crate::agents::session::ConversationSession;

/// Instruction prepended to every agent's system prompt
const DATE_STYLE_PREAMBLE: &str = "Always format dates in a nice human format.";

/// A live agent instance bound to one dependency bundle
pub struct AgentCore<D> {
    session: ConversationSession<D>,
    deps: Arc<D>,
}

impl<D: Send + Sync + 'static> AgentCore<D> {
    /// Construct an agent with the definition's own system prompt.
    pub fn new(
        definition: &AgentDefinition<D>,
        model: Arc<dyn ModelClient>,
        deps: Arc<D>,
        reporter: Option<ProgressReporter>,
    ) -> Self {
        let prompt = definition.system_prompt.clone();
        Self::with_prompt(definition, model, deps, reporter, prompt)
    }

    /// Construct an agent with an instance-resolved system prompt (e.g.
    /// the definition prompt plus the current user and project context).
    pub fn with_prompt(
        definition: &AgentDefinition<D>,
        model: Arc<dyn ModelClient>,
        deps: Arc<D>,
        reporter: Option<ProgressReporter>,
        system_prompt: String,
    ) -> Self {
        let mut dispatchers = vec![ToolDispatcher::new(current_date_tool(), reporter.clone())];
        dispatchers.extend(
            definition
                .tools
                .iter()
                .cloned()
                .map(|descriptor| ToolDispatcher::new(descriptor, reporter.clone())),
        );

        let system_prompt = format!("{}\n{}", DATE_STYLE_PREAMBLE, system_prompt);
        let session = ConversationSession::new(model, system_prompt, dispatchers);

        Self { session, deps }
    }

    /// Send a prompt and return the model's final text
    pub async fn send(&mut self, prompt: &str) -> AgentResult<String> {
        self.session.send(prompt, &self.deps).await
    }

    /// Send a prompt and parse the reply into `O`
    pub async fn send_typed<O>(&mut self, prompt: &str) -> AgentResult<O>
    where
        O: DeserializeOwned + schemars::JsonSchema,
    {
        self.session.send_typed(prompt, &self.deps).await
    }

    /// The conversation so far
    pub fn history(&self) -> &[Message] {
        self.session.history()
    }

    /// The dependency bundle this agent was constructed with
    pub fn deps(&self) -> &Arc<D> {
        &self.deps
    }
}

/// The built-in date tool every agent carries
fn current_date_tool<D>() -> ToolDescriptor<D> {
    ToolDescriptor {
        name: "current_date",
        description: "Get the current date UTC in the format YYYY-MM-DD.",
        parameters: no_parameters(),
        label: None,
        handler: Arc::new(|_deps, _args| {
            Box::pin(async { Ok(json!(Utc::now().format("%Y-%m-%d").to_string())) })
        }),
    }
}
