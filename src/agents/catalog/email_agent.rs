//! The email agent drafts emails for email-type tasks

use std::sync::{Arc, LazyLock};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::agents::core::AgentCore;
use crate::agents::definition::AgentDefinition;
use crate::agents::llm::ModelClient;
use crate::domain::User;

const SYSTEM_PROMPT: &str = r#"You draft emails on the user's behalf for Flowstate, a human-first task management tool. You'll be given
instructions describing the email a task calls for. Produce a complete draft the user can review, edit and send.

Guidelines:
- Write in the user's voice, plainly and warmly. No corporate filler.
- Keep the subject short and specific.
- The message should be ready to send: greeting, body, sign-off with the user's name.
- Never mention Flowstate, tasks, or that the draft was generated.
- If the instructions are thin, make reasonable, conservative choices rather than asking questions."#;

/// A drafted email ready for user review
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmailDraft {
    /// Subject line
    pub subject: String,
    /// Full message body
    pub message: String,
}

static DEFINITION: LazyLock<AgentDefinition<()>> = LazyLock::new(|| {
    AgentDefinition::builder("email", SYSTEM_PROMPT)
        .build()
        .expect("email agent definition is valid")
});

/// Build a live email agent writing as `user`
pub fn email_agent(model: Arc<dyn ModelClient>, user: &User) -> AgentCore<()> {
    let prompt = format!("{}\n\nThe user's name is {}.", SYSTEM_PROMPT, user.username);
    AgentCore::with_prompt(&DEFINITION, model, Arc::new(()), None, prompt)
}
