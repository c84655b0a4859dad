//! The suggested-actions agent guesses the user's next three questions

use std::sync::{Arc, LazyLock};

use schemars::JsonSchema;
use serde::Deserialize;

use crate::agents::core::AgentCore;
use crate::agents::definition::AgentDefinition;
use crate::agents::llm::ModelClient;

const SYSTEM_PROMPT: &str = r#"You'll be given messages in a conversation between USER and AGENT. In this conversation AGENT is representing a
pre-seed startup (8ly) that is seeking both co-founders and financial backers. USER is either a potential
co-founder or financial backer attempting to evaluate 8ly and it's app, Flowstate. Based on the conversation,
provide 3 guesses as to what the USER might ask next.

Have a mindset of exploration, outside the box, digging deeper. Don't ask the same generic questions. Possible
areas of interest to the USER:
- Prototype codebase (co-founders especially)
- Funding
- Timelines
- Team
- Features

Guidelines:
- Questions should be 8 to 12 words
- Questions should never refer to AGENT, only the app or startup
- Guesses MUST BE QUESTIONS, never guess that they'll make a statement"#;

/// Three suggested actions for the user to take
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SuggestedActions {
    /// The first suggested action
    pub action_1: String,
    /// The second suggested action
    pub action_2: String,
    /// The third suggested action
    pub action_3: String,
}

impl SuggestedActions {
    /// Flatten into the list sent over the wire, trimming stray
    /// punctuation and dropping empty guesses
    pub fn to_list(&self) -> Vec<String> {
        [&self.action_1, &self.action_2, &self.action_3]
            .into_iter()
            .map(|action| action.trim_matches(&[' ', '.'][..]).to_string())
            .filter(|action| !action.is_empty())
            .collect()
    }
}

static DEFINITION: LazyLock<AgentDefinition<()>> = LazyLock::new(|| {
    AgentDefinition::builder("suggested_actions", SYSTEM_PROMPT)
        .build()
        .expect("suggested-actions agent definition is valid")
});

/// Build a live suggestions agent; runs on the small model
pub fn suggestions_agent(model: Arc<dyn ModelClient>) -> AgentCore<()> {
    AgentCore::new(&DEFINITION, model, Arc::new(()), None)
}
