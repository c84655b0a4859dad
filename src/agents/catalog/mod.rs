//! The application's agents
//!
//! Each module declares one agent: its definition (system prompt + tools)
//! in a per-type static, its dependency bundle, and a constructor that
//! binds the definition to a live [`AgentCore`](crate::agents::AgentCore).

mod email_agent;
mod learn_more_agent;
mod login_agent;
mod suggestions;
mod task_agent;

pub use email_agent::{email_agent, EmailDraft};
pub use learn_more_agent::{learn_more_agent, LearnMoreDeps};
pub use login_agent::{login_agent, LoginDeps};
pub use suggestions::{suggestions_agent, SuggestedActions};
pub use task_agent::{task_agent, TaskDeps};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize a tool's bound arguments into its argument struct
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> anyhow::Result<T> {
    serde_json::from_value(arguments).map_err(|e| anyhow::anyhow!("invalid arguments: {}", e))
}
