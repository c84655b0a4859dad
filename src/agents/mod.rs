//! The agent runtime
//!
//! Declarative agent definitions (system prompt + explicitly registered
//! tools), conversation sessions with per-exchange history, tool dispatch
//! with progress reporting and per-call error isolation, and the model
//! providers behind them. The concrete application agents live in
//! [`catalog`].

pub mod catalog;
pub mod core;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod runtime;
pub mod session;

pub use self::core::AgentCore;
pub use definition::{AgentDefinition, ToolDescriptor};
pub use dispatch::{ProgressReporter, ToolDispatcher};
pub use error::{AgentError, AgentResult, LlmError, LlmResult};
pub use session::ConversationSession;
