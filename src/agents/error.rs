//! Error types for the agent runtime

use thiserror::Error;

/// Errors that can occur during agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// Malformed agent definition (e.g. empty system prompt). Fatal at
    /// definition time: an agent type that hits this cannot be constructed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model requested a tool call with incompatible arguments
    #[error("Argument binding error in tool {tool}: {message}")]
    ArgumentBinding { tool: String, message: String },

    /// A tool body failed
    #[error("Tool execution error in {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    /// The model collaborator failed after the retry budget was exhausted
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[source] LlmError),

    /// Structured output did not conform to the requested type
    #[error("Output validation error: {0}")]
    OutputValidation(String),

    /// The tool-resolution loop hit its round cap without a final reply
    #[error("Max rounds ({0}) reached without completion")]
    MaxRounds(u32),
}

/// Errors specific to model-provider operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider not recognised by the factory
    #[error("Model provider not found: {0}")]
    ProviderNotFound(String),

    /// API error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Network(format!("Connection error: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for model operations
pub type LlmResult<T> = Result<T, LlmError>;
