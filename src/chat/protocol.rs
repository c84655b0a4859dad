//! The chat wire protocol
//!
//! JSON-per-message over a WebSocket. Inbound messages are discriminated
//! by a `kind` field (the older `type` spelling is accepted too), with a
//! legacy escape hatch: raw non-JSON text is treated as a prompt.
//! Outbound events are a tagged union serialized with a `type` field.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Forwarded to the agent
    Prompt { prompt: String },
    /// Deletes the task; no reply event is produced
    CompleteTask { task_id: i64 },
}

/// A malformed or unknown inbound message; reported back as an `error`
/// event, never connection-fatal
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("Invalid message format, got keys: {0}")]
    MissingKind(String),
    #[error("Invalid message type: {0}")]
    UnknownKind(String),
    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),
}

impl ProtocolError {
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::error(self.to_string())
    }
}

/// Decode one inbound frame
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        // Legacy clients send the prompt as plain text
        return Ok(ClientMessage::Prompt {
            prompt: text.to_string(),
        });
    };

    let Some(object) = value.as_object() else {
        return Ok(ClientMessage::Prompt {
            prompt: text.to_string(),
        });
    };

    let kind = object
        .get("kind")
        .or_else(|| object.get("type"))
        .and_then(|k| k.as_str());

    let Some(kind) = kind else {
        let keys = object.keys().cloned().collect::<Vec<_>>().join(", ");
        return Err(ProtocolError::MissingKind(keys));
    };

    match kind {
        "prompt" => Ok(ClientMessage::Prompt {
            prompt: object
                .get("prompt")
                .and_then(|p| p.as_str())
                .unwrap_or_default()
                .to_string(),
        }),
        "complete_task" => {
            let task_id = match object.get("task_id") {
                Some(Value::Number(n)) => n.as_i64(),
                Some(Value::String(s)) => s.parse().ok(),
                _ => None,
            };
            match task_id {
                Some(task_id) => Ok(ClientMessage::CompleteTask { task_id }),
                None => Err(ProtocolError::InvalidTaskId(
                    object
                        .get("task_id")
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "missing".to_string()),
                )),
            }
        }
        other => Err(ProtocolError::UnknownKind(other.to_string())),
    }
}

/// UI control signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Show the typing indicator
    Typing,
    /// Ask the client to reload (recovery path after a model failure)
    Reload,
    /// Login completed; the token rides along
    LoginSuccess,
}

/// An outbound event on the chat socket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// UI control signal
    Command {
        command: Command,
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        redirect_url: Option<String>,
    },
    /// Final agent text for the turn
    Reply { reply: String },
    /// Tool-in-progress notice
    Using { tool_message: String },
    /// Three suggested follow-up questions
    Actions { actions: Vec<String> },
    /// Malformed/unknown inbound message
    Error { error: String },
}

impl ServerEvent {
    pub fn typing() -> Self {
        ServerEvent::Command {
            command: Command::Typing,
            token: None,
            redirect_url: None,
        }
    }

    pub fn reload() -> Self {
        ServerEvent::Command {
            command: Command::Reload,
            token: None,
            redirect_url: None,
        }
    }

    pub fn login_success(token: String) -> Self {
        ServerEvent::Command {
            command: Command::LoginSuccess,
            token: Some(token),
            redirect_url: Some("/".to_string()),
        }
    }

    pub fn reply(reply: impl Into<String>) -> Self {
        ServerEvent::Reply {
            reply: reply.into(),
        }
    }

    pub fn using(tool_message: impl Into<String>) -> Self {
        ServerEvent::Using {
            tool_message: tool_message.into(),
        }
    }

    pub fn actions(actions: Vec<String>) -> Self {
        ServerEvent::Actions { actions }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerEvent::Error {
            error: error.into(),
        }
    }
}
