//! The tool-resolving model round trip
//!
//! One user prompt can take several internal turns with the model: the
//! model asks for tool calls, the dispatchers run them, the results go
//! back, and the loop repeats until the model produces final text. The
//! transcript grows in place so the caller can persist the whole exchange.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::agents::dispatch::ToolDispatcher;
use crate::agents::error::LlmError;
use crate::agents::llm::{CompletionRequest, Message, ModelClient};

/// Cap on model turns inside a single exchange
pub(crate) const MAX_ROUNDS: u32 = 12;

/// Why an exchange did not produce a final reply
pub(crate) enum ExchangeError {
    /// The model collaborator failed; the caller decides retry policy
    Model(LlmError),
    /// The model kept calling tools past the round cap
    MaxRounds(u32),
}

/// Run one exchange to completion, resolving tool calls transparently.
///
/// `messages` must already contain the system prompt, history and the new
/// user prompt; on success it additionally contains every assistant/tool
/// message produced along the way, ending with the final assistant text.
pub(crate) async fn resolve_exchange<D>(
    model: &dyn ModelClient,
    dispatchers: &[ToolDispatcher<D>],
    deps: &Arc<D>,
    messages: &mut Vec<Message>,
    response_schema: Option<Value>,
) -> Result<String, ExchangeError> {
    for round in 0..MAX_ROUNDS {
        let request = CompletionRequest {
            messages: messages.clone(),
            // Typed requests constrain the output instead of offering tools
            tools: if response_schema.is_some() {
                Vec::new()
            } else {
                dispatchers.iter().map(|d| d.spec()).collect()
            },
            response_schema: response_schema.clone(),
            ..Default::default()
        };

        let response = model
            .complete(request)
            .await
            .map_err(ExchangeError::Model)?;

        let tool_calls = response.message.tool_calls.clone().unwrap_or_default();
        if tool_calls.is_empty() {
            messages.push(response.message.clone());
            return Ok(response.message.content);
        }

        debug!(round, calls = tool_calls.len(), "resolving tool calls");
        messages.push(response.message.clone());

        for call in &tool_calls {
            let result = match dispatchers.iter().find(|d| d.name() == call.name) {
                Some(dispatcher) => dispatcher.dispatch(deps.clone(), call.arguments.clone()).await,
                None => json!(format!("Error in tool {}: unknown tool", call.name)),
            };
            messages.push(Message::tool_result(&call.id, &call.name, &result));
        }
    }

    Err(ExchangeError::MaxRounds(MAX_ROUNDS))
}
