//! Gemini model provider (Google generative language API)

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    CompletionRequest, CompletionResponse, FinishReason, Message, ModelClient, Role, ToolCall,
};
use crate::agents::error::{LlmError, LlmResult};
use crate::config::ModelConfig;

/// Gemini model provider
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration
    pub fn new(config: &ModelConfig) -> LlmResult<Self> {
        let env_var = config.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY");
        let api_key = env::var(env_var).map_err(|_| {
            LlmError::Authentication(format!("Environment variable {} not set", env_var))
        })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the generateContent endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let (system_instruction, contents) = self.convert_messages(&request.messages);

        let mut body = json!({ "contents": contents });

        if let Some(system) = system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        if !request.tools.is_empty() {
            body["tools"] = json!([{
                "functionDeclarations": request.tools.iter().map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": sanitize_schema(t.parameters.clone()),
                    })
                }).collect::<Vec<_>>()
            }]);
        }

        let mut generation = json!({});
        if let Some(temp) = request.temperature.or(self.default_temperature) {
            generation["temperature"] = json!(temp);
        }
        if let Some(max) = request.max_tokens.or(self.default_max_tokens) {
            generation["maxOutputTokens"] = json!(max);
        }
        if let Some(schema) = &request.response_schema {
            generation["responseMimeType"] = json!("application/json");
            generation["responseSchema"] = sanitize_schema(schema.clone());
        }
        if generation.as_object().is_some_and(|o| !o.is_empty()) {
            body["generationConfig"] = generation;
        }

        body
    }

    /// Convert internal messages to Gemini contents
    /// Returns (system_instruction, contents)
    fn convert_messages(&self, messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        for m in messages {
            match m.role {
                Role::System => {
                    system_instruction = Some(m.content.clone());
                }
                Role::User => {
                    contents.push(json!({
                        "role": "user",
                        "parts": [{ "text": m.content }]
                    }));
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !m.content.is_empty() {
                        parts.push(json!({ "text": m.content }));
                    }
                    if let Some(tool_calls) = &m.tool_calls {
                        for tc in tool_calls {
                            parts.push(json!({
                                "functionCall": {
                                    "name": tc.name,
                                    "args": tc.arguments,
                                }
                            }));
                        }
                    }
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
                Role::Tool => {
                    // Gemini matches tool results by function name, not call id
                    let name = m.name.clone().unwrap_or_default();
                    let response: Value = serde_json::from_str(&m.content)
                        .unwrap_or_else(|_| Value::String(m.content.clone()));
                    contents.push(json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": {
                                "name": name,
                                "response": { "result": response },
                            }
                        }]
                    }));
                }
            }
        }

        (system_instruction, contents)
    }

    fn parse_response(&self, body: Value) -> LlmResult<CompletionResponse> {
        let candidate = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::Parse("response has no candidates".to_string()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        if let Some(parts) = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
        {
            for part in parts {
                if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                    text.push_str(t);
                }
                if let Some(call) = part.get("functionCall") {
                    let name = call
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let args = call.get("args").cloned().unwrap_or(json!({}));
                    tool_calls.push(ToolCall::new(ToolCall::generate_id(), name, args));
                }
            }
        }

        let finish_reason = if !tool_calls.is_empty() {
            FinishReason::ToolCalls
        } else {
            match candidate.get("finishReason").and_then(|f| f.as_str()) {
                Some("MAX_TOKENS") => FinishReason::Length,
                Some("SAFETY") | Some("PROHIBITED_CONTENT") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            }
        };

        Ok(CompletionResponse {
            message: Message::assistant_with_tools(text, tool_calls),
            finish_reason,
        })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.build_request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        self.parse_response(body)
    }
}

/// Strip schema metadata Gemini's OpenAPI-subset validator rejects
fn sanitize_schema(mut schema: Value) -> Value {
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
        for value in obj.values_mut() {
            if value.is_object() || value.is_array() {
                let sanitized = sanitize_schema(value.take());
                *value = sanitized;
            }
        }
    } else if let Some(arr) = schema.as_array_mut() {
        for value in arr.iter_mut() {
            let sanitized = sanitize_schema(value.take());
            *value = sanitized;
        }
    }
    schema
}
