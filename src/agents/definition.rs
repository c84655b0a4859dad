//! Agent definitions and tool descriptors
//!
//! An [`AgentDefinition`] is the immutable per-type configuration of an
//! agent: its system prompt and the ordered set of tools the model may
//! call. Definitions are built once through [`DefinitionBuilder`]. Tools
//! are registered explicitly, in declaration order, so the tool surface of
//! every agent is auditable in one place.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::agents::error::{AgentError, AgentResult};

/// Boxed async tool body: receives the agent's dependencies and the bound
/// arguments, produces a JSON result for the model.
pub type ToolHandler<D> = Arc<dyn Fn(Arc<D>, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// One callable tool attached to an agent definition
pub struct ToolDescriptor<D> {
    /// Tool name as exposed to the model
    pub name: &'static str,
    /// Description the model uses to decide when to call it
    pub description: &'static str,
    /// JSON Schema for the tool's arguments
    pub parameters: Value,
    /// Progress-label template (`"Creating task {title}"`); the tool name
    /// is used when absent
    pub label: Option<&'static str>,
    /// The tool body
    pub handler: ToolHandler<D>,
}

impl<D> Clone for ToolDescriptor<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            description: self.description,
            parameters: self.parameters.clone(),
            label: self.label,
            handler: self.handler.clone(),
        }
    }
}

/// Immutable per-type agent configuration
pub struct AgentDefinition<D> {
    /// Agent type name (used in logs)
    pub name: &'static str,
    /// The system prompt, verbatim as registered
    pub system_prompt: String,
    /// Tools in declaration order
    pub tools: Vec<ToolDescriptor<D>>,
}

impl<D> std::fmt::Debug for AgentDefinition<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("system_prompt", &self.system_prompt)
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<D> AgentDefinition<D> {
    /// Start building a definition. The system prompt is a required,
    /// explicit field; there is no implicit source for it.
    pub fn builder(name: &'static str, system_prompt: impl Into<String>) -> DefinitionBuilder<D> {
        DefinitionBuilder {
            name,
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
        }
    }
}

/// Builder for [`AgentDefinition`]
pub struct DefinitionBuilder<D> {
    name: &'static str,
    system_prompt: String,
    tools: Vec<ToolDescriptor<D>>,
}

impl<D> DefinitionBuilder<D> {
    /// Register a tool. Declaration order is preserved.
    pub fn tool<F, Fut>(
        self,
        name: &'static str,
        description: &'static str,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Arc<D>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(name, description, parameters, None, handler)
    }

    /// Register a tool with a progress-label template. `{param}`
    /// placeholders are filled from the bound argument values when the
    /// label is shown to the user.
    pub fn labeled_tool<F, Fut>(
        self,
        label: &'static str,
        name: &'static str,
        description: &'static str,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Arc<D>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(name, description, parameters, Some(label), handler)
    }

    fn register<F, Fut>(
        mut self,
        name: &'static str,
        description: &'static str,
        parameters: Value,
        label: Option<&'static str>,
        handler: F,
    ) -> Self
    where
        F: Fn(Arc<D>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: ToolHandler<D> = Arc::new(move |deps, args| Box::pin(handler(deps, args)));
        self.tools.push(ToolDescriptor {
            name,
            description,
            parameters,
            label,
            handler,
        });
        self
    }

    /// Finalise the definition. An empty system prompt is rejected here:
    /// an agent with no instructions would silently behave like a generic
    /// chat model, so the type is refused at definition time instead.
    pub fn build(self) -> AgentResult<AgentDefinition<D>> {
        if self.system_prompt.trim().is_empty() {
            return Err(AgentError::Configuration(format!(
                "agent '{}' has an empty system prompt",
                self.name
            )));
        }
        Ok(AgentDefinition {
            name: self.name,
            system_prompt: self.system_prompt,
            tools: self.tools,
        })
    }
}

/// Derive a JSON Schema for a tool's argument struct
pub fn parameters_of<T: schemars::JsonSchema>() -> Value {
    let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
    serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }))
}

/// Schema for tools that take no arguments
pub fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {} })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_deps: Arc<()>, _args: Value) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    #[test]
    fn tools_keep_declaration_order() {
        let definition = AgentDefinition::<()>::builder("test", "Do things.")
            .tool("alpha", "first", no_parameters(), noop)
            .tool("zulu", "second", no_parameters(), noop)
            .tool("mike", "third", no_parameters(), noop)
            .build()
            .unwrap();

        let names: Vec<_> = definition.tools.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha", "zulu", "mike"]);
    }

    #[test]
    fn system_prompt_kept_verbatim() {
        let prompt = "  You are the coordinator.\nSecond line.  ";
        let definition = AgentDefinition::<()>::builder("test", prompt)
            .build()
            .unwrap();
        assert_eq!(definition.system_prompt, prompt);
    }

    #[test]
    fn empty_prompt_is_rejected() {
        let err = AgentDefinition::<()>::builder("test", "   \n")
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }
}
