//! Tool dispatch: argument binding, progress reporting, error isolation
//!
//! Every registered tool is wrapped in a [`ToolDispatcher`] before it is
//! handed to the model round-trip. The dispatcher is the reliability
//! boundary around a single tool call: a broken integration produces an
//! error string the model can react to, never an aborted conversation.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::agents::definition::ToolDescriptor;
use crate::agents::error::AgentError;
use crate::agents::llm::ToolSpec;

/// Callback the dispatcher reports in-flight tool labels through. The
/// call must not block; reporters push onto an unbounded channel. `None`
/// when the agent runs outside a live chat.
pub type ProgressReporter = Arc<dyn Fn(String) + Send + Sync>;

/// Wraps one tool with binding, reporting and per-call error isolation
pub struct ToolDispatcher<D> {
    descriptor: ToolDescriptor<D>,
    reporter: Option<ProgressReporter>,
}

impl<D> ToolDispatcher<D> {
    pub fn new(descriptor: ToolDescriptor<D>, reporter: Option<ProgressReporter>) -> Self {
        Self {
            descriptor,
            reporter,
        }
    }

    /// Tool name as exposed to the model
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Declaration sent to the model provider
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.descriptor.name.to_string(),
            description: self.descriptor.description.to_string(),
            parameters: self.descriptor.parameters.clone(),
        }
    }

    /// Run the tool. Infallible by contract: binding failures and handler
    /// errors come back as `"Error in tool {name}: {message}"` strings so
    /// the exchange can continue.
    pub async fn dispatch(&self, deps: Arc<D>, arguments: Value) -> Value {
        let name = self.descriptor.name;

        let bound = match bind_arguments(&self.descriptor.parameters, arguments) {
            Ok(bound) => bound,
            Err(message) => {
                let error = AgentError::ArgumentBinding {
                    tool: name.to_string(),
                    message: message.clone(),
                };
                warn!(%error, "tool call rejected");
                return json!(format!("Error in tool {}: {}", name, message));
            }
        };

        let label = resolve_label(self.descriptor.label, name, &bound);
        debug!(tool = name, %label, "dispatching tool");
        if let Some(report) = &self.reporter {
            report(label);
        }

        match (self.descriptor.handler)(deps, bound).await {
            Ok(result) => result,
            Err(e) => {
                let error = AgentError::ToolExecution {
                    tool: name.to_string(),
                    message: e.to_string(),
                };
                warn!(%error, "tool call failed");
                json!(format!("Error in tool {}: {}", name, e))
            }
        }
    }
}

/// Check the model-supplied arguments against the declared schema.
/// Returns the bound argument object, or a human-readable failure message.
fn bind_arguments(parameters: &Value, arguments: Value) -> Result<Value, String> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };

    let Some(bound) = arguments.as_object() else {
        return Err(format!("expected an argument object, got {}", arguments));
    };

    if let Some(required) = parameters.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            match bound.get(key) {
                None | Some(Value::Null) => {
                    return Err(format!("missing required argument '{}'", key));
                }
                Some(_) => {}
            }
        }
    }

    Ok(Value::Object(bound.clone()))
}

/// Fill a label template's `{param}` placeholders from the bound arguments.
/// Falls back to the tool name when no template was registered.
fn resolve_label(template: Option<&str>, name: &str, arguments: &Value) -> String {
    let Some(template) = template else {
        return name.to_string();
    };

    let mut label = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        label.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match arguments.get(key) {
                    Some(Value::String(s)) => label.push_str(s),
                    Some(Value::Null) | None => {}
                    Some(other) => label.push_str(&other.to_string()),
                }
                rest = &after[close + 1..];
            }
            None => {
                label.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    label.push_str(rest);
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::agents::definition::{no_parameters, AgentDefinition};

    fn dispatcher_for(
        definition: AgentDefinition<AtomicUsize>,
        reporter: Option<ProgressReporter>,
    ) -> ToolDispatcher<AtomicUsize> {
        let descriptor = definition.tools.into_iter().next().unwrap();
        ToolDispatcher::new(descriptor, reporter)
    }

    #[tokio::test]
    async fn invokes_body_once_and_returns_result_unchanged() {
        let definition = AgentDefinition::<AtomicUsize>::builder("test", "prompt")
            .tool("echo", "echo", no_parameters(), |calls, args| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(args)
            })
            .build()
            .unwrap();

        let dispatcher = dispatcher_for(definition, None);
        let calls = Arc::new(AtomicUsize::new(0));
        let result = dispatcher
            .dispatch(calls.clone(), json!({ "value": 42 }))
            .await;

        assert_eq!(result, json!({ "value": 42 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_body_becomes_error_string() {
        let definition = AgentDefinition::<AtomicUsize>::builder("test", "prompt")
            .tool("broken", "always fails", no_parameters(), |_, _| async {
                anyhow::bail!("search backend down")
            })
            .build()
            .unwrap();

        let dispatcher = dispatcher_for(definition, None);
        let result = dispatcher.dispatch(Arc::new(AtomicUsize::new(0)), json!({})).await;

        let text = result.as_str().unwrap();
        assert!(text.starts_with("Error in tool broken:"));
        assert!(text.contains("search backend down"));
    }

    #[tokio::test]
    async fn missing_required_argument_skips_the_body() {
        let parameters = json!({
            "type": "object",
            "properties": { "title": { "type": "string" } },
            "required": ["title"]
        });
        let definition = AgentDefinition::<AtomicUsize>::builder("test", "prompt")
            .tool("create", "create", parameters, |calls, _| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
            .build()
            .unwrap();

        let dispatcher = dispatcher_for(definition, None);
        let calls = Arc::new(AtomicUsize::new(0));
        let result = dispatcher.dispatch(calls.clone(), json!({})).await;

        let text = result.as_str().unwrap();
        assert!(text.starts_with("Error in tool create:"));
        assert!(text.contains("missing required argument 'title'"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reporter_receives_the_resolved_label() {
        let seen: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
        let sink = seen.clone();
        let reporter: ProgressReporter = Arc::new(move |label| sink.lock().unwrap().push(label));

        let definition = AgentDefinition::<AtomicUsize>::builder("test", "prompt")
            .labeled_tool(
                "Creating task {title} in {project_name}",
                "create_task",
                "create",
                no_parameters(),
                |_, _| async { Ok(Value::Null) },
            )
            .build()
            .unwrap();

        let dispatcher = dispatcher_for(definition, Some(reporter));
        dispatcher
            .dispatch(
                Arc::new(AtomicUsize::new(0)),
                json!({ "title": "Hummus", "project_name": "Shopping" }),
            )
            .await;

        assert_eq!(
            seen.lock().unwrap().clone(),
            vec!["Creating task Hummus in Shopping".to_string()]
        );
    }

    #[test]
    fn label_falls_back_to_tool_name() {
        assert_eq!(resolve_label(None, "get_next_task", &json!({})), "get_next_task");
    }

    #[test]
    fn label_skips_missing_placeholders() {
        let label = resolve_label(
            Some("Deleting task {task_title} from {project_name}"),
            "delete",
            &json!({ "task_title": "Laundry" }),
        );
        assert_eq!(label, "Deleting task Laundry from ");
    }
}
