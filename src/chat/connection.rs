//! The per-connection chat actor
//!
//! [`run_chat`] owns one connection's receive loop: it decodes inbound
//! frames, dispatches them to the handler by an explicit match on the
//! tagged union, and interleaves the idle-nudge timer. The loop is the
//! single logical sequence for the connection: a new message is not
//! started until the current turn's side effects are done, and the nudge
//! can only fire while the loop is idle waiting for input.
//!
//! The transport is abstracted to a pair of channels; the axum adapter
//! bridges them to the WebSocket and owns the close-exactly-once guard.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::agents::dispatch::ProgressReporter;
use crate::agents::error::AgentError;
use crate::chat::nudge::{idle_deadline, NudgeTimer};
use crate::chat::protocol::{parse_client_message, ClientMessage, ServerEvent};
use crate::persistence::PersistenceError;

/// Outbound half of a connection
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Failures inside a chat turn
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Storage(#[from] PersistenceError),
}

/// One chat flavor (task chat, login chat, learn-more chat)
#[async_trait]
pub trait ChatHandler: Send {
    /// Runs once after the connection is accepted
    async fn on_connect(&mut self, events: &EventSender) -> Result<(), ChatError> {
        let _ = events;
        Ok(())
    }

    /// A user prompt for the agent
    async fn on_prompt(&mut self, prompt: String, events: &EventSender) -> Result<(), ChatError>;

    /// A task-completion request; chats without tasks reject it
    async fn on_complete_task(
        &mut self,
        task_id: i64,
        events: &EventSender,
    ) -> Result<(), ChatError> {
        let _ = task_id;
        let _ = events.send(ServerEvent::error(
            "Completing tasks is not supported in this chat",
        ));
        Ok(())
    }

    /// The idle timer fired; re-engage the user
    async fn on_nudge(&mut self, events: &EventSender) -> Result<(), ChatError> {
        let _ = events;
        Ok(())
    }
}

/// Drive one connection until the inbound stream closes.
///
/// Pass a [`NudgeTimer`] to enable idle nudging; every inbound frame
/// replaces the pending nudge with a fresh one, so at most one nudge is
/// ever scheduled.
pub async fn run_chat<H: ChatHandler>(
    mut handler: H,
    mut inbound: mpsc::UnboundedReceiver<String>,
    events: EventSender,
    mut nudge: Option<NudgeTimer>,
) {
    if let Err(e) = handler.on_connect(&events).await {
        report_turn_failure(&events, &e);
    }
    if let Some(timer) = nudge.as_mut() {
        timer.arm_initial();
    }

    loop {
        let deadline = nudge.as_ref().and_then(|t| t.deadline());

        tokio::select! {
            frame = inbound.recv() => {
                let Some(text) = frame else { break };

                // Every inbound message cancels the pending nudge and
                // schedules a fresh one
                if let Some(timer) = nudge.as_mut() {
                    timer.arm_initial();
                }

                match parse_client_message(&text) {
                    Ok(ClientMessage::Prompt { prompt }) => {
                        if let Err(e) = handler.on_prompt(prompt, &events).await {
                            report_turn_failure(&events, &e);
                        }
                    }
                    Ok(ClientMessage::CompleteTask { task_id }) => {
                        if let Err(e) = handler.on_complete_task(task_id, &events).await {
                            warn!(task_id, error = %e, "complete_task failed");
                        }
                    }
                    Err(protocol_error) => {
                        let _ = events.send(protocol_error.to_event());
                    }
                }
            }
            _ = idle_deadline(deadline) => {
                if let Err(e) = handler.on_nudge(&events).await {
                    error!(error = %e, "nudge failed");
                }
                if let Some(timer) = nudge.as_mut() {
                    timer.arm_followup();
                }
            }
        }
    }

    if let Some(timer) = nudge.as_mut() {
        timer.disarm();
    }
    info!("chat connection closed");
}

/// Surface a failed turn to the client: an apology plus a reload hint.
/// The error is logged, the connection stays open for a fresh attempt.
fn report_turn_failure(events: &EventSender, error: &ChatError) {
    error!(error = %error, "chat turn failed");
    let _ = events.send(ServerEvent::reply(
        "I'm sorry, something went wrong. Please try again in a moment.",
    ));
    let _ = events.send(ServerEvent::reload());
}

/// Bridge the tool dispatchers' progress labels onto a connection's
/// event stream as `using` events.
pub fn progress_reporter(events: EventSender) -> ProgressReporter {
    std::sync::Arc::new(move |label| {
        // A closed channel just means nobody is watching anymore
        let _ = events.send(ServerEvent::using(label));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    use crate::chat::protocol::Command;

    #[derive(Default)]
    struct Recording {
        prompts: Vec<String>,
        completed: Vec<i64>,
        nudge_times: Vec<Instant>,
    }

    struct RecordingHandler {
        recording: Arc<Mutex<Recording>>,
        fail_prompts: bool,
    }

    #[async_trait]
    impl ChatHandler for RecordingHandler {
        async fn on_prompt(
            &mut self,
            prompt: String,
            events: &EventSender,
        ) -> Result<(), ChatError> {
            if self.fail_prompts {
                return Err(ChatError::Agent(AgentError::ModelUnavailable(
                    crate::agents::error::LlmError::Timeout,
                )));
            }
            self.recording.lock().unwrap().prompts.push(prompt.clone());
            let _ = events.send(ServerEvent::typing());
            let _ = events.send(ServerEvent::reply(format!("echo: {}", prompt)));
            Ok(())
        }

        async fn on_complete_task(
            &mut self,
            task_id: i64,
            _events: &EventSender,
        ) -> Result<(), ChatError> {
            self.recording.lock().unwrap().completed.push(task_id);
            Ok(())
        }

        async fn on_nudge(&mut self, events: &EventSender) -> Result<(), ChatError> {
            self.recording.lock().unwrap().nudge_times.push(Instant::now());
            let _ = events.send(ServerEvent::reply("still there?"));
            Ok(())
        }
    }

    fn spawn_chat(
        fail_prompts: bool,
        nudge: Option<NudgeTimer>,
    ) -> (
        Arc<Mutex<Recording>>,
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        let handler = RecordingHandler {
            recording: recording.clone(),
            fail_prompts,
        };
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_chat(handler, inbound_rx, events_tx, nudge));
        (recording, inbound_tx, events_rx)
    }

    #[tokio::test]
    async fn prompts_produce_typing_then_reply() {
        let (recording, inbound, mut events) = spawn_chat(false, None);

        inbound
            .send(r#"{"kind":"prompt","prompt":"Add hummus to my shopping list"}"#.to_string())
            .unwrap();

        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        let reply = events.recv().await.unwrap();
        assert_eq!(
            reply,
            ServerEvent::reply("echo: Add hummus to my shopping list")
        );
        assert_eq!(
            recording.lock().unwrap().prompts,
            vec!["Add hummus to my shopping list"]
        );
    }

    #[tokio::test]
    async fn complete_task_reaches_the_handler_with_no_reply_event() {
        let (recording, inbound, mut events) = spawn_chat(false, None);

        inbound
            .send(r#"{"type":"complete_task","task_id":"7"}"#.to_string())
            .unwrap();
        inbound
            .send(r#"{"kind":"prompt","prompt":"done"}"#.to_string())
            .unwrap();

        // The first event is the typing for the *prompt*; nothing was
        // emitted for the completion
        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        assert_eq!(recording.lock().unwrap().completed, vec![7]);
    }

    #[tokio::test]
    async fn unknown_kinds_error_and_the_connection_stays_usable() {
        let (recording, inbound, mut events) = spawn_chat(false, None);

        inbound.send(r#"{"kind":"frobnicate"}"#.to_string()).unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "type": "error", "error": "Invalid message type: frobnicate" })
        );

        inbound
            .send(r#"{"kind":"prompt","prompt":"still here"}"#.to_string())
            .unwrap();
        assert_eq!(events.recv().await.unwrap(), ServerEvent::typing());
        assert_eq!(recording.lock().unwrap().prompts, vec!["still here"]);
    }

    #[tokio::test]
    async fn failed_turns_apologize_and_signal_reload() {
        let (_recording, inbound, mut events) = spawn_chat(true, None);

        inbound
            .send(r#"{"kind":"prompt","prompt":"hello"}"#.to_string())
            .unwrap();

        let apology = events.recv().await.unwrap();
        assert!(matches!(apology, ServerEvent::Reply { ref reply } if reply.contains("sorry")));
        let reload = events.recv().await.unwrap();
        assert!(matches!(
            reload,
            ServerEvent::Command {
                command: Command::Reload,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn nudges_fire_on_idle_and_reschedule_with_jitter() {
        let (recording, inbound, mut events) = spawn_chat(false, Some(NudgeTimer::new()));

        // A quick burst of prompts; each re-arms the single nudge slot
        let start = Instant::now();
        for _ in 0..3 {
            inbound
                .send(r#"{"kind":"prompt","prompt":"hi"}"#.to_string())
                .unwrap();
        }
        for _ in 0..3 {
            events.recv().await.unwrap(); // typing
            events.recv().await.unwrap(); // reply
        }

        // First nudge: five idle minutes after the last message
        let nudge = events.recv().await.unwrap();
        assert_eq!(nudge, ServerEvent::reply("still there?"));
        let first = recording.lock().unwrap().nudge_times[0];
        assert!(first.duration_since(start) >= Duration::from_secs(300));

        // Second nudge: randomized 60–300 s after the first
        let nudge = events.recv().await.unwrap();
        assert_eq!(nudge, ServerEvent::reply("still there?"));
        let times = recording.lock().unwrap().nudge_times.clone();
        let gap = times[1].duration_since(times[0]);
        assert!(gap >= Duration::from_secs(60) && gap <= Duration::from_secs(300));

        drop(inbound);
    }
}
