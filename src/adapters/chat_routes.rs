//! WebSocket upgrade handlers
//!
//! Each route authenticates (where required), builds the chat handler for
//! the connection, and bridges the socket onto the transport-agnostic
//! actor loop in [`crate::chat::connection`].

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapters::api_handler::current_user;
use crate::chat::connection::run_chat;
use crate::chat::nudge::NudgeTimer;
use crate::chat::protocol::ServerEvent;
use crate::chat::{ChatHandler, FlowstateChat, LearnMoreChat, LoginChat};
use crate::domain::{Project, User};
use crate::persistence::Storage;
use crate::AppState;

/// `GET /ws/chat`: the dashboard chat with no project bound
pub async fn chat_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    serve_chat(state, ws, headers, None).await
}

/// `GET /ws/chat/{project_id}`: the dashboard chat bound to a project
pub async fn project_chat_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Path(project_id): Path<i64>,
) -> Response {
    serve_chat(state, ws, headers, Some(project_id)).await
}

async fn serve_chat(
    state: AppState,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    project_id: Option<i64>,
) -> Response {
    let Some(user) = current_user(&state, &headers).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let project: Option<Project> = match project_id {
        Some(project_id) => state
            .storage
            .get_project(project_id)
            .await
            .ok()
            .flatten()
            .filter(|p| p.user_id == user.id),
        None => None,
    };

    ws.on_upgrade(move |socket| flowstate_connection(socket, state, user, project))
}

async fn flowstate_connection(
    socket: WebSocket,
    state: AppState,
    user: User,
    project: Option<Project>,
) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let chat = FlowstateChat::new(
        state.model.clone(),
        state.storage.clone(),
        user,
        project,
        events_tx.clone(),
    );
    pump(socket, chat, events_tx, events_rx, Some(NudgeTimer::new())).await;
}

/// `GET /ws/login`: the conversational sign-in (anonymous)
pub async fn login_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let chat = LoginChat::new(
            state.model.clone(),
            state.storage.clone(),
            state.tokens.clone(),
            events_tx.clone(),
        );
        pump(socket, chat, events_tx, events_rx, None).await;
    })
}

/// `GET /ws/learn-more`: the pitch chat; works logged out too
pub async fn learn_more_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let user = current_user(&state, &headers).await;
    ws.on_upgrade(move |socket| async move {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let chat = LearnMoreChat::new(
            state.model.clone(),
            state.small_model.clone(),
            state.docs.clone(),
            user,
            events_tx.clone(),
        );
        pump(socket, chat, events_tx, events_rx, None).await;
    })
}

/// Bridge a WebSocket onto the chat actor: a writer draining events onto
/// the socket, a reader feeding frames into the loop. The socket is
/// closed exactly once, by the writer, after every event sender is gone.
async fn pump<H: ChatHandler + 'static>(
    socket: WebSocket,
    chat: H,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    mut events_rx: mpsc::UnboundedReceiver<ServerEvent>,
    nudge: Option<NudgeTimer>,
) {
    let (mut sink, mut stream) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    let chat_task = run_chat(chat, inbound_rx, events_tx, nudge);

    let writer = async move {
        while let Some(event) = events_rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
        // Sole close site; failing to close an already-gone socket is fine
        let _ = sink.close().await;
        debug!("chat socket closed");
    };

    let reader = async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                WsMessage::Text(text) => {
                    if inbound_tx.send(text).is_err() {
                        break;
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
        // Dropping the sender ends the chat loop
    };

    tokio::join!(chat_task, writer, reader);
}
