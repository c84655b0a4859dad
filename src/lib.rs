//! # Flowstate
//!
//! A human-first task-management web application: projects and tasks are
//! managed through natural-language conversation with an agent, alongside
//! a conventional JSON API.
//!
//! ## Architecture
//!
//! - **agents**: the agent runtime: declarative definitions (system
//!   prompt + explicitly registered tools), conversation sessions, tool
//!   dispatch with progress reporting and per-call error isolation, and
//!   the model providers.
//! - **chat**: the WebSocket protocol layer: tagged inbound/outbound
//!   messages, a per-connection actor loop, and the idle-nudge timer.
//! - **adapters**: axum route handlers and the SMTP mailer.
//! - **persistence**: the `Storage` trait and its SQLite implementation.

pub mod adapters;
pub mod agents;
pub mod chat;
pub mod cli;
pub mod config;
pub mod domain;
pub mod persistence;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::agents::catalog::LearnMoreDeps;
use crate::agents::llm::ModelClient;
use crate::domain::auth::TokenCodec;
use crate::persistence::Storage;

/// Shared state behind every route
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub model: Arc<dyn ModelClient>,
    pub small_model: Arc<dyn ModelClient>,
    pub tokens: TokenCodec,
    pub mailer: Option<Arc<adapters::Mailer>>,
    pub docs: Arc<LearnMoreDeps>,
    /// Public base URL used in login links
    pub public_url: String,
}

/// Build the application router
pub fn create_app(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/login", post(adapters::api_handler::request_login_link))
        .route("/verify", get(adapters::api_handler::verify_login_token))
        .route(
            "/projects",
            get(adapters::api_handler::list_projects).post(adapters::api_handler::create_project),
        )
        .route(
            "/projects/:project_id",
            axum::routing::delete(adapters::api_handler::delete_project),
        )
        .route(
            "/projects/:project_id/tasks",
            get(adapters::api_handler::list_project_tasks)
                .post(adapters::api_handler::create_task),
        )
        .route(
            "/tasks/:task_id",
            get(adapters::api_handler::get_task)
                .patch(adapters::api_handler::update_task)
                .delete(adapters::api_handler::delete_task),
        )
        .route(
            "/tasks/:task_id/email-draft",
            get(adapters::api_handler::draft_task_email),
        )
        .route("/me/top-task", get(adapters::api_handler::top_task));

    let ws_router = Router::new()
        .route("/chat", get(adapters::chat_routes::chat_ws))
        .route("/chat/:project_id", get(adapters::chat_routes::project_chat_ws))
        .route("/login", get(adapters::chat_routes::login_ws))
        .route("/learn-more", get(adapters::chat_routes::learn_more_ws));

    Router::new()
        .nest("/api", api_router)
        .nest("/ws", ws_router)
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}
