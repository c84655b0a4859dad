//! The login agent welcomes users and signs them in by username

use std::sync::{Arc, LazyLock};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::parse_args;
use crate::agents::core::AgentCore;
use crate::agents::definition::{parameters_of, AgentDefinition};
use crate::agents::dispatch::ProgressReporter;
use crate::agents::llm::ModelClient;
use crate::domain::auth::TokenCodec;
use crate::persistence::Storage;

const SYSTEM_PROMPT: &str = r#"You are the welcoming presence for Flowstate, a human-first task management tool designed to feel like an
innate extension of the user. Your purpose is to provide a warm, friendly welcome to users as they log in
to the application.

Flowstate is the first app from 8ly, a company dedicated to creating tools that are "innately you, innately human."

Guidelines:
- Never refer to yourself as an AI, agent, or assistant. Do not mention automation or technical processes.
- Don't talk about Flowstate as an app, use the name Flowstate instead.
- Respond and act in a way that feels intuitive, supportive, and innately human.
- Keep your welcome messages brief, warm, and encouraging.
- If this is a new user, make them feel especially welcome.
- If this is a returning user, acknowledge their return in a natural way.
- When the user gives you a name to sign in with, use the authenticate_user tool right away.

Tone:
Natural, warm, and friendly. Always prioritize making the user feel welcome and comfortable."#;

/// What the login agent's tool needs
pub struct LoginDeps {
    pub storage: Arc<dyn Storage>,
    pub tokens: TokenCodec,
    /// Freshly signed access tokens; the chat handler turns these into
    /// `login_success` commands
    pub token_outbox: mpsc::UnboundedSender<String>,
}

static DEFINITION: LazyLock<AgentDefinition<LoginDeps>> = LazyLock::new(|| {
    AgentDefinition::builder("login", SYSTEM_PROMPT)
        .labeled_tool(
            "Signing in {username}",
            "authenticate_user",
            "Authenticate a user by username. Finds the existing user or registers a new one, \
             then issues them an access token.",
            parameters_of::<AuthenticateArgs>(),
            |deps, args| async move { authenticate_user(deps, args).await },
        )
        .build()
        .expect("login agent definition is valid")
});

/// Build a live login agent for one connection
pub fn login_agent(
    model: Arc<dyn ModelClient>,
    storage: Arc<dyn Storage>,
    tokens: TokenCodec,
    token_outbox: mpsc::UnboundedSender<String>,
    reporter: Option<ProgressReporter>,
) -> AgentCore<LoginDeps> {
    let deps = Arc::new(LoginDeps {
        storage,
        tokens,
        token_outbox,
    });
    AgentCore::new(&DEFINITION, model, deps, reporter)
}

#[derive(Deserialize, JsonSchema)]
struct AuthenticateArgs {
    /// The username to sign in with
    username: String,
}

async fn authenticate_user(deps: Arc<LoginDeps>, args: Value) -> anyhow::Result<Value> {
    let args: AuthenticateArgs = parse_args(args)?;
    let username = args.username.trim();
    if username.len() < 3 {
        return Ok(json!("Invalid username"));
    }

    let user = match deps.storage.get_user_by_username(username).await? {
        Some(user) => user,
        None => {
            let user_id = deps.storage.insert_user(username, None).await?;
            deps.storage
                .get_user_by_id(user_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", user_id))?
        }
    };

    let token = deps.tokens.generate_access_token(user.id);
    // The receiver may be gone if the connection dropped mid-call
    let _ = deps.token_outbox.send(token);

    Ok(json!(format!(
        "{} authenticated, giving access in 5 seconds",
        user.username
    )))
}
