use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use flowstate::adapters::Mailer;
use flowstate::agents::catalog::LearnMoreDeps;
use flowstate::agents::llm::{create_client, ModelClient};
use flowstate::cli::Cli;
use flowstate::config::Settings;
use flowstate::domain::auth::TokenCodec;
use flowstate::persistence::SqliteStorage;
use flowstate::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    info!(
        "Starting Flowstate on {}:{}",
        settings.server.host, settings.server.port
    );

    let storage = Arc::new(SqliteStorage::connect(&settings.database.url).await?);
    let model = create_client(&settings.llm.model)?;
    let small_model = create_client(settings.llm.small_model())?;
    info!(
        model = model.model(),
        small_model = small_model.model(),
        "model clients ready"
    );

    let mailer = match &settings.smtp {
        Some(smtp) => Some(Arc::new(Mailer::new(smtp)?)),
        None => None,
    };

    let state = AppState {
        storage,
        model,
        small_model,
        tokens: TokenCodec::new(&settings.auth.secret_key()),
        mailer,
        docs: Arc::new(LearnMoreDeps::new(settings.docs.root.clone().into())),
        public_url: settings.server.public_url.clone(),
    };

    let app = flowstate::create_app(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
