//! Synthgate binary: load config, wire the components, serve.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use synthgate::assistant::{AssistantApi, OpenAiAssistantClient};
use synthgate::config::Config;
use synthgate::orders::OrderService;
use synthgate::safety::SafetyFilter;
use synthgate::server::{AppState, start_server};
use synthgate::state::ConversationStore;
use synthgate::turn::TurnOrchestrator;

#[derive(Parser)]
#[command(
    name = "synthgate",
    about = "Conversational gateway for a hosted test-data assistant"
)]
struct Cli {
    /// Address to bind, overriding GATEWAY_HOST/GATEWAY_PORT.
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("synthgate=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_env()?;
    let addr = match cli.listen {
        Some(addr) => addr,
        None => config.server.socket_addr()?,
    };

    let assistant: Arc<dyn AssistantApi> = Arc::new(OpenAiAssistantClient::new(&config.assistant)?);
    let store = Arc::new(ConversationStore::new());
    let orders = Arc::new(OrderService::new());
    let safety = SafetyFilter::new(config.safety.clone());
    let orchestrator = TurnOrchestrator::new(
        Arc::clone(&assistant),
        Arc::clone(&store),
        Arc::clone(&orders),
        config.poll.clone(),
    );

    let state = Arc::new(AppState {
        orchestrator,
        store,
        assistant,
        orders,
        safety,
        shutdown_tx: tokio::sync::RwLock::new(None),
    });

    let bound = start_server(addr, Arc::clone(&state)).await?;
    tracing::info!(%bound, assistant_id = %config.assistant.assistant_id, "synthgate listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    state.shutdown().await;

    Ok(())
}
