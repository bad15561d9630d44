use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

mod app;
mod error;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memoria_server=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > MEMORIA_CONFIG env > ~/.memoria/memoria.toml
    let config_path = std::env::var("MEMORIA_CONFIG").ok();
    let config = memoria_core::MemoriaConfig::load(config_path.as_deref())?;

    let stores = Arc::new(memoria_stores::Stores::open(&config.stores.relational_dsn)?);

    let embedder: Arc<dyn memoria_gateways::Embedder> = match &config.llm.api_key {
        Some(key) => Arc::new(memoria_gateways::HttpEmbedder::new(
            key.clone(),
            None,
            config.llm.embedding_model.clone(),
        )),
        None => {
            tracing::warn!("no llm.api_key configured, falling back to the deterministic embedder");
            Arc::new(memoria_gateways::DeterministicEmbedder)
        }
    };

    let llm: Arc<dyn memoria_gateways::LlmClient> = match &config.llm.api_key {
        Some(key) => Arc::new(memoria_gateways::HttpLlmClient::new(
            key.clone(),
            None,
            config.llm.model.clone(),
        )),
        None => {
            tracing::warn!("no llm.api_key configured, falling back to the failing fake LLM client");
            Arc::new(memoria_gateways::FakeLlmClient::failing())
        }
    };

    let bind = config.server.bind.clone();
    let port = config.server.port;
    let state = Arc::new(app::AppState::new(config, stores, embedder, llm));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("memoria-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
