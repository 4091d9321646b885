use std::sync::Arc;

use anyhow::Context;
use professor_chat::{
    config::Config,
    routes,
    services::{
        gemini::GeminiClient,
        orchestrator::ChatPipeline,
        pinecone::PineconeIndex,
        retrieval::ContextBuilder,
    },
    state::{AppState, ReplyMode},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!(?config, "configuration loaded");

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let gemini = Arc::new(GeminiClient::new(
        http.clone(),
        &config.gemini_api_key,
        &config.gemini_base_url,
        &config.embedding_model,
        &config.chat_model,
    ));
    let index = PineconeIndex::connect(
        http,
        &config.pinecone_api_key,
        &config.pinecone_control_url,
        &config.pinecone_index,
        config.pinecone_index_host.as_deref(),
    )
    .await
    .with_context(|| format!("connecting to pinecone index {}", config.pinecone_index))?;

    let context = ContextBuilder::new(
        gemini.clone(),
        Arc::new(index),
        &config.pinecone_namespace,
        config.top_k,
    );
    let reply_mode = if config.stream_tokens { ReplyMode::Streaming } else { ReplyMode::SingleChunk };
    let state = Arc::new(AppState::new(ChatPipeline::new(context, gemini), reply_mode));

    let app = routes::create_router(&config.static_dir).with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    info!("professor chat running at http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
