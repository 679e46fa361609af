use std::sync::Arc;

use draft_assist::config::Config;
use draft_assist::http::routes;
use draft_assist::llm::{OpenAiGenerator, TextGenerator};
use draft_assist::pipeline::orchestrator::{Orchestrator, OrchestratorConfig};
use draft_assist::records::DraftLog;
use draft_assist::store::{GraphMailStore, MessageStore, StaticTokenSource, TokenSource};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let tokens: Arc<dyn TokenSource> =
        Arc::new(StaticTokenSource::new(config.graph_access_token.clone()));
    let store: Arc<dyn MessageStore> = Arc::new(GraphMailStore::new(
        http.clone(),
        config.graph_base_url.clone(),
        tokens,
    ));
    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(
        http,
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.generation_timeout,
    ));

    let records = DraftLog::new(config.record_capacity);
    let orchestrator = Arc::new(Orchestrator::new(
        store,
        generator,
        Arc::clone(&records),
        OrchestratorConfig {
            dedup_ttl: config.dedup_ttl,
            history_window_days: config.history_window_days,
            history_limit: config.history_limit,
            drafts_limit: config.drafts_limit,
            client_state: config.client_state.clone(),
        },
    ));

    let app = routes(orchestrator, records);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        addr = %listener.local_addr()?,
        model = %config.openai_model,
        "Draft Assist listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
