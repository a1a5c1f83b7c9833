use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

mod agent;
mod config;
mod db;
mod embeddings;
mod error;
mod judge;
mod llm;
mod rag;
mod retry;
mod service;
#[cfg(test)]
mod testing;
mod tools;

use crate::config::load_config;
use crate::db::Database;
use crate::embeddings::OpenAiEmbedder;
use crate::llm::OpenAiClient;
use crate::retry::RetryPolicy;
use crate::service::NpcJudgeService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("Starting NPC judge service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    std::fs::create_dir_all(&config.storage.data_dir)?;

    let db_path = config.storage.database_path();
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    if let Some(addr) = config.metrics.listen_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Prometheus exporter listening");
    }

    let retry = RetryPolicy::from_config(&config.retry);
    let llm = Arc::new(OpenAiClient::new(config.llm.clone(), retry)?);
    let embedder = Arc::new(OpenAiEmbedder::new(&config.llm, &config.embeddings, retry)?);
    info!(
        url = %config.llm.base_url,
        model = %config.llm.model,
        embedding_model = %config.embeddings.model,
        "Model clients initialized"
    );

    let service = Arc::new(NpcJudgeService::new(config, db, llm, embedder));

    // Seeding is best-effort; judging still works against an empty store
    match service.seed_vector_store().await {
        Ok(report) => info!(
            rules = report.rules,
            conversations = report.conversations,
            skipped = report.skipped,
            "Vector store seeded"
        ),
        Err(e) => warn!(error = %e, "Vector store seeding failed"),
    }

    match service.db.reset_interrupted_requests() {
        Ok(count) if count > 0 => info!(count, "Requeued interrupted requests"),
        Err(e) => warn!(error = %e, "Failed to requeue interrupted requests"),
        _ => {}
    }

    NpcJudgeService::start_judge_worker(service.clone());
    NpcJudgeService::start_agent_worker(service.clone());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("npc_judge_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
