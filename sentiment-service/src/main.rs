use anyhow::Context;
use croplisten_core::AppConfig;
use sentiment::{Analyzer, HttpClassifier, Lexicon};
use std::path::Path;
use std::sync::Arc;
use storage::{DocumentStore, MongoStore};
use tracing::info;

mod orchestrator;
mod routes;

use orchestrator::BatchOrchestrator;
use routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sentiment_service=debug".into()),
        )
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let store = MongoStore::connect(&config.store.mongo_uri, &config.store.db_name)
        .await
        .context("connecting to document store")?;
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    let classifier = HttpClassifier::new(&config.sentiment_model_url)
        .context("building classifier client")?;
    let lexicon = match std::env::var("SENTIMENT_KEYWORDS_PATH") {
        Ok(path) => Lexicon::from_file(Path::new(&path)),
        Err(_) => Lexicon::agricultural(),
    };
    let analyzer = Arc::new(Analyzer::new(Arc::new(classifier), lexicon));
    let orchestrator = Arc::new(BatchOrchestrator::new(store.clone(), analyzer.clone()));

    let state = AppState {
        store,
        analyzer,
        orchestrator,
        model_url: config.sentiment_model_url.clone(),
    };

    let addr =
        std::env::var("SENTIMENT_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:5004".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, model = %state.model_url, "sentiment service listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
