//! Funding step tracker — entry point.
//!
//! Restores the cached step state, reconciles it with the steps backend in
//! the background, and exposes the store over a small Axum REST API for
//! local UI consumers.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use step_sync::api::{self, ApiState};
use step_sync::cache::{self, LocalCache};
use step_sync::config::Config;
use step_sync::{reconciler, HttpStepBackend, StepSync};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = cache::init_pool(&config.database_url).await?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    let backend = HttpStepBackend::new(client, config.api_url.clone(), config.api_token.clone());

    // Render from cache first, then ask the backend.
    let sync = Arc::new(StepSync::restore(Arc::new(backend), LocalCache::new(pool)).await);
    info!("Starting at step {}", sync.current_step());

    if config.sync_interval_secs > 0 {
        // The reconciler's first tick fires immediately.
        tokio::spawn(reconciler::run(
            sync.clone(),
            Duration::from_secs(config.sync_interval_secs),
        ));
    } else if let Err(e) = sync.load_from_backend().await {
        warn!("Initial backend sync failed, using cached state: {e}");
    }

    let app = api::router(Arc::new(ApiState { sync }));

    let addr = format!("127.0.0.1:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
