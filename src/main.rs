//! HTTP binary entry point — wires the engine to the pinned contract in
//! spec.md section 6. Auth, the OpenAI-compatible relay, and reporting
//! scripts are out of scope; this binary exists only to drive the engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use geo_monitor::application::TaskEngine;
use geo_monitor::infrastructure::config::ConfigLoader;
use geo_monitor::infrastructure::database::{
    DatabaseConnection, SearchRepositoryImpl, StatusProjectorImpl, TaskRepositoryImpl,
};
use geo_monitor::infrastructure::http::{build_router, AppState};
use geo_monitor::infrastructure::logging::LoggerImpl;
use geo_monitor::infrastructure::providers::{
    BochaProvider, DeepSeekChatDriver, DoubaoChatDriver, HostedChatProvider, ProviderRegistry,
};
use geo_monitor::domain::ports::Provider;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _logger = LoggerImpl::init(&config.logging).context("failed to initialize logger")?;

    let db = DatabaseConnection::new(&config.database_url(), config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run database migrations")?;

    let task_repo = Arc::new(TaskRepositoryImpl::new(db.pool().clone()));
    let search_repo: Arc<dyn geo_monitor::domain::ports::SearchRepository> =
        Arc::new(SearchRepositoryImpl::new(db.pool().clone()));
    let status_projector: Arc<dyn geo_monitor::domain::ports::StatusProjector> =
        Arc::new(StatusProjectorImpl::new(db.pool().clone()));

    let providers = build_provider_registry(&config);
    let engine = Arc::new(TaskEngine::new(task_repo, search_repo.clone(), Arc::new(providers)));

    let state = AppState {
        engine,
        search_repo,
        status_projector,
    };

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %addr, "geo-monitor-server listening");
    axum::serve(listener, app).await.context("http server error")?;

    Ok(())
}

fn build_provider_registry(config: &geo_monitor::infrastructure::config::Config) -> ProviderRegistry {
    let profile_root: PathBuf = config.browser.profile_root.clone();

    let deepseek: Arc<dyn Provider> =
        Arc::new(HostedChatProvider::new(DeepSeekChatDriver, profile_root.clone()));
    let doubao: Arc<dyn Provider> = Arc::new(HostedChatProvider::new(DoubaoChatDriver, profile_root));
    let bocha: Arc<dyn Provider> = Arc::new(BochaProvider::new(
        config.providers.bocha_api_key.clone().unwrap_or_default(),
        config
            .providers
            .bocha_api_url
            .clone()
            .unwrap_or_else(|| "https://api.bochaai.com".to_string()),
        Duration::from_secs(30),
    ));

    ProviderRegistry::new(vec![deepseek, doubao, bocha])
}
