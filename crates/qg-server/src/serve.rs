use std::collections::HashMap;
use std::sync::Arc;

use qg_registry::Registry;

use crate::config::load_settings;
use crate::providers::{FileMetadataProvider, FileRoleProvider};
use crate::routes::AppState;

/// Loads settings and the metadata registry from `config_dir`, builds the
/// pipeline, and serves the HTTP API until a shutdown signal arrives.
/// Shared by this crate's own binary and `qg-cli serve`.
pub async fn run(config_dir: &str) -> anyhow::Result<()> {
    let settings = load_settings(config_dir)?;

    let metadata_provider = Arc::new(FileMetadataProvider {
        path: settings.metadata.catalog_path.clone(),
    });
    let role_provider = Arc::new(FileRoleProvider {
        path: settings.metadata.roles_path.clone(),
    });
    let registry = Arc::new(Registry::bootstrap(metadata_provider, role_provider).await?);

    // Executors and cache providers are implemented outside this crate (a
    // Postgres pool, a ClickHouse client, a Redis client...). A deployment
    // wires real implementations in here; until then every query against a
    // configured database surfaces as `ExecutorMissing` rather than
    // silently returning nothing.
    let executors: HashMap<String, Arc<dyn qg_pipeline::Executor>> = HashMap::new();
    let caches: HashMap<String, Arc<dyn qg_pipeline::CacheProvider>> = HashMap::new();

    let pipeline = Arc::new(qg_pipeline::Pipeline::new(
        registry.clone(),
        executors,
        caches,
        settings.metadata.trino_enabled,
    ));

    let state = AppState { pipeline, registry };
    let app = crate::app::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.application.address()).await?;
    tracing::info!(address = %settings.application.address(), "qg-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
