use std::sync::Arc;

use docket_core::{CancellationToken, CollectionRegistry, Sweeper};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Docket document server.
pub struct DocketServer {
    config: ServerConfig,
    registry: Arc<CollectionRegistry>,
}

impl DocketServer {
    /// Open the configured store and set up an empty registry.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store = config.store.open()?;
        let registry = Arc::new(CollectionRegistry::new(store, config.cache.clone()));
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
        };
        build_router(state, self.config.max_body_bytes)
    }

    /// Serve requests until Ctrl-C, running the eviction sweeper alongside.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;

        let shutdown = CancellationToken::new();
        let sweeper = Sweeper::new(Arc::clone(&self.registry)).spawn(shutdown.clone());

        tracing::info!(
            "Docket listening on {} (store: {})",
            self.config.bind_addr,
            self.registry.store().describe()
        );
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        shutdown.cancel();
        if let Err(e) = sweeper.await {
            tracing::warn!("Eviction sweeper ended abnormally: {}", e);
        }
        served
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested; draining connections..."),
        Err(e) => tracing::error!("Cannot listen for shutdown signal: {}", e),
    }
}
