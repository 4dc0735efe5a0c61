//! Main server implementation for the Linkage service

use axum::Router;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::{self, ApiState};
use crate::config::LinkageConfig;
use crate::error::{Error, Result};
use crate::persistence::{ContactStore, SqliteContactStore};
use crate::resolution::IdentityResolver;

/// Main server structure
pub struct Server {
    config: Arc<LinkageConfig>,
    app: Router,
}

impl Server {
    /// Create a server backed by the configured SQLite database
    pub async fn new(config: LinkageConfig) -> Result<Self> {
        info!("Initializing Linkage server");

        let store = SqliteContactStore::connect(&config.database).await?;
        info!(url = %config.database.url, "Contact store ready");

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Create a server over an already constructed store
    pub fn with_store(config: LinkageConfig, store: Arc<dyn ContactStore>) -> Self {
        let resolver = Arc::new(IdentityResolver::new(store));
        let app = api::router(ApiState::new(resolver), &config.server);

        Self {
            config: Arc::new(config),
            app,
        }
    }

    /// The fully layered router, for serving or for driving in tests
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Run the server until shutdown signal
    pub async fn run(self) -> Result<()> {
        let addr = self.config.server.listen_address();

        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Internal {
                message: format!("Failed to bind to address {addr}: {e}"),
            })?;

        info!("Linkage listening on http://{}", addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal {
                message: format!("Server error: {e}"),
            })?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            warn!("Received terminate signal, shutting down");
        },
    }
}
