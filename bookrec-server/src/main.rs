use std::sync::Arc;

use bookrec_core::{FileModelStore, Recommender};
use bookrec_server::catalog::Catalog;
use bookrec_server::config::ServerConfig;
use bookrec_server::error::{ServerError, ServerResult};
use bookrec_server::router;
use bookrec_server::state::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber for logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bookrec_server=info,bookrec_core=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!(error = %e, "Server terminated with an error");
        std::process::exit(1);
    }
}

async fn run() -> ServerResult<()> {
    info!("Initializing bookrec server...");
    let config = ServerConfig::from_env()?;
    info!(?config, "Configuration loaded");

    let catalog = Arc::new(Catalog::open(config.catalog_path())?);
    let store = FileModelStore::new(config.model_path());
    let recommender = Recommender::load_or_build(Arc::clone(&catalog), store, config.tfidf_config()).await?;
    info!(stats = ?recommender.stats(), "Recommender ready");

    let app = router(AppState::new(catalog, recommender));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Config(format!("cannot bind {}: {}", addr, e)))?;
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Internal(format!("server error: {}", e)))?;
    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>(); // On non-Unix, just wait for Ctrl+C

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
    // Catalog and model are persisted on every write; nothing to flush here.
}
