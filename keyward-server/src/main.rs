//! Keyward Server - demo WebAuthn relying party
//!
//! Endpoints:
//! - POST /register/start, /register/finish - Registration ceremony
//! - POST /authenticate/start, /authenticate/finish - Authentication ceremony
//! - GET /health, /ready - Monitoring

use std::sync::Arc;
use std::time::Duration;

use keyward_server::{create_router, AppState, Config};
use tracing_subscriber::EnvFilter;

/// How often expired pending ceremonies are swept
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("keyward_server=info,keyward_core=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    let state = Arc::new(AppState::new(&config).map_err(|e| {
        tracing::error!(error = %e, "Invalid relying party configuration");
        e
    })?);

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "Expired pending ceremonies removed");
            }
        }
    });

    let app = create_router(state, &config);
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        rp_id = %config.rp_id,
        origins = ?config.rp_origins,
        "Keyward server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
