use airgap_core::CryptoEngine;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use super::state::AppState;
use crate::config::ServiceConfig;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        log::warn!("CORS: Allowing all origins (development mode). Set ALLOWED_ORIGINS env var for production.");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        log::info!("CORS configured for origins: {}", allowed_origins.join(","));
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// All routes of the wallet service over the given state
pub fn build_router<E: CryptoEngine + 'static>(state: Arc<AppState<E>>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        // Address ledger
        .route("/api/addresses", get(handlers::list_addresses_handler::<E>))
        .route(
            "/api/addresses/next/:kind",
            post(handlers::derive_next_handler::<E>),
        )
        .route("/api/addresses/used", post(handlers::mark_used_handler::<E>))
        .route(
            "/api/addresses/fresh",
            post(handlers::fresh_address_handler::<E>),
        )
        .route(
            "/api/account/xpub",
            get(handlers::account_xpub_handler::<E>),
        )
        .route("/api/discover", post(handlers::discover_handler::<E>))
        .route(
            "/api/discover/cancel",
            post(handlers::cancel_discovery_handler::<E>),
        )
        // Balances
        .route("/api/refresh", post(handlers::refresh_handler::<E>))
        .route("/api/balance", get(handlers::balance_handler::<E>))
        .route("/api/advice", get(handlers::advice_handler::<E>))
        // Transfer
        .route("/api/transfer/split", post(handlers::split_handler::<E>))
        .route(
            "/api/transfer/recombine",
            post(handlers::recombine_handler),
        )
        .route("/api/transfer/export", post(handlers::export_handler::<E>))
        .route("/api/transfer/import", post(handlers::import_handler::<E>))
        .route(
            "/api/transactions/submit",
            post(handlers::submit_handler::<E>),
        )
        // Scan session
        .route("/api/scan/offer", post(handlers::scan_offer_handler::<E>))
        .route(
            "/api/scan/progress",
            get(handlers::scan_progress_handler::<E>),
        )
        .route("/api/scan/reset", post(handlers::scan_reset_handler::<E>))
        .route(
            "/api/scan/recombine",
            post(handlers::scan_recombine_handler::<E>),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: ServiceConfig) -> anyhow::Result<()> {
    let addr = config.bind_address.clone();
    let state = Arc::new(AppState::open(config)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    log::info!("Shutdown signal received, exiting gracefully...");
}
