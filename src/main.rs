// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

use edge_access_gateway::api::router;
use edge_access_gateway::config::{AppConfig, LogFormat, LOG_FORMAT_ENV};
use edge_access_gateway::setup_tracing;
use edge_access_gateway::state::AppState;
use edge_access_gateway::store::InMemoryUserStore;

#[tokio::main]
async fn main() {
    setup_tracing(LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref()));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if config.is_bypass() {
        tracing::warn!("DEV MODE: edge access authentication is bypassed for every request");
    }

    let state = AppState::from_config(&config, Arc::new(InMemoryUserStore::new()))
        .expect("Failed to build access gateway");
    let app = router(state, &config.frontend_url);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!(
        addr = %config.bind_addr,
        environment = ?config.environment,
        "Edge Access Gateway listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
