//! Banking API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ request id ──▶ trace span ──▶ security pipeline ──▶ route handler ──▶ SQLite
//!                                             │ headers, CORS, log,          │
//!                                             │ sanitize, content-type,      │
//!                                             │ cache, precheck, rate limit, │
//!                                             │ admin IP allow-list          │
//!   Client ◀──────────────────────────────────┴── response stages ◀──────────┘
//!
//!   migrate run|status ──▶ registry (migrations/*.sql) ──▶ runner ──▶ _migrations ledger
//! ```

use std::process::ExitCode;

use tokio::net::TcpListener;

use bank_gateway::config::load_from_environment;
use bank_gateway::lifecycle::{bootstrap, signals, Shutdown};
use bank_gateway::observability::{logging, metrics};
use bank_gateway::HttpServer;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_from_environment() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_tracing(&config.observability, config.mode);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bank-gateway starting");

    let database = match bootstrap(&config) {
        Ok(database) => database,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = %config.mode,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %config.listener.bind_address, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, database);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    signals::wait_for_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(Ok(())) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Server task panicked");
            ExitCode::FAILURE
        }
    }
}
