//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all API handlers
//! - Wire up middleware (request ID, tracing, security pipeline, timeout)
//! - Bind server to listener and shut down gracefully
//! - Periodically drop expired rate-limit counters

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::admin;
use crate::config::GatewayConfig;
use crate::database::{BankStore, Database};
use crate::http::handlers::{accounts, registration, system, transfers};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::migrations::{MigrationRegistry, MigrationRunner};
use crate::observability::tracing::trace_layer;
use crate::security::{security_middleware, RateLimiter, SecurityPipeline};

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: BankStore,
    pub migrations: Arc<MigrationRunner>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<GatewayConfig>, database: Arc<Database>) -> Self {
        let registry = MigrationRegistry::new(config.migrations.directory.clone())
            .lenient(config.migrations.lenient_filenames);
        Self {
            store: BankStore::new(database.clone()),
            migrations: Arc::new(MigrationRunner::new(registry, database)),
            rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            config,
        }
    }
}

/// HTTP server for the banking API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: GatewayConfig, database: Arc<Database>) -> Self {
        let state = AppState::new(Arc::new(config), database);
        let router = build_router(state.clone());
        Self { router, state }
    }

    /// The fully layered router, for driving with `tower::ServiceExt`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = %self.state.config.mode,
            "HTTP server starting"
        );

        let limiter = self.state.rate_limiter.clone();
        let mut sweeper_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let purged = limiter.purge_expired(Instant::now());
                        if purged > 0 {
                            tracing::debug!(purged, "Dropped expired rate-limit counters");
                        }
                    }
                    _ = sweeper_shutdown.recv() => break,
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layer order, outermost first: request id, id propagation, trace span,
/// security pipeline, timeout, handler.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let pipeline = Arc::new(SecurityPipeline::from_config(
        &state.config,
        state.rate_limiter.clone(),
    ));
    let timeout = Duration::from_secs(state.config.timeouts.request_secs);

    Router::new()
        .route("/api/ping", get(system::ping))
        .route("/api/auth/register", post(registration::register))
        .route("/api/users/{user_id}/accounts", get(accounts::user_accounts))
        .route("/api/users/{user_id}/cards", get(accounts::user_cards))
        .route("/api/accounts/{account_id}", get(accounts::account_summary))
        .route(
            "/api/accounts/{account_id}/transactions",
            get(accounts::account_transactions),
        )
        .route("/api/transfers", post(transfers::create_transfer))
        .route("/api/mobile-deposit", post(transfers::mobile_deposit))
        .nest("/api/admin", admin::router())
        .fallback(system::not_found)
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::from_fn_with_state(pipeline, security_middleware))
        .layer(trace_layer())
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}
