//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, Response},
    Router,
};
use tower::ServiceExt;

use bank_gateway::config::{GatewayConfig, RunMode};
use bank_gateway::database::Database;
use bank_gateway::migrations::{MigrationRegistry, MigrationRunner};
use bank_gateway::HttpServer;

pub const LOCAL_PEER: [u8; 4] = [127, 0, 0, 1];

/// Development config against an in-memory database and the shipped migrations.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.database.url = ":memory:".into();
    config.database.anon_key = Some("test-anon-key".into());
    config.database.service_role_key = Some("test-service-role-key".into());
    config.security.encryption_master_key = Some("test-master-key".into());
    config.migrations.directory = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations").into();
    config
}

pub fn production_config(admin_ips: &[&str]) -> GatewayConfig {
    let mut config = test_config();
    config.mode = RunMode::Production;
    config.security.admin_allowed_ips = admin_ips.iter().map(|ip| ip.to_string()).collect();
    config
}

/// Migrated in-memory database.
pub fn migrated_database(config: &GatewayConfig) -> Arc<Database> {
    let database = Arc::new(Database::in_memory().unwrap());
    let registry = MigrationRegistry::new(config.migrations.directory.clone());
    MigrationRunner::new(registry, database.clone()).run().unwrap();
    database
}

pub fn app(config: GatewayConfig) -> Router {
    let database = migrated_database(&config);
    HttpServer::new(config, database).router()
}

pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    request(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Drive one request through the router as if it came from `peer`.
pub async fn send_from(app: &Router, peer: [u8; 4], mut req: Request<Body>) -> Response<Body> {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    app.clone().oneshot(req).await.unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    send_from(app, LOCAL_PEER, req).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
