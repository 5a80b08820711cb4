//! Banking routes behind the full middleware stack.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, StatusCode},
    Router,
};
use serde_json::{json, Value};

use bank_gateway::lifecycle::Shutdown;
use bank_gateway::HttpServer;

mod common;
use common::{app, body_json, json_request, request, send, test_config};

async fn register(app: &Router, email: &str) -> Value {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "name": "Grace Hopper", "email": email }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = send(app, request(Method::GET, uri).body(Body::empty()).unwrap()).await;
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn ping_returns_configured_message() {
    let mut config = test_config();
    config.api.ping_message = "pong".into();
    let (status, body) = get(&app(config), "/api/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "pong" }));
}

#[tokio::test]
async fn registration_opens_accounts_and_card() {
    let app = app(test_config());
    let registration = register(&app, "Grace@Example.com").await;

    assert_eq!(registration["user"]["email"], "grace@example.com");
    let accounts = registration["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0]["account_type"], "checking");
    assert_eq!(accounts[1]["account_type"], "savings");
    assert_eq!(accounts[0]["balance_cents"], 0);
    assert_eq!(registration["card"]["last_four"].as_str().unwrap().len(), 4);

    let user_id = registration["user"]["id"].as_i64().unwrap();
    let (status, listed) = get(&app, &format!("/api/users/{user_id}/accounts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (status, cards) = get(&app, &format!("/api/users/{user_id}/cards")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cards[0]["status"], "active");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = app(test_config());
    register(&app, "dup@example.com").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "name": "Someone Else", "email": "DUP@example.com" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn deposit_then_transfer_moves_money() {
    let app = app(test_config());
    let registration = register(&app, "flow@example.com").await;
    let checking = registration["accounts"][0]["id"].as_i64().unwrap();
    let savings = registration["accounts"][1]["id"].as_i64().unwrap();

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/mobile-deposit",
            json!({ "account_id": checking, "amount_cents": 50_000 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let deposit = body_json(response).await;
    assert_eq!(deposit["kind"], "credit");
    assert_eq!(deposit["description"], "Mobile deposit");

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/transfers",
            json!({
                "from_account_id": checking,
                "to_account_id": savings,
                "amount_cents": 12_500,
                "description": "Rainy day",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let receipt = body_json(response).await;
    assert_eq!(receipt["debit"]["account_id"], checking);
    assert_eq!(receipt["credit"]["account_id"], savings);

    let (_, summary) = get(&app, &format!("/api/accounts/{checking}")).await;
    assert_eq!(summary["account"]["balance_cents"], 37_500);
    assert_eq!(summary["total_credits_cents"], 50_000);
    assert_eq!(summary["total_debits_cents"], 12_500);

    let (_, summary) = get(&app, &format!("/api/accounts/{savings}")).await;
    assert_eq!(summary["account"]["balance_cents"], 12_500);

    let (status, history) = get(&app, &format!("/api/accounts/{checking}/transactions?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["kind"], "debit");
}

#[tokio::test]
async fn overdraft_is_rejected_without_side_effects() {
    let app = app(test_config());
    let registration = register(&app, "broke@example.com").await;
    let checking = registration["accounts"][0]["id"].as_i64().unwrap();
    let savings = registration["accounts"][1]["id"].as_i64().unwrap();

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/transfers",
            json!({ "from_account_id": checking, "to_account_id": savings, "amount_cents": 1 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Insufficient funds");

    let (_, history) = get(&app, &format!("/api/accounts/{savings}/transactions")).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let app = app(test_config());
    let (status, _) = get(&app, "/api/accounts/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/api/users/999/cards").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app, "/api/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app(test_config());
    let response = send(
        &app,
        request(Method::POST, "/api/transfers")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_migration_report_lists_shipped_files() {
    let app = app(test_config());
    let (status, report) = get(&app, "/api/admin/migrations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total"], 4);
    assert_eq!(report["applied"], 4);
    assert_eq!(report["pending"], 0);
    assert_eq!(report["migrations"][0]["state"], "applied");
}

#[tokio::test]
async fn serves_over_tcp_and_shuts_down_gracefully() {
    let config = test_config();
    let database = common::migrated_database(&config);
    let server = HttpServer::new(config, database);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();
    let res = client
        .get(format!("http://{addr}/api/ping"))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert!(body["message"].is_string());

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn malformed_path_and_query_get_json_errors() {
    let app = app(test_config());

    for uri in [
        "/api/users/abc/accounts",
        "/api/users/abc/cards",
        "/api/accounts/abc",
        "/api/accounts/abc/transactions",
        "/api/accounts/1/transactions?limit=many",
    ] {
        let response = send(&app, request(Method::GET, uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = body_json(response).await;
        assert!(body["error"].is_string(), "{uri}");
        assert!(body["timestamp"].is_string(), "{uri}");
    }
}
