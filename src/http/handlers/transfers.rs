use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::database::store::{Transaction, TransferReceipt};
use crate::error::GatewayError;
use crate::http::handlers::json_body;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount_cents: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account_id: i64,
    pub amount_cents: i64,
    pub description: Option<String>,
}

/// `POST /api/transfers`
pub async fn create_transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransferReceipt>), GatewayError> {
    let req = json_body(payload)?;
    let receipt = state.store.transfer(
        req.from_account_id,
        req.to_account_id,
        req.amount_cents,
        &req.description,
    )?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `POST /api/mobile-deposit`
pub async fn mobile_deposit(
    State(state): State<AppState>,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), GatewayError> {
    let req = json_body(payload)?;
    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("Mobile deposit");
    let credit = state
        .store
        .deposit(req.account_id, req.amount_cents, description)?;
    tracing::info!(account_id = req.account_id, amount_cents = req.amount_cents, "Mobile deposit credited");
    Ok((StatusCode::CREATED, Json(credit)))
}
