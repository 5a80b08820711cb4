use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;

use crate::database::store::{Account, AccountSummary, Card, Transaction};
use crate::error::GatewayError;
use crate::http::handlers::{path_param, query_params};
use crate::http::server::AppState;

/// Upper bound on `?limit=` for transaction listings.
pub const MAX_TRANSACTION_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<u32>,
}

/// `GET /api/users/{user_id}/accounts`
pub async fn user_accounts(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Account>>, GatewayError> {
    let user_id = path_param(user_id)?;
    Ok(Json(state.store.accounts_for_user(user_id)?))
}

/// `GET /api/users/{user_id}/cards`
pub async fn user_cards(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Card>>, GatewayError> {
    let user_id = path_param(user_id)?;
    Ok(Json(state.store.cards_for_user(user_id)?))
}

/// `GET /api/accounts/{account_id}`
pub async fn account_summary(
    State(state): State<AppState>,
    account_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AccountSummary>, GatewayError> {
    let account_id = path_param(account_id)?;
    Ok(Json(state.store.account_summary(account_id)?))
}

/// `GET /api/accounts/{account_id}/transactions?limit=N`
pub async fn account_transactions(
    State(state): State<AppState>,
    account_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, GatewayError> {
    let account_id = path_param(account_id)?;
    let query = query_params(query)?;
    let limit = query
        .limit
        .unwrap_or(state.config.api.default_transaction_limit)
        .clamp(1, MAX_TRANSACTION_LIMIT);
    Ok(Json(state.store.transactions_for_account(account_id, limit)?))
}
