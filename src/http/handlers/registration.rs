use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};

use crate::database::store::{NewUser, Registration};
use crate::error::GatewayError;
use crate::http::handlers::json_body;
use crate::http::server::AppState;

/// `POST /api/auth/register`
///
/// Creates the user together with a checking account, a savings account and
/// a debit card. A second registration for the same email is a 409.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<Registration>), GatewayError> {
    let new_user = json_body(payload)?;
    let registration = state.store.register_user(&new_user)?;
    Ok((StatusCode::CREATED, Json(registration)))
}
