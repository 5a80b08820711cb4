//! Route handlers for the banking API.
//!
//! Handlers are thin: parse input, call [`BankStore`](crate::database::BankStore),
//! serialize the result. Every failure is a [`GatewayError`] so error bodies
//! share one shape with pipeline rejections.

pub mod accounts;
pub mod registration;
pub mod system;
pub mod transfers;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Json,
};

use crate::error::GatewayError;

/// Unwrap a JSON body, turning axum's rejection into a JSON 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))
}

/// Unwrap a path parameter, turning a malformed segment into a JSON 400.
pub(crate) fn path_param<T>(param: Result<Path<T>, PathRejection>) -> Result<T, GatewayError> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, GatewayError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))
}
