use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::InvalidTokenReason;

/// Outcome of a bulk insert request. Always returned with a 200: per-item
/// skips and whole-batch failures are both reported through the counts.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BulkResponse {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Option<Vec<String>>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("customer {0} not found")]
    CustomerNotFound(i64),

    #[error("request submitted without an api token")]
    NoTokenError,
    #[error("api token is not valid: {0}")]
    TokenValidationError(#[from] InvalidTokenReason),

    #[error("failed to create connection pool: {error}")]
    PoolCreationError { error: sqlx::Error },
    #[error("{command} query failed: {error}")]
    QueryError { command: String, error: sqlx::Error },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::CustomerNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),

            ApiError::NoTokenError | ApiError::TokenValidationError(_) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }

            ApiError::PoolCreationError { .. } | ApiError::QueryError { .. } => {
                // Don't leak database details to the caller
                tracing::error!("request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("internal server error"),
                )
            }
        }
        .into_response()
    }
}
