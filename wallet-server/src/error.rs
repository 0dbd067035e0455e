use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;
use wallet_core::WalletError;

/// HTTP-facing wrapper around the core error type.
///
/// Handlers return this so `?` on engine calls maps straight to the wire
/// format: JSON body `{"error": {"code", "message", "type"}}` with the
/// status code below. Infrastructure failures keep their detail out of
/// the response body.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub WalletError);

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let message = match &self.0 {
            WalletError::Database(_)
            | WalletError::Cache(_)
            | WalletError::Serialization(_)
            | WalletError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match &self.0 {
            WalletError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            WalletError::SelfTransfer(_) => StatusCode::BAD_REQUEST,
            WalletError::WalletNotFound(_) => StatusCode::NOT_FOUND,
            WalletError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WalletError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            WalletError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WalletError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WalletError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WalletError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    fn error_type(&self) -> &str {
        match &self.0 {
            WalletError::InvalidAmount(_) => "invalid_amount",
            WalletError::SelfTransfer(_) => "self_transfer",
            WalletError::WalletNotFound(_) => "not_found",
            WalletError::InsufficientFunds { .. } => "insufficient_funds",
            WalletError::LockTimeout(_) => "lock_timeout",
            WalletError::Database(_) => "database_error",
            WalletError::Cache(_) => "cache_error",
            WalletError::Serialization(_) => "serialization_error",
            WalletError::Internal(_) => "internal_error",
        }
    }
}
