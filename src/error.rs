use crate::catalog::CatalogLoadError;
use crate::orchestration::SettlementError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        let msg = err.to_string();
        match err {
            SettlementError::InvalidInput(_)
            | SettlementError::InvalidRequest(_)
            | SettlementError::AmountOverflow(_) => AppError::BadRequest(msg),
            SettlementError::ShiftNotFound(_)
            | SettlementError::BonusNotFound(_)
            | SettlementError::FortnightNotFound { .. } => AppError::NotFound(msg),
            SettlementError::AlreadyClosed(_) | SettlementError::BonusConflict(_) => {
                AppError::Conflict(msg)
            }
            SettlementError::Catalog(_) => AppError::Config(msg),
            SettlementError::Export(_) | SettlementError::Db(_) => AppError::Internal(msg),
        }
    }
}

impl From<CatalogLoadError> for AppError {
    fn from(err: CatalogLoadError) -> Self {
        SettlementError::from(err).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
