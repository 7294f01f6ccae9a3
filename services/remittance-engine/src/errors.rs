use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use remittance_core::CycleStatus;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Contract not found: {0}")]
    ContractNotFound(uuid::Uuid),

    #[error("Cycle not found: {0}")]
    CycleNotFound(uuid::Uuid),

    #[error("Export not found: {0}")]
    ExportNotFound(uuid::Uuid),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: CycleStatus, to: CycleStatus },

    #[error("Waterfall imbalance: {0}")]
    WaterfallImbalance(String),

    #[error("Settlement posting failed: {0}")]
    SettlementPosting(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<remittance_core::Error> for EngineError {
    fn from(err: remittance_core::Error) -> Self {
        match err {
            remittance_core::Error::Validation(msg) => EngineError::Validation(msg),
            remittance_core::Error::InvalidTransition { from, to } => {
                EngineError::InvalidTransition { from, to }
            }
            remittance_core::Error::WaterfallImbalance { .. } => {
                EngineError::WaterfallImbalance(err.to_string())
            }
            remittance_core::Error::NotFound(msg) => EngineError::Validation(msg),
            remittance_core::Error::Serialization(msg) => EngineError::Internal(msg),
            remittance_core::Error::Config(msg) => EngineError::Config(msg),
        }
    }
}

impl ResponseError for EngineError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::ContractNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::CycleNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::ExportNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
            EngineError::WaterfallImbalance(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::SettlementPosting(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl EngineError {
    fn error_type(&self) -> &str {
        match self {
            EngineError::Database(_) => "database_error",
            EngineError::Validation(_) => "validation_error",
            EngineError::ContractNotFound(_) => "not_found",
            EngineError::CycleNotFound(_) => "not_found",
            EngineError::ExportNotFound(_) => "not_found",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::WaterfallImbalance(_) => "waterfall_imbalance",
            EngineError::SettlementPosting(_) => "settlement_posting_error",
            EngineError::Config(_) => "config_error",
            EngineError::Internal(_) => "internal_error",
        }
    }
}
