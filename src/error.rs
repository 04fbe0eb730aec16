use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Top-level error type for the keeper
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Contract gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Transaction pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Ledger client error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Price error: {0}")]
    Price(#[from] PriceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised while talking to the pool contract
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Contract call failed: {0}")]
    CallFailure(#[from] LedgerError),

    #[error("Failed to decode {method} result: {message}")]
    DecodeFailure { method: &'static str, message: String },

    #[error("Failed to encode {method} call: {message}")]
    EncodeFailure { method: &'static str, message: String },
}

/// Errors raised by the signing and submission pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] GatewayError),

    #[error("Failed to fetch pending nonce: {0}")]
    NonceFetch(LedgerError),

    #[error("Failed to fetch gas price: {0}")]
    GasPriceFetch(LedgerError),

    #[error("Failed to sign transaction: {0}")]
    Signing(String),

    #[error("Transaction submission failed: {0}")]
    SubmitFailure(LedgerError),

    #[error("Transaction {tx_hash} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { tx_hash: String, attempts: u32 },

    #[error("Receipt wait for {0} cancelled by shutdown")]
    Cancelled(String),

    #[error("Submission refused, keeper is shutting down")]
    ShuttingDown,
}

/// Errors surfaced by the ledger node connection
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid endpoint {0}")]
    InvalidEndpoint(String),
}

/// Price construction and conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("Price denominator is zero")]
    ZeroDenominator,

    #[error("Price must be positive, got {0}")]
    NonPositive(String),

    #[error("Value {0} cannot be represented as an unsigned 256-bit amount")]
    Unrepresentable(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
            ),
            AppError::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                message,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
            ),
            AppError::Ledger(_) | AppError::Gateway(_) => (
                StatusCode::BAD_GATEWAY,
                "LEDGER_UNAVAILABLE",
                "The ledger node could not be reached".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Internal(format!("IO error: {:?}", error))
    }
}

/// Result type alias for the keeper
pub type AppResult<T> = Result<T, AppError>;
