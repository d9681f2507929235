use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("RPC call timed out: {0}")]
    Timeout(String),

    #[error("Network reconciliation failed: {0}")]
    NetworkReconciliation(String),

    #[error("Fight transaction failed: {0}")]
    FightFailed(String),

    #[error("A fight is already in progress")]
    FightInProgress,

    #[error("Data still loading: {0}")]
    StillLoading(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    /// Stable machine-readable code, lets callers tell reconciliation
    /// failures apart from fight failures and from pending data.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BlockchainRPC(_) => "RPC_ERROR",
            AppError::Timeout(_) => "RPC_TIMEOUT",
            AppError::NetworkReconciliation(_) => "NETWORK_RECONCILIATION_FAILED",
            AppError::FightFailed(_) => "FIGHT_FAILED",
            AppError::FightInProgress => "FIGHT_IN_PROGRESS",
            AppError::StillLoading(_) => "DATA_LOADING",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the user can simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AppError::BadRequest(_) | AppError::Config(_))
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: Some(serde_json::json!({ "retryable": self.is_retryable() })),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
