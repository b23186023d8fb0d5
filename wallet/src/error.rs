use airgap_core::{AirgapError, StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] AirgapError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Discovery already running for {0} addresses")]
    DiscoveryRunning(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Core(core) => match core {
                AirgapError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
                AirgapError::ChecksumMismatch { .. } => StatusCode::CONFLICT,
                AirgapError::MissingParts { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AirgapError::EngineFailure(_) => StatusCode::BAD_GATEWAY,
                AirgapError::InvalidState(_) | AirgapError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServiceError::InvalidMnemonic(_) | ServiceError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::DiscoveryRunning(_) => StatusCode::CONFLICT,
            ServiceError::Storage(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn remediation(&self) -> String {
        match self {
            ServiceError::Core(core) => core.remediation(),
            ServiceError::InvalidMnemonic(_) => {
                "Check the recovery phrase words and their order.".to_string()
            }
            ServiceError::InvalidInput(_) => "Correct the request and try again.".to_string(),
            ServiceError::DiscoveryRunning(_) => {
                "Wait for the running discovery to finish or cancel it.".to_string()
            }
            ServiceError::Storage(_) | ServiceError::Internal(_) => {
                "Check the wallet directory and restart the service.".to_string()
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "remediation": self.remediation(),
        }));

        (status, body).into_response()
    }
}
