use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No active work schedule is configured")]
    ScheduleNotFound,

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The acting level is ahead of the chain.
    #[error("Approval out of sequence: level {expected} must act before level {attempted}")]
    OutOfSequenceApproval { expected: u8, attempted: u8 },

    /// The acting level, or the whole request, has already been decided.
    #[error("Correction request {request_id} is already decided ({status})")]
    AlreadyDecided { request_id: u64, status: String },

    #[error("Concurrent update on {0}, reload and retry")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::ScheduleNotFound | EngineError::Configuration(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::OutOfSequenceApproval { .. }
            | EngineError::AlreadyDecided { .. }
            | EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // storage details stay in the logs
            EngineError::Store(e) => {
                tracing::error!(error = %e, "Attendance store failure");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}
