use crate::domain::intent::IntentStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("illegal state transition: cannot {action} while {from}")]
    IllegalTransition { from: IntentStatus, action: String },
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("dispute window expired at {deadline}")]
    DisputeWindowExpired { deadline: DateTime<Utc> },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PaymentError {
    pub fn illegal(from: IntentStatus, action: impl Into<String>) -> Self {
        Self::IllegalTransition {
            from,
            action: action.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
