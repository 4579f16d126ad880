use thiserror::Error;
use ulid::Ulid;

use crate::model::{BookingStatus, PaymentStatus};

/// Everything the engine and its service layer can refuse. A conflicted
/// booking attempt is a result value, never one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("cannot cancel a booking with payment status {0}: refund first")]
    PaymentBlocksCancellation(PaymentStatus),
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Short machine-readable code for protocol responses and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::PaymentBlocksCancellation(_) => "payment_blocks_cancellation",
            EngineError::NotFound(_) => "not_found",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Store(_) => "store_error",
        }
    }
}
