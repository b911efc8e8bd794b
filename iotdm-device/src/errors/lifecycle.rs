use iotdm_api::DocumentError;

use super::{CorrelationError, TransportError};
use crate::services::LifecycleState;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Server rejected the request with rc={0}")]
    Rejected(i32),

    #[error("No response from server")]
    Timeout,

    #[error("Operation not valid while {0:?}")]
    InvalidState(LifecycleState),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Correlation error: {0}")]
    Correlation(CorrelationError),
}

impl From<CorrelationError> for LifecycleError {
    fn from(e: CorrelationError) -> Self {
        match e {
            CorrelationError::Timeout { .. } | CorrelationError::Cancelled(_) => Self::Timeout,
            other => Self::Correlation(other),
        }
    }
}
