use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    #[error("Request {0} is already pending")]
    DuplicateRequestId(String),

    #[error("No response to request {req_id} within {timeout:?}")]
    Timeout { req_id: String, timeout: Duration },

    #[error("Request {0} was cancelled")]
    Cancelled(String),
}
