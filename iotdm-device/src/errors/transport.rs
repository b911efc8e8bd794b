#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Unsubscribe from {topic} failed: {reason}")]
    Unsubscribe { topic: String, reason: String },

    #[error("Connection error: {0}")]
    Connection(String),
}

impl TransportError {
    pub fn publish(topic: &str, reason: impl ToString) -> Self {
        Self::Publish {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn subscribe(topic: &str, reason: impl ToString) -> Self {
        Self::Subscribe {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unsubscribe(topic: &str, reason: impl ToString) -> Self {
        Self::Unsubscribe {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }
}
