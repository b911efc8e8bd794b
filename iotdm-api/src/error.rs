use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Payload is not valid JSON
    InvalidJson(String),
    /// Payload is valid JSON but not an object
    NotAnObject,
    /// Request identifier is absent or not a string
    MissingRequestId,
    /// A required field is absent or has the wrong type
    MissingField(&'static str),
    /// Document could not be serialized
    Serialization(String),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            Self::NotAnObject => write!(f, "Document is not a JSON object"),
            Self::MissingRequestId => write!(f, "Missing request identifier"),
            Self::MissingField(name) => write!(f, "Missing field: {}", name),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for DocumentError {}

impl From<serde_json::Error> for DocumentError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidJson(e.to_string())
    }
}

pub type Result<T> = core::result::Result<T, DocumentError>;
