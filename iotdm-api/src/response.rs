use core::fmt;

use serde::{Deserialize, Serialize};

/// Response codes exchanged with the device management server.
///
/// Handlers only ever answer with one of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ResponseCode {
    /// Request completed
    Success,
    /// Action accepted and started asynchronously
    Accepted,
    /// Attribute update applied
    Changed,
    /// Malformed request or state conflict
    BadRequest,
    /// Named resource or field does not exist
    NotFound,
    /// Request conflicts with the current state
    Conflict,
    /// Device failed while processing the request
    InternalError,
    /// Device does not implement the requested function
    NotImplemented,
}

impl ResponseCode {
    pub const ALL: [ResponseCode; 8] = [
        Self::Success,
        Self::Accepted,
        Self::Changed,
        Self::BadRequest,
        Self::NotFound,
        Self::Conflict,
        Self::InternalError,
        Self::NotImplemented,
    ];

    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 200,
            Self::Accepted => 202,
            Self::Changed => 204,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InternalError => 500,
            Self::NotImplemented => 501,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|rc| rc.code() == code)
    }

    /// Whether the code reports a successful outcome (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }
}

impl From<ResponseCode> for i32 {
    fn from(rc: ResponseCode) -> Self {
        rc.code()
    }
}

impl TryFrom<i32> for ResponseCode {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown response code {}", code))
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.code(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        for rc in ResponseCode::ALL {
            assert_eq!(ResponseCode::from_code(rc.code()), Some(rc));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(ResponseCode::from_code(418), None);
        assert!(ResponseCode::try_from(418).is_err());
    }

    #[test]
    fn test_success_range() {
        assert!(ResponseCode::Success.is_success());
        assert!(ResponseCode::Accepted.is_success());
        assert!(ResponseCode::Changed.is_success());
        assert!(!ResponseCode::BadRequest.is_success());
        assert!(!ResponseCode::NotImplemented.is_success());
    }

    #[test]
    fn test_serializes_as_integer() {
        assert_eq!(
            serde_json::to_value(ResponseCode::Accepted).unwrap(),
            serde_json::json!(202)
        );
        let rc: ResponseCode = serde_json::from_value(serde_json::json!(501)).unwrap();
        assert_eq!(rc, ResponseCode::NotImplemented);
    }
}
