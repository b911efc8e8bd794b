//! JSON documents exchanged with the device management server.

mod manage;
mod response;
mod update;

pub use manage::*;
pub use response::*;
pub use update::*;

use serde_json::{Map, Value};

use crate::error::{DocumentError, Result};

/// Parse a payload into a JSON object.
pub fn parse_object(payload: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(payload)? {
        Value::Object(map) => Ok(map),
        _ => Err(DocumentError::NotAnObject),
    }
}

/// Extract the `reqId` of a document without interpreting anything else.
pub fn request_id(document: &Map<String, Value>) -> Result<String> {
    document
        .get("reqId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DocumentError::MissingRequestId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let doc = parse_object(br#"{"reqId":"abc","rc":200}"#).unwrap();
        assert_eq!(request_id(&doc).unwrap(), "abc");
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert_eq!(parse_object(b"[1,2]"), Err(DocumentError::NotAnObject));
        assert!(matches!(
            parse_object(b"not json"),
            Err(DocumentError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_request_id_must_be_string() {
        let doc = parse_object(br#"{"reqId":12}"#).unwrap();
        assert_eq!(request_id(&doc), Err(DocumentError::MissingRequestId));

        let doc = parse_object(br#"{"rc":200}"#).unwrap();
        assert_eq!(request_id(&doc), Err(DocumentError::MissingRequestId));
    }
}
