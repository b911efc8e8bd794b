use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DocumentError, Result};
use crate::response::ResponseCode;

/// `{reqId, rc, message?, d?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmResponse {
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub rc: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl DmResponse {
    pub fn new(req_id: impl Into<String>, rc: ResponseCode) -> Self {
        Self {
            req_id: req_id.into(),
            rc: rc.code(),
            message: None,
            d: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, d: Value) -> Self {
        self.d = Some(d);
        self
    }

    /// Code as one of the known values; `None` for anything outside the taxonomy.
    pub fn response_code(&self) -> Option<ResponseCode> {
        ResponseCode::from_code(self.rc)
    }

    pub fn is_success(&self) -> bool {
        self.response_code().is_some_and(|rc| rc.is_success())
    }

    pub fn from_object(document: Map<String, Value>) -> Result<Self> {
        if !document.get("rc").is_some_and(Value::is_i64) {
            return Err(DocumentError::MissingField("rc"));
        }
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A server-initiated request: its identifier plus the untouched body.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    pub req_id: String,
    pub body: Map<String, Value>,
}

impl InboundRequest {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let body = super::parse_object(payload)?;
        let req_id = super::request_id(&body)?;
        Ok(Self { req_id, body })
    }

    /// The `d` member, when present and an object.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.body.get("d").and_then(Value::as_object)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_response_layout() {
        let response = DmResponse::new("abc", ResponseCode::Accepted);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"reqId": "abc", "rc": 202})
        );
    }

    #[test]
    fn test_response_from_object() {
        let doc = super::super::parse_object(br#"{"reqId":"x","rc":400,"message":"no"}"#).unwrap();
        let response = DmResponse::from_object(doc).unwrap();

        assert_eq!(response.response_code(), Some(ResponseCode::BadRequest));
        assert_eq!(response.message.as_deref(), Some("no"));
        assert!(!response.is_success());
    }

    #[test]
    fn test_response_requires_rc() {
        let doc = super::super::parse_object(br#"{"reqId":"x"}"#).unwrap();
        assert_eq!(
            DmResponse::from_object(doc),
            Err(DocumentError::MissingField("rc"))
        );
    }

    #[test]
    fn test_unknown_code_is_not_success() {
        let response = DmResponse {
            req_id: "x".to_string(),
            rc: 299,
            message: None,
            d: None,
        };
        assert_eq!(response.response_code(), None);
        assert!(!response.is_success());
    }

    #[test]
    fn test_inbound_request_keeps_unknown_fields() {
        let request =
            InboundRequest::parse(br#"{"reqId":"r1","d":{"a":1},"extra":true}"#).unwrap();

        assert_eq!(request.req_id, "r1");
        assert_eq!(request.data().unwrap()["a"], json!(1));
        assert_eq!(request.body["extra"], json!(true));
    }
}
