use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DocumentError, Result};
use crate::models::{FirmwareState, FirmwareUpdateStatus};

/// Field name the server uses for the firmware descriptor.
pub const FIRMWARE_FIELD: &str = "mgmt.firmware";
/// Field name the server uses for the device location.
pub const LOCATION_FIELD: &str = "location";

/// `{reqId, d?}` sent for resource updates; clears carry no `d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest<T> {
    #[serde(rename = "reqId")]
    pub req_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<T>,
}

impl<T: Serialize> UpdateRequest<T> {
    pub fn new(req_id: impl Into<String>, d: T) -> Self {
        Self {
            req_id: req_id.into(),
            d: Some(d),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DocumentError::Serialization(e.to_string()))
    }
}

impl UpdateRequest<Value> {
    pub fn clear(req_id: impl Into<String>) -> Self {
        Self {
            req_id: req_id.into(),
            d: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCodeFields {
    pub error_code: i32,
}

/// One `{field, value}` pair of a field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldList {
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareStateFields {
    pub state: FirmwareState,
    pub update_status: FirmwareUpdateStatus,
}

impl FieldList {
    pub fn firmware_state(fields: FirmwareStateFields) -> Result<Self> {
        let value = serde_json::to_value(fields)
            .map_err(|e| DocumentError::Serialization(e.to_string()))?;

        Ok(Self {
            fields: vec![FieldValue {
                field: FIRMWARE_FIELD.to_string(),
                value,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_code_update_layout() {
        let request = UpdateRequest::new("r1", ErrorCodeFields { error_code: 12 });
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"reqId": "r1", "d": {"errorCode": 12}})
        );
    }

    #[test]
    fn test_clear_has_no_data() {
        let request = UpdateRequest::<Value>::clear("r2");
        assert_eq!(request.to_vec().unwrap(), br#"{"reqId":"r2"}"#.to_vec());
    }

    #[test]
    fn test_firmware_state_fields() {
        let list = FieldList::firmware_state(FirmwareStateFields {
            state: FirmwareState::Downloading,
            update_status: FirmwareUpdateStatus::InProgress,
        })
        .unwrap();

        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            json!({"fields": [{"field": "mgmt.firmware", "value": {"state": 1, "updateStatus": 1}}]})
        );
    }

    #[test]
    fn test_field_list_parse() {
        let list: FieldList = serde_json::from_value(json!({
            "fields": [{"field": "location", "value": {"latitude": 1.0}}]
        }))
        .unwrap();

        assert_eq!(list.fields.len(), 1);
        assert_eq!(list.fields[0].field, LOCATION_FIELD);
    }
}
