use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::DeviceInfo;

/// Capability flags announced to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supports {
    pub device_actions: bool,
    pub firmware_actions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDataDocument {
    pub device_info: DeviceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagePayload {
    /// Seconds until the server expires the device, 0 for never
    pub lifetime: u64,
    pub supports: Supports,
    pub device_data: DeviceDataDocument,
}

/// `{reqId, d: {lifetime, supports, deviceData}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManageRequest {
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub d: ManagePayload,
}

impl ManageRequest {
    pub fn new(
        req_id: impl Into<String>,
        lifetime: u64,
        supports: Supports,
        device_data: DeviceDataDocument,
    ) -> Self {
        Self {
            req_id: req_id.into(),
            d: ManagePayload {
                lifetime,
                supports,
                device_data,
            },
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// `{reqId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmanageRequest {
    #[serde(rename = "reqId")]
    pub req_id: String,
}

impl UnmanageRequest {
    pub fn new(req_id: impl Into<String>) -> Self {
        Self {
            req_id: req_id.into(),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
