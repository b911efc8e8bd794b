use std::sync::Arc;

use iotdm_api::{DeviceDataDocument, DeviceInfo};
use serde_json::Value;

use super::{DeviceAction, DeviceFirmware, DeviceLocation, DiagnosticErrorCode, DiagnosticLog};

/// Everything the device exposes for management. Only the attached
/// resources take part in the protocol.
#[derive(Clone, Default)]
pub struct DeviceData {
    info: DeviceInfo,
    metadata: Option<Value>,
    location: Option<Arc<DeviceLocation>>,
    error_code: Option<Arc<DiagnosticErrorCode>>,
    log: Option<Arc<DiagnosticLog>>,
    firmware: Option<Arc<DeviceFirmware>>,
    action: Option<Arc<DeviceAction>>,
}

impl DeviceData {
    pub fn builder() -> DeviceDataBuilder {
        DeviceDataBuilder::default()
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn location(&self) -> Option<&Arc<DeviceLocation>> {
        self.location.as_ref()
    }

    pub fn error_code(&self) -> Option<&Arc<DiagnosticErrorCode>> {
        self.error_code.as_ref()
    }

    pub fn log(&self) -> Option<&Arc<DiagnosticLog>> {
        self.log.as_ref()
    }

    pub fn firmware(&self) -> Option<&Arc<DeviceFirmware>> {
        self.firmware.as_ref()
    }

    pub fn action(&self) -> Option<&Arc<DeviceAction>> {
        self.action.as_ref()
    }

    /// The `deviceInfo`/`metadata` block carried in manage requests.
    pub fn to_document(&self) -> DeviceDataDocument {
        DeviceDataDocument {
            device_info: self.info.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Default)]
pub struct DeviceDataBuilder {
    data: DeviceData,
}

impl DeviceDataBuilder {
    pub fn info(mut self, info: DeviceInfo) -> Self {
        self.data.info = info;
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.data.metadata = Some(metadata);
        self
    }

    pub fn location(mut self, location: Arc<DeviceLocation>) -> Self {
        self.data.location = Some(location);
        self
    }

    pub fn error_code(mut self, error_code: Arc<DiagnosticErrorCode>) -> Self {
        self.data.error_code = Some(error_code);
        self
    }

    pub fn log(mut self, log: Arc<DiagnosticLog>) -> Self {
        self.data.log = Some(log);
        self
    }

    pub fn firmware(mut self, firmware: Arc<DeviceFirmware>) -> Self {
        self.data.firmware = Some(firmware);
        self
    }

    pub fn action(mut self, action: Arc<DeviceAction>) -> Self {
        self.data.action = Some(action);
        self
    }

    pub fn build(self) -> DeviceData {
        self.data
    }
}
