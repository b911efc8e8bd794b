use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Static description of the device reported in the manage request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptive_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Elevation in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    /// When the position was measured
    #[serde(rename = "measuredDateTime", with = "time::serde::rfc3339")]
    pub measured_at: OffsetDateTime,
    /// Accuracy in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl LocationData {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            measured_at: OffsetDateTime::now_utc(),
            accuracy: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LogSeverity {
    Informational,
    Warning,
    Error,
}

impl From<LogSeverity> for u8 {
    fn from(severity: LogSeverity) -> Self {
        match severity {
            LogSeverity::Informational => 0,
            LogSeverity::Warning => 1,
            LogSeverity::Error => 2,
        }
    }
}

impl TryFrom<u8> for LogSeverity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(LogSeverity::Informational),
            1 => Ok(LogSeverity::Warning),
            2 => Ok(LogSeverity::Error),
            other => Err(format!("unknown log severity {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub message: String,
    #[serde(rename = "timeStamp", with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub severity: LogSeverity,
    /// Optional base64 or free-form diagnostic payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, severity: LogSeverity) -> Self {
        Self {
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
            severity,
            data: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FirmwareState {
    #[default]
    Idle,
    Downloading,
    Downloaded,
}

impl From<FirmwareState> for u8 {
    fn from(state: FirmwareState) -> Self {
        match state {
            FirmwareState::Idle => 0,
            FirmwareState::Downloading => 1,
            FirmwareState::Downloaded => 2,
        }
    }
}

impl TryFrom<u8> for FirmwareState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Self::Idle),
            1 => Ok(Self::Downloading),
            2 => Ok(Self::Downloaded),
            other => Err(format!("unknown firmware state {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FirmwareUpdateStatus {
    #[default]
    Success,
    InProgress,
    OutOfMemory,
    ConnectionLost,
    VerificationFailed,
    UnsupportedImage,
    InvalidUri,
}

impl From<FirmwareUpdateStatus> for u8 {
    fn from(status: FirmwareUpdateStatus) -> Self {
        match status {
            FirmwareUpdateStatus::Success => 0,
            FirmwareUpdateStatus::InProgress => 1,
            FirmwareUpdateStatus::OutOfMemory => 2,
            FirmwareUpdateStatus::ConnectionLost => 3,
            FirmwareUpdateStatus::VerificationFailed => 4,
            FirmwareUpdateStatus::UnsupportedImage => 5,
            FirmwareUpdateStatus::InvalidUri => 6,
        }
    }
}

impl TryFrom<u8> for FirmwareUpdateStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::OutOfMemory),
            3 => Ok(Self::ConnectionLost),
            4 => Ok(Self::VerificationFailed),
            5 => Ok(Self::UnsupportedImage),
            6 => Ok(Self::InvalidUri),
            other => Err(format!("unknown firmware update status {}", other)),
        }
    }
}

/// Firmware image the device holds or has been told to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    #[serde(default)]
    pub state: FirmwareState,
    #[serde(default)]
    pub update_status: FirmwareUpdateStatus,
}
