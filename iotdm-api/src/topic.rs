use serde::{Deserialize, Serialize};

use crate::identity::DeviceIdentity;

const SERVER_ROOT: &str = "iotdm-1";
const DEVICE_ROOT: &str = "iotdevice-1";

/// Topics the server publishes to and the device subscribes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServerTopic {
    /// Responses to requests the device sent
    Response,
    InitiateFirmwareDownload,
    InitiateFirmwareUpdate,
    InitiateReboot,
    InitiateFactoryReset,
    /// Server writes device attributes
    DeviceUpdate,
}

impl ServerTopic {
    pub const ALL: [ServerTopic; 6] = [
        Self::Response,
        Self::InitiateFirmwareDownload,
        Self::InitiateFirmwareUpdate,
        Self::InitiateReboot,
        Self::InitiateFactoryReset,
        Self::DeviceUpdate,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::InitiateFirmwareDownload => "mgmt/initiate/firmware/download",
            Self::InitiateFirmwareUpdate => "mgmt/initiate/firmware/update",
            Self::InitiateReboot => "mgmt/initiate/device/reboot",
            Self::InitiateFactoryReset => "mgmt/initiate/device/factory_reset",
            Self::DeviceUpdate => "device/update",
        }
    }
}

/// Topics the device publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceTopic {
    Manage,
    Unmanage,
    /// Responses to server-initiated requests
    Response,
    UpdateLocation,
    AddErrorCode,
    ClearErrorCodes,
    AddLog,
    ClearLog,
    /// Firmware state changes
    Notify,
}

impl DeviceTopic {
    pub const ALL: [DeviceTopic; 9] = [
        Self::Manage,
        Self::Unmanage,
        Self::Response,
        Self::UpdateLocation,
        Self::AddErrorCode,
        Self::ClearErrorCodes,
        Self::AddLog,
        Self::ClearLog,
        Self::Notify,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Manage => "mgmt/manage",
            Self::Unmanage => "mgmt/unmanage",
            Self::Response => "response",
            Self::UpdateLocation => "device/update/location",
            Self::AddErrorCode => "add/diag/errorCodes",
            Self::ClearErrorCodes => "clear/diag/errorCodes",
            Self::AddLog => "add/diag/log",
            Self::ClearLog => "clear/diag/log",
            Self::Notify => "notify",
        }
    }
}

/// How topic names embed the device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicScheme {
    /// The device owns its connection; identity is carried by the client id.
    #[default]
    Device,
    /// The device is reached through a gateway; identity is part of every topic.
    Gateway,
}

/// Concrete topic names for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    server_prefix: String,
    device_prefix: String,
}

impl TopicSet {
    pub fn new(identity: &DeviceIdentity, scheme: TopicScheme) -> Self {
        let (server_prefix, device_prefix) = match scheme {
            TopicScheme::Device => (SERVER_ROOT.to_string(), DEVICE_ROOT.to_string()),
            TopicScheme::Gateway => {
                let path = format!(
                    "type/{}/id/{}",
                    identity.device_type(),
                    identity.device_id()
                );
                (
                    format!("{}/{}", SERVER_ROOT, path),
                    format!("{}/{}", DEVICE_ROOT, path),
                )
            }
        };

        Self {
            server_prefix,
            device_prefix,
        }
    }

    pub fn server(&self, topic: ServerTopic) -> String {
        format!("{}/{}", self.server_prefix, topic.suffix())
    }

    pub fn device(&self, topic: DeviceTopic) -> String {
        format!("{}/{}", self.device_prefix, topic.suffix())
    }

    /// Resolve an inbound topic name back to its kind.
    pub fn parse_server(&self, topic: &str) -> Option<ServerTopic> {
        let suffix = topic
            .strip_prefix(self.server_prefix.as_str())?
            .strip_prefix('/')?;

        ServerTopic::ALL
            .into_iter()
            .find(|kind| kind.suffix() == suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("org", "RasPi", "dev-7")
    }

    #[test]
    fn test_device_scheme_topics() {
        let topics = TopicSet::new(&identity(), TopicScheme::Device);

        assert_eq!(topics.device(DeviceTopic::Manage), "iotdevice-1/mgmt/manage");
        assert_eq!(
            topics.device(DeviceTopic::AddErrorCode),
            "iotdevice-1/add/diag/errorCodes"
        );
        assert_eq!(
            topics.server(ServerTopic::InitiateFirmwareDownload),
            "iotdm-1/mgmt/initiate/firmware/download"
        );
    }

    #[test]
    fn test_gateway_scheme_topics() {
        let topics = TopicSet::new(&identity(), TopicScheme::Gateway);

        assert_eq!(
            topics.device(DeviceTopic::Manage),
            "iotdevice-1/type/RasPi/id/dev-7/mgmt/manage"
        );
        assert_eq!(
            topics.server(ServerTopic::Response),
            "iotdm-1/type/RasPi/id/dev-7/response"
        );
    }

    #[test]
    fn test_parse_server_topic() {
        for scheme in [TopicScheme::Device, TopicScheme::Gateway] {
            let topics = TopicSet::new(&identity(), scheme);
            for kind in ServerTopic::ALL {
                assert_eq!(topics.parse_server(&topics.server(kind)), Some(kind));
            }
        }
    }

    #[test]
    fn test_parse_unknown_topic() {
        let topics = TopicSet::new(&identity(), TopicScheme::Device);

        assert_eq!(topics.parse_server("iotdm-1/observe"), None);
        assert_eq!(topics.parse_server("iotdevice-1/response"), None);
        assert_eq!(topics.parse_server("iotdm-1response"), None);
    }

    #[test]
    fn test_gateway_rejects_other_device() {
        let topics = TopicSet::new(&identity(), TopicScheme::Gateway);

        assert_eq!(
            topics.parse_server("iotdm-1/type/RasPi/id/dev-8/response"),
            None
        );
    }
}
