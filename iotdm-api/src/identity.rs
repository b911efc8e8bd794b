use core::fmt;

use serde::{Deserialize, Serialize};

/// Immutable identity of a device within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    organization: String,
    device_type: String,
    device_id: String,
}

impl DeviceIdentity {
    pub fn new(
        organization: impl Into<String>,
        device_type: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            device_type: device_type.into(),
            device_id: device_id.into(),
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Connection identifier presented to the broker, `d:<org>:<type>:<id>`.
    pub fn client_id(&self) -> String {
        format!(
            "d:{}:{}:{}",
            self.organization, self.device_type, self.device_id
        )
    }

    /// Default broker host for the organization.
    pub fn messaging_host(&self) -> String {
        format!(
            "{}.messaging.internetofthings.ibmcloud.com",
            self.organization
        )
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.organization, self.device_type, self.device_id
        )
    }
}
