//! Server-initiated requests, one handler per inbound topic kind.
//!
//! A handler is a pure decision over a snapshot of device state: it returns the
//! response code and, when accepted, the command to carry out. Executing the
//! command is left to the dispatcher.

mod device_update;
mod factory_reset;
mod firmware_download;
mod firmware_update;
mod reboot;
mod registry;

pub use device_update::DeviceUpdateHandler;
pub use factory_reset::FactoryResetHandler;
pub use firmware_download::FirmwareDownloadHandler;
pub use firmware_update::FirmwareUpdateHandler;
pub use reboot::RebootHandler;
pub use registry::{HandlerRegistry, HandlerStats};

use async_trait::async_trait;
use iotdm_api::{
    FirmwareDescriptor, InboundRequest, LocationData, QoS, ResponseCode, ServerTopic, Supports,
    TopicSet,
};

use crate::errors::TransportError;
use crate::resources::{DeviceActionEvent, DeviceData, FirmwareAction};
use crate::services::transport::Transport;

/// State a handler decides against.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub device: &'a DeviceData,
    pub supports: Supports,
}

/// A server write to one device attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Firmware(FirmwareDescriptor),
    Location(LocationData),
}

/// Side effect of an accepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Firmware(FirmwareAction),
    Device(DeviceActionEvent),
    ApplyUpdate(Vec<FieldUpdate>),
}

impl DeviceCommand {
    /// Whether the command hands work to the application and therefore runs
    /// after the response is sent.
    pub fn is_deferred(&self) -> bool {
        !matches!(self, Self::ApplyUpdate(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub code: ResponseCode,
    pub command: Option<DeviceCommand>,
}

impl HandlerOutcome {
    pub fn respond(code: ResponseCode) -> Self {
        Self {
            code,
            command: None,
        }
    }

    pub fn accept(command: DeviceCommand) -> Self {
        Self {
            code: ResponseCode::Accepted,
            command: Some(command),
        }
    }
}

/// Handler for one kind of server-initiated request.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Inbound topic kind the handler serves
    fn topic(&self) -> ServerTopic;

    /// Name of the handler (for logging)
    fn name(&self) -> &'static str;

    /// Whether the device currently offers what this handler serves
    fn is_wanted(&self, ctx: &HandlerContext<'_>) -> bool;

    /// Decide the response to `request`
    fn handle_request(&self, ctx: &HandlerContext<'_>, request: &InboundRequest) -> HandlerOutcome;

    async fn subscribe(&self, transport: &dyn Transport, topics: &TopicSet) -> Result<(), TransportError> {
        transport
            .subscribe(&topics.server(self.topic()), QoS::AtLeastOnce)
            .await
    }

    async fn unsubscribe(&self, transport: &dyn Transport, topics: &TopicSet) -> Result<(), TransportError> {
        transport.unsubscribe(&topics.server(self.topic())).await
    }
}
