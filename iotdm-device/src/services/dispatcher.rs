use std::sync::Arc;

use iotdm_api::{
    DeviceTopic, DmResponse, DocumentError, InboundRequest, QoS, ResponseCode, ServerTopic,
    TopicSet, parse_object,
};

use super::correlator::ResponseCorrelator;
use super::handlers::{DeviceCommand, FieldUpdate, HandlerContext, HandlerRegistry};
use super::lifecycle::Capabilities;
use super::transport::Transport;
use crate::errors::TransportError;
use crate::resources::DeviceData;

/// What became of one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A response matched a pending request
    Resolved,
    /// A response nobody was waiting for
    Unsolicited,
    /// A request was answered with this code
    Handled(ResponseCode),
    Dropped(DropReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    UnknownTopic,
    NoHandler(ServerTopic),
    Malformed(DocumentError),
    ResponseNotSent(TransportError),
}

/// Routes inbound messages to the correlator or to the bound handler.
pub struct Dispatcher {
    topics: TopicSet,
    device: Arc<DeviceData>,
    registry: Arc<HandlerRegistry>,
    correlator: Arc<ResponseCorrelator>,
    capabilities: Arc<Capabilities>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(
        topics: TopicSet,
        device: Arc<DeviceData>,
        registry: Arc<HandlerRegistry>,
        correlator: Arc<ResponseCorrelator>,
        capabilities: Arc<Capabilities>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            topics,
            device,
            registry,
            correlator,
            capabilities,
            transport,
        }
    }

    /// Handle one inbound message. Never fails; problems are logged and
    /// reported through the returned outcome.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let Some(kind) = self.topics.parse_server(topic) else {
            tracing::debug!(topic, "Dropping message on unknown topic");
            return DispatchOutcome::Dropped(DropReason::UnknownTopic);
        };

        if kind == ServerTopic::Response {
            return self.resolve(payload);
        }

        let Some(handler) = self.registry.handler_for(kind) else {
            tracing::debug!(topic, "No handler bound, dropping message");
            return DispatchOutcome::Dropped(DropReason::NoHandler(kind));
        };

        let request = match InboundRequest::parse(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(topic, "Dropping malformed request: {}", e);
                return DispatchOutcome::Dropped(DropReason::Malformed(e));
            }
        };

        let ctx = HandlerContext {
            device: &self.device,
            supports: self.capabilities.snapshot(),
        };
        let outcome = handler.handle_request(&ctx, &request);
        self.registry.record(kind, outcome.code);

        tracing::info!(
            handler = handler.name(),
            req_id = %request.req_id,
            rc = outcome.code.code(),
            "Handled server request",
        );

        let deferred = match outcome.command {
            Some(command) if command.is_deferred() => Some(command),
            Some(command) => {
                execute(&self.device, command);
                None
            }
            None => None,
        };

        if let Err(e) = self.respond(&request.req_id, outcome.code).await {
            tracing::error!(req_id = %request.req_id, "Failed to send response: {}", e);
            return DispatchOutcome::Dropped(DropReason::ResponseNotSent(e));
        }

        // Long-running device work must not hold up the inbound path.
        if let Some(command) = deferred {
            let device = Arc::clone(&self.device);
            tokio::spawn(async move { execute(&device, command) });
        }

        DispatchOutcome::Handled(outcome.code)
    }

    fn resolve(&self, payload: &[u8]) -> DispatchOutcome {
        let response = match parse_object(payload).and_then(DmResponse::from_object) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Dropping malformed response: {}", e);
                return DispatchOutcome::Dropped(DropReason::Malformed(e));
            }
        };

        if self.correlator.resolve(response) {
            DispatchOutcome::Resolved
        } else {
            DispatchOutcome::Unsolicited
        }
    }

    async fn respond(&self, req_id: &str, code: ResponseCode) -> Result<(), TransportError> {
        let topic = self.topics.device(DeviceTopic::Response);
        let payload = DmResponse::new(req_id, code)
            .to_vec()
            .map_err(|e| TransportError::publish(&topic, e))?;

        self.transport.publish(&topic, payload, QoS::AtLeastOnce).await
    }
}

fn execute(device: &DeviceData, command: DeviceCommand) {
    match command {
        DeviceCommand::Firmware(action) => {
            let notified = device.firmware().map_or(0, |firmware| firmware.fire(action));
            if notified == 0 {
                tracing::warn!(?action, "No listener for firmware action");
            }
        }
        DeviceCommand::Device(event) => {
            let notified = device.action().map_or(0, |action| action.fire(event));
            if notified == 0 {
                tracing::warn!(?event, "No listener for device action");
            }
        }
        DeviceCommand::ApplyUpdate(updates) => {
            for update in updates {
                match update {
                    FieldUpdate::Firmware(descriptor) => {
                        if let Some(firmware) = device.firmware() {
                            firmware.apply_server_update(descriptor);
                        }
                    }
                    FieldUpdate::Location(location) => {
                        if let Some(resource) = device.location() {
                            resource.apply_server_update(location);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use iotdm_api::{DeviceIdentity, FirmwareDescriptor, Supports, TopicScheme};
    use serde_json::json;

    use super::*;
    use crate::resources::{DeviceFirmware, FirmwareAction};
    use crate::services::transport::MemoryTransport;

    struct Fixture {
        dispatcher: Dispatcher,
        transport: Arc<MemoryTransport>,
        correlator: Arc<ResponseCorrelator>,
        firmware: Arc<DeviceFirmware>,
    }

    async fn fixture() -> Fixture {
        let identity = DeviceIdentity::new("org", "type", "id");
        let topics = TopicSet::new(&identity, TopicScheme::Device);
        let firmware = Arc::new(DeviceFirmware::new(FirmwareDescriptor {
            url: Some("https://fw.example/2.bin".into()),
            ..Default::default()
        }));
        let device = Arc::new(DeviceData::builder().firmware(Arc::clone(&firmware)).build());
        let registry = Arc::new(HandlerRegistry::with_default_handlers());
        let correlator = Arc::new(ResponseCorrelator::new());
        let capabilities = Arc::new(Capabilities::new(Supports {
            device_actions: false,
            firmware_actions: true,
        }));
        let transport = Arc::new(MemoryTransport::new());

        let ctx = HandlerContext {
            device: &device,
            supports: capabilities.snapshot(),
        };
        registry
            .reconcile(&ctx, transport.as_ref(), &topics)
            .await
            .unwrap();

        Fixture {
            dispatcher: Dispatcher::new(
                topics,
                device,
                registry,
                Arc::clone(&correlator),
                capabilities,
                transport.clone(),
            ),
            transport,
            correlator,
            firmware,
        }
    }

    #[tokio::test]
    async fn test_unknown_topic_is_dropped() {
        let fixture = fixture().await;
        let outcome = fixture.dispatcher.dispatch("iotdm-1/unknown", b"{}").await;

        assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::UnknownTopic));
        assert!(fixture.transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_unbound_topic_is_dropped() {
        let fixture = fixture().await;
        let outcome = fixture
            .dispatcher
            .dispatch("iotdm-1/mgmt/initiate/device/reboot", br#"{"reqId":"x"}"#)
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Dropped(DropReason::NoHandler(ServerTopic::InitiateReboot))
        );
    }

    #[tokio::test]
    async fn test_download_fires_once_and_echoes_req_id() {
        let fixture = fixture().await;
        let fired = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&fired);
        fixture
            .firmware
            .subscribe_actions(move |action| sink.lock().unwrap().push(action));

        let outcome = fixture
            .dispatcher
            .dispatch(
                "iotdm-1/mgmt/initiate/firmware/download",
                br#"{"reqId":"dl-42","d":{"ignored":true}}"#,
            )
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled(ResponseCode::Accepted));

        let responses = fixture.transport.published_on("iotdevice-1/response");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].json(), json!({"reqId": "dl-42", "rc": 202}));

        tokio::task::yield_now().await;
        assert_eq!(*fired.lock().unwrap(), vec![FirmwareAction::DownloadStart]);
    }

    #[tokio::test]
    async fn test_missing_req_id_is_dropped() {
        let fixture = fixture().await;
        let outcome = fixture
            .dispatcher
            .dispatch("iotdm-1/mgmt/initiate/firmware/download", br#"{"d":{}}"#)
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Dropped(DropReason::Malformed(DocumentError::MissingRequestId))
        );
        assert!(fixture.transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_response_routing() {
        let fixture = fixture().await;
        let pending = fixture
            .correlator
            .register("m1", "iotdevice-1/mgmt/manage", std::time::Duration::from_secs(5))
            .unwrap();

        let outcome = fixture
            .dispatcher
            .dispatch("iotdm-1/response", br#"{"reqId":"m1","rc":200}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Resolved);
        assert_eq!(pending.wait().await.unwrap().rc, 200);

        let late = fixture
            .dispatcher
            .dispatch("iotdm-1/response", br#"{"reqId":"m1","rc":200}"#)
            .await;
        assert_eq!(late, DispatchOutcome::Unsolicited);
    }

    #[tokio::test]
    async fn test_failed_response_skips_action() {
        let fixture = fixture().await;
        let fired = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&fired);
        fixture
            .firmware
            .subscribe_actions(move |_| *counter.lock().unwrap() += 1);
        fixture.transport.set_fail_publish(true);

        let outcome = fixture
            .dispatcher
            .dispatch("iotdm-1/mgmt/initiate/firmware/download", br#"{"reqId":"dl-1"}"#)
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Dropped(DropReason::ResponseNotSent(_))
        ));
        tokio::task::yield_now().await;
        assert_eq!(*fired.lock().unwrap(), 0);
    }
}
