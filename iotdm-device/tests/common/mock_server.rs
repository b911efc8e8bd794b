use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use iotdm_api::{
    DeviceIdentity, DeviceTopic, FirmwareDescriptor, LocationData, SequentialRequestIdGenerator,
    ServerTopic, Supports,
};
use iotdm_device::ManagedDevice;
use iotdm_device::configs::EngineConfig;
use iotdm_device::resources::{
    DeviceAction, DeviceData, DeviceFirmware, DeviceLocation, DiagnosticErrorCode, DiagnosticLog,
};
use iotdm_device::services::{DispatchOutcome, MemoryTransport, Published};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::new("testorg", "sensor", "dev-1")
}

/// One of every resource kind.
pub struct Resources {
    pub firmware: Arc<DeviceFirmware>,
    pub action: Arc<DeviceAction>,
    pub location: Arc<DeviceLocation>,
    pub error_code: Arc<DiagnosticErrorCode>,
    pub log: Arc<DiagnosticLog>,
}

impl Resources {
    pub fn new() -> Self {
        Self {
            firmware: Arc::new(DeviceFirmware::new(FirmwareDescriptor {
                version: Some("1.0.0".into()),
                url: Some("https://firmware.example/1.0.1.bin".into()),
                ..Default::default()
            })),
            action: Arc::new(DeviceAction::new()),
            location: Arc::new(DeviceLocation::new(LocationData::new(30.28565, -97.73921))),
            error_code: Arc::new(DiagnosticErrorCode::new()),
            log: Arc::new(DiagnosticLog::new()),
        }
    }

    pub fn device_data(&self) -> DeviceData {
        DeviceData::builder()
            .firmware(Arc::clone(&self.firmware))
            .action(Arc::clone(&self.action))
            .location(Arc::clone(&self.location))
            .error_code(Arc::clone(&self.error_code))
            .log(Arc::clone(&self.log))
            .build()
    }
}

/// Plays the management server against a device wired to an in-memory
/// transport: every request the device publishes is answered on the
/// response topic with the configured code.
pub struct MockServer {
    pub device: Arc<ManagedDevice>,
    pub transport: Arc<MemoryTransport>,
    pub resources: Resources,
    replies: Arc<Mutex<HashMap<DeviceTopic, Option<i32>>>>,
    responder: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(supports: Supports) -> Self {
        Self::start_with(supports, EngineConfig::default()).await
    }

    pub async fn start_with(supports: Supports, config: EngineConfig) -> Self {
        let identity = identity();
        let resources = Resources::new();
        let (transport, mut tap) = MemoryTransport::with_tap();
        let transport = Arc::new(transport);

        let device = Arc::new(
            ManagedDevice::builder(identity.clone(), transport.clone())
                .device(resources.device_data())
                .config(config)
                .supports(supports)
                .request_ids(Arc::new(SequentialRequestIdGenerator::new(&identity)))
                .build(),
        );
        device.connect().await.unwrap();

        let replies: Arc<Mutex<HashMap<DeviceTopic, Option<i32>>>> = Arc::default();
        let responder = {
            let device = Arc::clone(&device);
            let replies = Arc::clone(&replies);
            tokio::spawn(async move {
                let response_topic = device.topics().server(ServerTopic::Response);
                while let Some(message) = tap.recv().await {
                    let Some(kind) = device_topic(&device, &message.topic) else {
                        continue;
                    };
                    if kind == DeviceTopic::Response {
                        continue;
                    }

                    let rc = replies.lock().unwrap().get(&kind).copied().unwrap_or(Some(200));
                    let (Some(rc), Some(req_id)) = (rc, message.json()["reqId"].as_str().map(String::from)) else {
                        continue;
                    };

                    let body = serde_json::to_vec(&json!({"reqId": req_id, "rc": rc})).unwrap();
                    device.dispatch(&response_topic, &body).await;
                }
            })
        };

        Self {
            device,
            transport,
            resources,
            replies,
            responder,
        }
    }

    /// Answer requests on `topic` with `rc`, or not at all with `None`.
    pub fn respond_with(&self, topic: DeviceTopic, rc: Option<i32>) {
        self.replies.lock().unwrap().insert(topic, rc);
    }

    pub fn published(&self, topic: DeviceTopic) -> Vec<Published> {
        self.transport.published_on(&self.device.topics().device(topic))
    }

    /// Outbound update topics in publish order, responses excluded.
    pub fn update_topics(&self) -> Vec<DeviceTopic> {
        self.transport
            .published()
            .iter()
            .filter_map(|message| device_topic(&self.device, &message.topic))
            .filter(|kind| !matches!(kind, DeviceTopic::Response | DeviceTopic::Manage | DeviceTopic::Unmanage))
            .collect()
    }

    /// Deliver a server-initiated request.
    pub async fn send(&self, topic: ServerTopic, body: Value) -> DispatchOutcome {
        let payload = serde_json::to_vec(&body).unwrap();
        self.device
            .dispatch(&self.device.topics().server(topic), &payload)
            .await
    }

    /// The `rc` the device answered `req_id` with.
    pub fn answer_to(&self, req_id: &str) -> Option<i64> {
        self.published(DeviceTopic::Response)
            .iter()
            .map(Published::json)
            .find(|body| body["reqId"] == req_id)
            .and_then(|body| body["rc"].as_i64())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.responder.abort();
    }
}

fn device_topic(device: &ManagedDevice, topic: &str) -> Option<DeviceTopic> {
    DeviceTopic::ALL
        .into_iter()
        .find(|kind| device.topics().device(*kind) == topic)
}
