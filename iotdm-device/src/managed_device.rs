use std::sync::Arc;

use iotdm_api::{
    DeviceIdentity, QoS, RandomRequestIdGenerator, RequestIdGenerator, ServerTopic, Supports,
    TopicSet,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::configs::EngineConfig;
use crate::errors::{LifecycleError, TransportError};
use crate::resources::DeviceData;
use crate::services::{
    Capabilities, DispatchOutcome, Dispatcher, HandlerRegistry, InboundMessage,
    LifecycleController, LifecycleState, NotifierPipeline, NotifyContext, ResponseCorrelator,
    Transport,
};

/// Handle to the management engine of one device.
///
/// Owns every engine component; dropping the handle stops the renewal timer
/// and detaches the notifiers.
pub struct ManagedDevice {
    identity: DeviceIdentity,
    topics: TopicSet,
    device: Arc<DeviceData>,
    transport: Arc<dyn Transport>,
    correlator: Arc<ResponseCorrelator>,
    registry: Arc<HandlerRegistry>,
    lifecycle: Arc<LifecycleController>,
    dispatcher: Arc<Dispatcher>,
}

pub struct ManagedDeviceBuilder {
    identity: DeviceIdentity,
    transport: Arc<dyn Transport>,
    device: DeviceData,
    config: EngineConfig,
    supports: Supports,
    registry: Option<HandlerRegistry>,
    request_ids: Arc<dyn RequestIdGenerator>,
}

impl ManagedDeviceBuilder {
    pub fn device(mut self, device: DeviceData) -> Self {
        self.device = device;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn supports(mut self, supports: Supports) -> Self {
        self.supports = supports;
        self
    }

    /// Replace the default handler set.
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn request_ids(mut self, request_ids: Arc<dyn RequestIdGenerator>) -> Self {
        self.request_ids = request_ids;
        self
    }

    pub fn build(self) -> ManagedDevice {
        let topics = TopicSet::new(&self.identity, self.config.topic_scheme);
        let device = Arc::new(self.device);
        let correlator = Arc::new(ResponseCorrelator::new());
        let registry = Arc::new(
            self.registry
                .unwrap_or_else(HandlerRegistry::with_default_handlers),
        );
        let capabilities = Arc::new(Capabilities::new(self.supports));

        let notifiers = Arc::new(NotifierPipeline::new(NotifyContext::new(
            Arc::clone(&self.transport),
            Arc::clone(&correlator),
            topics.clone(),
            Arc::clone(&self.request_ids),
            self.config.response_timeout,
        )));

        let dispatcher = Arc::new(Dispatcher::new(
            topics.clone(),
            Arc::clone(&device),
            Arc::clone(&registry),
            Arc::clone(&correlator),
            Arc::clone(&capabilities),
            Arc::clone(&self.transport),
        ));

        let lifecycle = LifecycleController::new(
            self.config,
            topics.clone(),
            Arc::clone(&device),
            Arc::clone(&self.transport),
            Arc::clone(&correlator),
            Arc::clone(&registry),
            notifiers,
            capabilities,
            self.request_ids,
        );

        ManagedDevice {
            identity: self.identity,
            topics,
            device,
            transport: self.transport,
            correlator,
            registry,
            lifecycle,
            dispatcher,
        }
    }
}

impl ManagedDevice {
    pub fn builder(identity: DeviceIdentity, transport: Arc<dyn Transport>) -> ManagedDeviceBuilder {
        ManagedDeviceBuilder {
            identity,
            transport,
            device: DeviceData::default(),
            config: EngineConfig::default(),
            supports: Supports::default(),
            registry: None,
            request_ids: Arc::new(RandomRequestIdGenerator),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn device_data(&self) -> &Arc<DeviceData> {
        &self.device
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn correlator(&self) -> &Arc<ResponseCorrelator> {
        &self.correlator
    }

    /// Subscribe to the response topic. Call once the transport is up and
    /// before the first manage.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.transport
            .subscribe(&self.topics.server(ServerTopic::Response), QoS::AtLeastOnce)
            .await
    }

    /// Feed messages from `inbound` into [`dispatch`](Self::dispatch) until
    /// the channel closes.
    pub fn spawn_inbound(&self, mut inbound: mpsc::UnboundedReceiver<InboundMessage>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                dispatcher.dispatch(&message.topic, &message.payload).await;
            }
            tracing::debug!("Inbound channel closed");
        })
    }

    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        self.dispatcher.dispatch(topic, payload).await
    }

    pub async fn manage(&self, lifetime: u64) -> Result<(), LifecycleError> {
        self.lifecycle.manage(lifetime).await
    }

    pub async fn unmanage(&self) -> Result<(), LifecycleError> {
        self.lifecycle.unmanage().await
    }

    pub async fn is_managed(&self) -> bool {
        self.lifecycle.is_managed().await
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    pub async fn renewal_deadline(&self) -> Option<tokio::time::Instant> {
        self.lifecycle.renewal_deadline().await
    }

    pub fn supports(&self) -> Supports {
        self.lifecycle.supports()
    }

    pub async fn set_supports_firmware_actions(&self, supported: bool) -> Result<(), LifecycleError> {
        self.lifecycle.set_supports_firmware_actions(supported).await
    }

    pub async fn set_supports_device_actions(&self, supported: bool) -> Result<(), LifecycleError> {
        self.lifecycle.set_supports_device_actions(supported).await
    }
}
