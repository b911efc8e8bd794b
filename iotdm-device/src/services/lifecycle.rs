//! Manage and unmanage handshakes plus keep-alive renewal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use iotdm_api::{
    DeviceTopic, ManageRequest, QoS, RequestIdGenerator, Supports, TopicSet, UnmanageRequest,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::correlator::ResponseCorrelator;
use super::handlers::{HandlerContext, HandlerRegistry};
use super::notifiers::NotifierPipeline;
use super::transport::Transport;
use crate::configs::EngineConfig;
use crate::errors::LifecycleError;
use crate::resources::DeviceData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unmanaged,
    ManageRequested,
    Managed,
    UnmanageRequested,
}

/// Why a manage request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManageReason {
    /// Requested by the application; (re)arms the renewal timer.
    Explicit,
    /// Keep-alive before the lifetime runs out.
    Renewal,
    /// Announce changed capability flags with lifetime 0.
    CapabilityChange,
}

/// Capability flags announced in manage requests.
#[derive(Debug, Default)]
pub struct Capabilities {
    firmware_actions: AtomicBool,
    device_actions: AtomicBool,
}

impl Capabilities {
    pub fn new(supports: Supports) -> Self {
        Self {
            firmware_actions: AtomicBool::new(supports.firmware_actions),
            device_actions: AtomicBool::new(supports.device_actions),
        }
    }

    pub fn snapshot(&self) -> Supports {
        Supports {
            device_actions: self.device_actions.load(Ordering::SeqCst),
            firmware_actions: self.firmware_actions.load(Ordering::SeqCst),
        }
    }

    /// Returns whether the flag changed.
    pub fn set_firmware_actions(&self, supported: bool) -> bool {
        self.firmware_actions.swap(supported, Ordering::SeqCst) != supported
    }

    /// Returns whether the flag changed.
    pub fn set_device_actions(&self, supported: bool) -> bool {
        self.device_actions.swap(supported, Ordering::SeqCst) != supported
    }
}

struct RenewalTimer {
    deadline: Arc<StdMutex<Instant>>,
    handle: JoinHandle<()>,
}

struct Inner {
    state: LifecycleState,
    lifetime: u64,
    renewal: Option<RenewalTimer>,
}

/// Owner of the lifecycle state. The state lock is never held across a
/// publish or a wait for the server.
pub struct LifecycleController {
    this: Weak<LifecycleController>,
    inner: Mutex<Inner>,
    config: EngineConfig,
    topics: TopicSet,
    device: Arc<DeviceData>,
    transport: Arc<dyn Transport>,
    correlator: Arc<ResponseCorrelator>,
    registry: Arc<HandlerRegistry>,
    notifiers: Arc<NotifierPipeline>,
    capabilities: Arc<Capabilities>,
    request_ids: Arc<dyn RequestIdGenerator>,
}

impl LifecycleController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        topics: TopicSet,
        device: Arc<DeviceData>,
        transport: Arc<dyn Transport>,
        correlator: Arc<ResponseCorrelator>,
        registry: Arc<HandlerRegistry>,
        notifiers: Arc<NotifierPipeline>,
        capabilities: Arc<Capabilities>,
        request_ids: Arc<dyn RequestIdGenerator>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            inner: Mutex::new(Inner {
                state: LifecycleState::Unmanaged,
                lifetime: 0,
                renewal: None,
            }),
            config,
            topics,
            device,
            transport,
            correlator,
            registry,
            notifiers,
            capabilities,
            request_ids,
        })
    }

    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state
    }

    pub async fn is_managed(&self) -> bool {
        self.state().await == LifecycleState::Managed
    }

    /// Lifetime in seconds last accepted by the server.
    pub async fn lifetime(&self) -> u64 {
        self.inner.lock().await.lifetime
    }

    /// When the armed renewal timer fires next. While a renewal is being
    /// sent this is the deadline that triggered it.
    pub async fn renewal_deadline(&self) -> Option<Instant> {
        self.inner
            .lock()
            .await
            .renewal
            .as_ref()
            .map(|timer| *timer.deadline.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn supports(&self) -> Supports {
        self.capabilities.snapshot()
    }

    /// Ask the server to manage the device for `lifetime` seconds, 0 meaning
    /// forever. Non-zero lifetimes below the configured minimum are raised to
    /// it.
    pub async fn manage(&self, lifetime: u64) -> Result<(), LifecycleError> {
        self.manage_with(ManageReason::Explicit, lifetime).await
    }

    async fn manage_with(&self, reason: ManageReason, requested: u64) -> Result<(), LifecycleError> {
        let stale = self.manage_once(reason, requested).await?;
        if stale {
            tracing::info!("Capabilities changed while manage was in flight");
            if let Err(e) = self.manage_once(ManageReason::CapabilityChange, 0).await {
                tracing::warn!("Capability change not announced: {}", e);
            }
        }
        Ok(())
    }

    /// Send one manage request. Returns whether the capability flags changed
    /// after the request took its snapshot and before the device became
    /// managed, in which case the server still holds the old flags.
    async fn manage_once(&self, reason: ManageReason, requested: u64) -> Result<bool, LifecycleError> {
        let (previous, lifetime, supports) = {
            let mut inner = self.inner.lock().await;
            let previous = inner.state;

            let lifetime = match (reason, previous) {
                (ManageReason::Explicit, LifecycleState::Unmanaged | LifecycleState::Managed) => {
                    self.clamp_lifetime(requested)
                }
                (ManageReason::Renewal, LifecycleState::Managed) => inner.lifetime,
                (ManageReason::CapabilityChange, LifecycleState::Managed) => 0,
                (_, state) => return Err(LifecycleError::InvalidState(state)),
            };

            if previous == LifecycleState::Unmanaged {
                inner.state = LifecycleState::ManageRequested;
            }
            // Flags only change under this lock, so the snapshot and the state
            // agree on who announces a later change.
            (previous, lifetime, self.capabilities.snapshot())
        };

        tracing::info!(?reason, lifetime, "Sending manage request");

        match self.send_manage(lifetime, supports).await {
            Ok(()) => self.on_manage_accepted(reason, lifetime, supports).await,
            Err(e) => {
                let mut inner = self.inner.lock().await;
                if previous == LifecycleState::Unmanaged && inner.state == LifecycleState::ManageRequested {
                    inner.state = LifecycleState::Unmanaged;
                }
                tracing::warn!(?reason, "Manage request failed: {}", e);
                Err(e)
            }
        }
    }

    async fn send_manage(&self, lifetime: u64, supports: Supports) -> Result<(), LifecycleError> {
        let req_id = self.request_ids.generate();
        let topic = self.topics.device(DeviceTopic::Manage);
        let payload =
            ManageRequest::new(req_id.as_str(), lifetime, supports, self.device.to_document()).to_vec()?;

        let pending = self
            .correlator
            .register(&req_id, &topic, self.config.response_timeout)?;
        self.transport.publish(&topic, payload, QoS::AtLeastOnce).await?;

        let response = pending.wait().await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(LifecycleError::Rejected(response.rc))
        }
    }

    async fn on_manage_accepted(
        &self,
        reason: ManageReason,
        lifetime: u64,
        announced: Supports,
    ) -> Result<bool, LifecycleError> {
        let stale = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                LifecycleState::ManageRequested | LifecycleState::Managed => {}
                // An unmanage overtook this request.
                state => return Err(LifecycleError::InvalidState(state)),
            }
            // While managed, a flag change announces itself.
            let stale =
                inner.state == LifecycleState::ManageRequested && self.capabilities.snapshot() != announced;
            inner.state = LifecycleState::Managed;

            if reason == ManageReason::Explicit {
                inner.lifetime = lifetime;
                if let Some(timer) = inner.renewal.take() {
                    timer.handle.abort();
                }
                inner.renewal = self.schedule_renewal(lifetime);
            }
            stale
        };

        // Until the server learns the new flags, serve what it was told.
        let supports = if stale {
            announced
        } else {
            self.capabilities.snapshot()
        };
        let ctx = HandlerContext {
            device: &self.device,
            supports,
        };
        if let Err(e) = self
            .registry
            .reconcile(&ctx, self.transport.as_ref(), &self.topics)
            .await
        {
            tracing::warn!("Handler subscriptions incomplete: {}", e);
        }
        self.notifiers.start(&self.device);

        tracing::info!(?reason, lifetime, "Device managed");
        Ok(stale)
    }

    fn clamp_lifetime(&self, requested: u64) -> u64 {
        let floor = self.config.min_lifetime.as_secs();
        if requested != 0 && requested < floor {
            tracing::warn!(requested, floor, "Lifetime below minimum, using minimum");
            floor
        } else {
            requested
        }
    }

    fn schedule_renewal(&self, lifetime: u64) -> Option<RenewalTimer> {
        if lifetime == 0 {
            return None;
        }

        let period = Duration::from_secs(lifetime).saturating_sub(self.config.renewal_margin);
        let period = period.max(Duration::from_secs(1));
        let deadline = Arc::new(StdMutex::new(Instant::now() + period));
        let next = Arc::clone(&deadline);
        let this = self.this.clone();

        let handle = tokio::spawn(async move {
            loop {
                let at = *next.lock().unwrap_or_else(|e| e.into_inner());
                tokio::time::sleep_until(at).await;
                let Some(controller) = this.upgrade() else {
                    break;
                };
                controller.renew().await;
                *next.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now() + period;
            }
        });

        tracing::debug!(?period, "Renewal scheduled");
        Some(RenewalTimer { deadline, handle })
    }

    /// Resend manage before the lifetime expires, retrying a bounded number
    /// of times. Does nothing unless the device is managed.
    async fn renew(&self) {
        let attempts = self.config.renewal_retries + 1;
        for attempt in 1..=attempts {
            match self.manage_with(ManageReason::Renewal, 0).await {
                Ok(()) => return,
                Err(LifecycleError::InvalidState(state)) => {
                    tracing::debug!(?state, "Skipping renewal");
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, "Renewal failed: {}", e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.renewal_retry_delay).await;
                    }
                }
            }
        }
        tracing::error!("Renewal retries exhausted");
    }

    /// Ask the server to stop managing the device. Handlers, notifiers and
    /// the renewal timer are torn down first; the device ends up `Unmanaged`
    /// even if the server never answers, in which case the error says so.
    pub async fn unmanage(&self) -> Result<(), LifecycleError> {
        let renewal = {
            let mut inner = self.inner.lock().await;
            if inner.state != LifecycleState::Managed {
                return Err(LifecycleError::InvalidState(inner.state));
            }
            inner.state = LifecycleState::UnmanageRequested;
            inner.renewal.take()
        };

        if let Some(timer) = renewal {
            timer.handle.abort();
        }
        self.registry
            .unsubscribe_all(self.transport.as_ref(), &self.topics)
            .await;
        self.notifiers.stop();

        let result = self.send_unmanage().await;

        {
            let mut inner = self.inner.lock().await;
            inner.state = LifecycleState::Unmanaged;
            inner.lifetime = 0;
        }

        match &result {
            Ok(()) => tracing::info!("Device unmanaged"),
            Err(e) => tracing::warn!("Unmanaged without server acknowledgement: {}", e),
        }
        result
    }

    async fn send_unmanage(&self) -> Result<(), LifecycleError> {
        let req_id = self.request_ids.generate();
        let topic = self.topics.device(DeviceTopic::Unmanage);
        let payload = UnmanageRequest::new(req_id.as_str()).to_vec()?;

        let pending = self
            .correlator
            .register(&req_id, &topic, self.config.unmanage_timeout)?;
        self.transport.publish(&topic, payload, QoS::AtLeastOnce).await?;

        let response = pending.wait().await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(LifecycleError::Rejected(response.rc))
        }
    }

    pub async fn set_supports_firmware_actions(&self, supported: bool) -> Result<(), LifecycleError> {
        self.update_capabilities(|capabilities| capabilities.set_firmware_actions(supported))
            .await
    }

    pub async fn set_supports_device_actions(&self, supported: bool) -> Result<(), LifecycleError> {
        self.update_capabilities(|capabilities| capabilities.set_device_actions(supported))
            .await
    }

    /// While managed, a capability change is announced with one lifetime-0
    /// manage. A change during the first manage is announced once that
    /// manage is accepted. Otherwise the next manage carries the new flags.
    async fn update_capabilities<F>(&self, update: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(&Capabilities) -> bool + Send,
    {
        let announce = {
            let inner = self.inner.lock().await;
            update(&self.capabilities) && inner.state == LifecycleState::Managed
        };
        if !announce {
            return Ok(());
        }
        self.manage_with(ManageReason::CapabilityChange, 0).await
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.get_mut().renewal.take() {
            timer.handle.abort();
        }
    }
}
