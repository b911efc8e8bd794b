//! Publishes local resource changes to the server.
//!
//! Each attached resource gets its own queue and worker task. The worker
//! publishes one change at a time and, where the resource asks for it, waits
//! for the server's verdict before taking the next one, so per-resource order
//! survives and a clear never overtakes an append.

mod error_code;
mod firmware;
mod location;
mod log;

pub use error_code::ErrorCodeNotifier;
pub use firmware::FirmwareNotifier;
pub use location::LocationNotifier;
pub use log::LogNotifier;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use iotdm_api::{DeviceTopic, QoS, RequestIdGenerator, TopicSet, UpdateRequest};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::correlator::ResponseCorrelator;
use super::transport::Transport;
use crate::resources::{AckOutcome, DeviceData, ObserverId, Origin, Resource, ResourceEvent};

/// Everything a notifier needs to put a change on the wire.
pub struct NotifyContext {
    transport: Arc<dyn Transport>,
    correlator: Arc<ResponseCorrelator>,
    topics: TopicSet,
    request_ids: Arc<dyn RequestIdGenerator>,
    timeout: Duration,
}

impl NotifyContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        correlator: Arc<ResponseCorrelator>,
        topics: TopicSet,
        request_ids: Arc<dyn RequestIdGenerator>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            correlator,
            topics,
            request_ids,
            timeout,
        }
    }

    /// Publish `{reqId, d}` (or `{reqId}` when `body` is `None`) on `topic`.
    pub async fn send<T>(&self, topic: DeviceTopic, body: Option<&T>, wait: bool) -> AckOutcome
    where
        T: Serialize + Sync,
    {
        let req_id = self.request_ids.generate();
        let topic = self.topics.device(topic);

        let payload = match body {
            Some(body) => UpdateRequest::new(req_id.as_str(), body).to_vec(),
            None => UpdateRequest::<Value>::clear(req_id.as_str()).to_vec(),
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(topic = %topic, "Failed to encode update: {}", e);
                return AckOutcome::PublishFailed;
            }
        };

        let pending = if wait {
            match self.correlator.register(&req_id, &topic, self.timeout) {
                Ok(pending) => Some(pending),
                Err(e) => {
                    tracing::error!(topic = %topic, "Failed to track update: {}", e);
                    return AckOutcome::PublishFailed;
                }
            }
        } else {
            None
        };

        if let Err(e) = self.transport.publish(&topic, payload, QoS::AtLeastOnce).await {
            tracing::warn!(topic = %topic, "Failed to publish update: {}", e);
            return AckOutcome::PublishFailed;
        }

        let Some(pending) = pending else {
            return AckOutcome::Accepted;
        };

        match pending.wait().await {
            Ok(response) if response.is_success() => AckOutcome::Accepted,
            Ok(response) => {
                tracing::warn!(topic = %topic, rc = response.rc, "Server rejected update");
                AckOutcome::Rejected(response.rc)
            }
            Err(_) => {
                tracing::warn!(topic = %topic, req_id = %req_id, "No response to update");
                AckOutcome::TimedOut
            }
        }
    }
}

/// Turns the changes of one resource kind into update messages.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    type Change: Clone + Send + Sync + 'static;

    /// Name of the notifier (for logging)
    fn name(&self) -> &'static str;

    /// Whether `change` empties the resource and goes to the clear topic
    fn is_clear(&self, _change: &Self::Change) -> bool {
        false
    }

    /// Publish a value change
    async fn handle_event(&self, ctx: &NotifyContext, change: &Self::Change, wait: bool) -> AckOutcome;

    /// Publish a clear
    async fn clear_event(&self, _ctx: &NotifyContext, _change: &Self::Change, _wait: bool) -> AckOutcome {
        AckOutcome::Accepted
    }
}

struct Attachment {
    name: &'static str,
    detach: Box<dyn FnOnce() + Send>,
    worker: JoinHandle<()>,
}

fn attach<R, N>(resource: Arc<R>, notifier: N, ctx: Arc<NotifyContext>) -> Attachment
where
    R: Resource,
    N: Notifier<Change = R::Change>,
{
    let name = notifier.name();
    let (tx, mut rx) = mpsc::unbounded_channel::<ResourceEvent<R::Change>>();

    let observer_id: ObserverId = resource.core().add_publisher(Box::new(move |event| {
        let _ = tx.send(event.clone());
    }));

    let worker_resource = Arc::clone(&resource);
    let worker = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            // Server writes are already known upstream.
            if event.origin == Origin::Server {
                worker_resource
                    .core()
                    .acknowledge(event.revision, AckOutcome::Accepted);
                continue;
            }

            let wait = worker_resource.core().wait_for_response();
            worker_resource
                .core()
                .acknowledge(event.revision, AckOutcome::Pending);

            let outcome = if notifier.is_clear(&event.change) {
                notifier.clear_event(&ctx, &event.change, wait).await
            } else {
                notifier.handle_event(&ctx, &event.change, wait).await
            };

            tracing::debug!(notifier = name, revision = event.revision, ?outcome, "Change notified");
            worker_resource.core().acknowledge(event.revision, outcome);
        }
    });

    let detach = Box::new(move || {
        let core = resource.core();
        core.remove_observer(observer_id);

        if core.is_dirty() {
            core.acknowledge(core.revision(), AckOutcome::Cancelled);
        }
    });

    Attachment {
        name,
        detach,
        worker,
    }
}

/// The set of notifiers attached while the device is managed.
pub struct NotifierPipeline {
    ctx: Arc<NotifyContext>,
    attachments: Mutex<Vec<Attachment>>,
}

impl NotifierPipeline {
    pub fn new(ctx: NotifyContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            attachments: Mutex::new(Vec::new()),
        }
    }

    /// Attach a notifier to every resource the device exposes. Calling it
    /// while already running does nothing.
    pub fn start(&self, device: &DeviceData) {
        let mut attachments = self.attachments.lock().unwrap_or_else(|e| e.into_inner());
        if !attachments.is_empty() {
            return;
        }

        if let Some(location) = device.location() {
            attachments.push(attach(Arc::clone(location), LocationNotifier, Arc::clone(&self.ctx)));
        }
        if let Some(error_code) = device.error_code() {
            attachments.push(attach(Arc::clone(error_code), ErrorCodeNotifier, Arc::clone(&self.ctx)));
        }
        if let Some(log) = device.log() {
            attachments.push(attach(Arc::clone(log), LogNotifier, Arc::clone(&self.ctx)));
        }
        if let Some(firmware) = device.firmware() {
            attachments.push(attach(Arc::clone(firmware), FirmwareNotifier, Arc::clone(&self.ctx)));
        }

        tracing::debug!(count = attachments.len(), "Notifiers attached");
    }

    /// Detach every notifier. Changes still queued are discarded and their
    /// waiters see [`AckOutcome::Cancelled`].
    pub fn stop(&self) {
        let attachments = std::mem::take(&mut *self.attachments.lock().unwrap_or_else(|e| e.into_inner()));

        for attachment in attachments {
            attachment.worker.abort();
            (attachment.detach)();
            tracing::debug!(notifier = attachment.name, "Notifier detached");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.attachments.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

impl Drop for NotifierPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
