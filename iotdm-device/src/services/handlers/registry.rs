use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use iotdm_api::{ResponseCode, ServerTopic, TopicSet};

use super::{
    DeviceUpdateHandler, FactoryResetHandler, FirmwareDownloadHandler, FirmwareUpdateHandler,
    HandlerContext, RebootHandler, RequestHandler,
};
use crate::errors::TransportError;
use crate::services::transport::Transport;

/// Counters for one registered handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerStats {
    pub handled: u64,
    pub accepted: u64,
    pub rejected: u64,
}

struct Registration {
    handler: Arc<dyn RequestHandler>,
    subscribed: bool,
    stats: HandlerStats,
}

/// Topic kind to handler mapping plus the subscription state of each.
///
/// The lock only guards the table; subscribe and unsubscribe calls happen
/// with it released.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: RwLock<BTreeMap<ServerTopic, Registration>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a handler for every server-initiated request kind.
    pub fn with_default_handlers() -> Self {
        let registry = Self::new();
        let handlers: [Arc<dyn RequestHandler>; 5] = [
            Arc::new(FirmwareDownloadHandler),
            Arc::new(FirmwareUpdateHandler),
            Arc::new(RebootHandler),
            Arc::new(FactoryResetHandler),
            Arc::new(DeviceUpdateHandler),
        ];
        for handler in handlers {
            registry.register_handler(handler.topic(), handler);
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ServerTopic, Registration>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ServerTopic, Registration>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind `handler` to `topic`, replacing any previous binding. The new
    /// handler starts unsubscribed.
    pub fn register_handler(&self, topic: ServerTopic, handler: Arc<dyn RequestHandler>) {
        if topic == ServerTopic::Response {
            tracing::warn!("The response topic is reserved for correlation, handler ignored");
            return;
        }

        let previous = self.write().insert(
            topic,
            Registration {
                handler,
                subscribed: false,
                stats: HandlerStats::default(),
            },
        );
        if previous.is_some_and(|r| r.subscribed) {
            tracing::warn!(?topic, "Replaced a subscribed handler; call reconcile to resubscribe");
        }
    }

    /// The handler bound to `topic`, if it is currently subscribed.
    pub fn handler_for(&self, topic: ServerTopic) -> Option<Arc<dyn RequestHandler>> {
        self.read()
            .get(&topic)
            .filter(|registration| registration.subscribed)
            .map(|registration| Arc::clone(&registration.handler))
    }

    pub fn is_subscribed(&self, topic: ServerTopic) -> bool {
        self.read().get(&topic).is_some_and(|r| r.subscribed)
    }

    pub fn subscribed_topics(&self) -> Vec<ServerTopic> {
        self.read()
            .iter()
            .filter(|(_, registration)| registration.subscribed)
            .map(|(topic, _)| *topic)
            .collect()
    }

    pub fn record(&self, topic: ServerTopic, code: ResponseCode) {
        if let Some(registration) = self.write().get_mut(&topic) {
            registration.stats.handled += 1;
            if code.is_success() {
                registration.stats.accepted += 1;
            } else {
                registration.stats.rejected += 1;
            }
        }
    }

    pub fn stats(&self, topic: ServerTopic) -> Option<HandlerStats> {
        self.read().get(&topic).map(|r| r.stats)
    }

    /// Bring subscriptions in line with what the device currently offers.
    /// Every change is attempted; the first failure is returned.
    pub async fn reconcile(
        &self,
        ctx: &HandlerContext<'_>,
        transport: &dyn Transport,
        topics: &TopicSet,
    ) -> Result<(), TransportError> {
        let changes: Vec<_> = self
            .read()
            .iter()
            .filter_map(|(topic, registration)| {
                let wanted = registration.handler.is_wanted(ctx);
                (wanted != registration.subscribed)
                    .then(|| (*topic, Arc::clone(&registration.handler), wanted))
            })
            .collect();

        let mut first_error = None;
        for (topic, handler, wanted) in changes {
            let result = if wanted {
                handler.subscribe(transport, topics).await
            } else {
                handler.unsubscribe(transport, topics).await
            };

            match result {
                Ok(()) => {
                    tracing::debug!(handler = handler.name(), subscribed = wanted, "Handler reconciled");
                    self.mark(topic, &handler, wanted);
                }
                Err(e) => {
                    tracing::warn!(handler = handler.name(), "Failed to reconcile handler: {}", e);
                    if !wanted {
                        self.mark(topic, &handler, false);
                    }
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Drop every subscription. Registrations are marked unsubscribed even
    /// when the transport call fails.
    pub async fn unsubscribe_all(&self, transport: &dyn Transport, topics: &TopicSet) {
        let subscribed: Vec<_> = self
            .read()
            .iter()
            .filter(|(_, registration)| registration.subscribed)
            .map(|(topic, registration)| (*topic, Arc::clone(&registration.handler)))
            .collect();

        for (topic, handler) in subscribed {
            self.mark(topic, &handler, false);
            if let Err(e) = handler.unsubscribe(transport, topics).await {
                tracing::warn!(handler = handler.name(), "Failed to unsubscribe handler: {}", e);
            }
        }
    }

    fn mark(&self, topic: ServerTopic, handler: &Arc<dyn RequestHandler>, subscribed: bool) {
        if let Some(registration) = self.write().get_mut(&topic) {
            // Skip if the binding was replaced meanwhile.
            if Arc::ptr_eq(&registration.handler, handler) {
                registration.subscribed = subscribed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use iotdm_api::{DeviceIdentity, Supports, TopicScheme};

    use super::*;
    use crate::resources::{DeviceAction, DeviceData, DeviceFirmware};
    use crate::services::transport::MemoryTransport;

    fn topics() -> TopicSet {
        TopicSet::new(&DeviceIdentity::new("org", "type", "id"), TopicScheme::Device)
    }

    fn device() -> DeviceData {
        DeviceData::builder()
            .firmware(Arc::new(DeviceFirmware::default()))
            .action(Arc::new(DeviceAction::new()))
            .build()
    }

    #[tokio::test]
    async fn test_reconcile_follows_capabilities() {
        let registry = HandlerRegistry::with_default_handlers();
        let transport = MemoryTransport::new();
        let data = device();

        let ctx = HandlerContext {
            device: &data,
            supports: Supports {
                device_actions: true,
                firmware_actions: false,
            },
        };
        registry.reconcile(&ctx, &transport, &topics()).await.unwrap();

        assert_eq!(
            registry.subscribed_topics(),
            vec![
                ServerTopic::InitiateReboot,
                ServerTopic::InitiateFactoryReset,
                ServerTopic::DeviceUpdate,
            ]
        );
        assert!(transport.is_subscribed("iotdm-1/mgmt/initiate/device/reboot"));
        assert!(!transport.is_subscribed("iotdm-1/mgmt/initiate/firmware/download"));

        let ctx = HandlerContext {
            device: &data,
            supports: Supports {
                device_actions: false,
                firmware_actions: true,
            },
        };
        registry.reconcile(&ctx, &transport, &topics()).await.unwrap();

        assert!(registry.is_subscribed(ServerTopic::InitiateFirmwareDownload));
        assert!(!registry.is_subscribed(ServerTopic::InitiateReboot));
        assert!(!transport.is_subscribed("iotdm-1/mgmt/initiate/device/reboot"));
    }

    #[tokio::test]
    async fn test_unsubscribe_all() {
        let registry = HandlerRegistry::with_default_handlers();
        let transport = MemoryTransport::new();
        let data = device();
        let ctx = HandlerContext {
            device: &data,
            supports: Supports {
                device_actions: true,
                firmware_actions: true,
            },
        };

        registry.reconcile(&ctx, &transport, &topics()).await.unwrap();
        assert_eq!(registry.subscribed_topics().len(), 5);

        registry.unsubscribe_all(&transport, &topics()).await;

        assert!(registry.subscribed_topics().is_empty());
        assert!(transport.subscriptions().is_empty());
        assert!(registry.handler_for(ServerTopic::InitiateReboot).is_none());
    }

    #[test]
    fn test_response_topic_is_reserved() {
        let registry = HandlerRegistry::new();
        registry.register_handler(ServerTopic::Response, Arc::new(RebootHandler));
        assert!(registry.stats(ServerTopic::Response).is_none());
    }

    #[test]
    fn test_record_stats() {
        let registry = HandlerRegistry::with_default_handlers();
        registry.record(ServerTopic::InitiateReboot, ResponseCode::Accepted);
        registry.record(ServerTopic::InitiateReboot, ResponseCode::NotImplemented);

        assert_eq!(
            registry.stats(ServerTopic::InitiateReboot),
            Some(HandlerStats {
                handled: 2,
                accepted: 1,
                rejected: 1,
            })
        );
    }
}
