use super::{ActionListeners, ObserverId};

/// Device-level commands issued by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceActionEvent {
    RebootStart,
    FactoryResetStart,
}

/// Entry point for reboot and factory reset requests. The application
/// subscribes and performs the action itself.
#[derive(Default)]
pub struct DeviceAction {
    listeners: ActionListeners<DeviceActionEvent>,
}

impl DeviceAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ObserverId
    where
        F: Fn(DeviceActionEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn fire(&self, event: DeviceActionEvent) -> usize {
        self.listeners.fire(event)
    }
}
