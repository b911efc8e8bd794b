use iotdm_api::{FirmwareDescriptor, FirmwareState, FirmwareStateFields, FirmwareUpdateStatus};

use super::{ActionListeners, AckOutcome, Observer, ObserverId, Origin, Resource, ResourceCore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareChange {
    /// Download state or update status moved; reported to the server.
    StateChanged(FirmwareStateFields),
    /// Descriptor fields were rewritten by the server.
    DescriptorUpdated(FirmwareDescriptor),
}

/// Commands the server asks the device to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareAction {
    DownloadStart,
    UpdateStart,
}

/// Firmware descriptor plus the download and update state machine the
/// application drives in response to [`FirmwareAction`]s.
pub struct DeviceFirmware {
    core: ResourceCore<FirmwareDescriptor, FirmwareChange>,
    actions: ActionListeners<FirmwareAction>,
}

impl DeviceFirmware {
    pub const NAME: &'static str = "mgmt.firmware";

    pub fn new(descriptor: FirmwareDescriptor) -> Self {
        Self {
            // State notifications are fire-and-forget.
            core: ResourceCore::new(Self::NAME, descriptor, false),
            actions: ActionListeners::new(),
        }
    }

    pub fn descriptor(&self) -> FirmwareDescriptor {
        self.core.read(Clone::clone)
    }

    pub fn state(&self) -> FirmwareState {
        self.core.read(|firmware| firmware.state)
    }

    pub fn update_status(&self) -> FirmwareUpdateStatus {
        self.core.read(|firmware| firmware.update_status)
    }

    pub fn url(&self) -> Option<String> {
        self.core.read(|firmware| firmware.url.clone())
    }

    /// Move the download state machine. Returns the revision, or `None` when
    /// the state did not change.
    pub fn set_state(&self, state: FirmwareState) -> Option<u64> {
        self.core.commit(Origin::Device, |firmware| {
            if firmware.state == state {
                return None;
            }
            firmware.state = state;
            Some(FirmwareChange::StateChanged(state_fields(firmware)))
        })
    }

    pub fn set_update_status(&self, status: FirmwareUpdateStatus) -> Option<u64> {
        self.core.commit(Origin::Device, |firmware| {
            if firmware.update_status == status {
                return None;
            }
            firmware.update_status = status;
            Some(FirmwareChange::StateChanged(state_fields(firmware)))
        })
    }

    /// Apply descriptor fields written by the server. Download state and
    /// update status stay under device control.
    pub(crate) fn apply_server_update(&self, update: FirmwareDescriptor) -> Option<u64> {
        self.core.commit(Origin::Server, |firmware| {
            let merged = FirmwareDescriptor {
                version: update.version.or_else(|| firmware.version.clone()),
                name: update.name.or_else(|| firmware.name.clone()),
                url: update.url.or_else(|| firmware.url.clone()),
                verifier: update.verifier.or_else(|| firmware.verifier.clone()),
                state: firmware.state,
                update_status: firmware.update_status,
            };
            if merged == *firmware {
                return None;
            }
            *firmware = merged.clone();
            Some(FirmwareChange::DescriptorUpdated(merged))
        })
    }

    pub fn add_observer(&self, observer: Observer<FirmwareChange>) -> ObserverId {
        self.core.add_observer(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.core.remove_observer(id)
    }

    pub fn subscribe_actions<F>(&self, listener: F) -> ObserverId
    where
        F: Fn(FirmwareAction) + Send + Sync + 'static,
    {
        self.actions.subscribe(listener)
    }

    pub fn unsubscribe_actions(&self, id: ObserverId) -> bool {
        self.actions.unsubscribe(id)
    }

    pub(crate) fn fire(&self, action: FirmwareAction) -> usize {
        self.actions.fire(action)
    }

    pub fn set_wait_for_response(&self, wait: bool) {
        self.core.set_wait_for_response(wait);
    }

    pub async fn wait_acknowledged(&self, revision: u64) -> AckOutcome {
        self.core.wait_acknowledged(revision).await
    }
}

impl Default for DeviceFirmware {
    fn default() -> Self {
        Self::new(FirmwareDescriptor::default())
    }
}

fn state_fields(firmware: &FirmwareDescriptor) -> FirmwareStateFields {
    FirmwareStateFields {
        state: firmware.state,
        update_status: firmware.update_status,
    }
}

impl Resource for DeviceFirmware {
    type Value = FirmwareDescriptor;
    type Change = FirmwareChange;

    fn core(&self) -> &ResourceCore<FirmwareDescriptor, FirmwareChange> {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_unchanged_state_is_silent() {
        let firmware = DeviceFirmware::default();
        assert_eq!(firmware.set_state(FirmwareState::Idle), None);
        assert_eq!(firmware.set_state(FirmwareState::Downloading), Some(1));
        assert_eq!(firmware.state(), FirmwareState::Downloading);
    }

    #[test]
    fn test_server_update_keeps_state() {
        let firmware = DeviceFirmware::default();
        firmware.set_state(FirmwareState::Downloaded);

        firmware.apply_server_update(FirmwareDescriptor {
            version: Some("2.0".into()),
            url: Some("https://fw.example/2.0.bin".into()),
            state: FirmwareState::Idle,
            ..Default::default()
        });

        let descriptor = firmware.descriptor();
        assert_eq!(descriptor.version.as_deref(), Some("2.0"));
        assert_eq!(descriptor.state, FirmwareState::Downloaded);
    }

    #[test]
    fn test_actions_reach_listeners() {
        let firmware = DeviceFirmware::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        firmware.subscribe_actions(move |action| sink.lock().unwrap().push(action));

        assert_eq!(firmware.fire(FirmwareAction::DownloadStart), 1);
        assert_eq!(*seen.lock().unwrap(), vec![FirmwareAction::DownloadStart]);
    }
}
