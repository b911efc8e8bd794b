use iotdm_api::LocationData;

use super::{AckOutcome, Observer, ObserverId, Origin, Resource, ResourceCore};

#[derive(Debug, Clone, PartialEq)]
pub enum LocationChange {
    Updated(LocationData),
}

/// Current device location.
pub struct DeviceLocation {
    core: ResourceCore<LocationData, LocationChange>,
}

impl DeviceLocation {
    pub const NAME: &'static str = "location";

    pub fn new(initial: LocationData) -> Self {
        Self {
            core: ResourceCore::new(Self::NAME, initial, true),
        }
    }

    pub fn get(&self) -> LocationData {
        self.core.read(Clone::clone)
    }

    /// Replace the location; the new value is reported to the server.
    pub fn update(&self, location: LocationData) -> u64 {
        self.replace(Origin::Device, location)
    }

    /// Apply a location written by the server.
    pub(crate) fn apply_server_update(&self, location: LocationData) -> u64 {
        self.replace(Origin::Server, location)
    }

    fn replace(&self, origin: Origin, location: LocationData) -> u64 {
        self.core
            .commit(origin, |current| {
                *current = location.clone();
                Some(LocationChange::Updated(location))
            })
            .unwrap_or_default()
    }

    pub fn add_observer(&self, observer: Observer<LocationChange>) -> ObserverId {
        self.core.add_observer(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.core.remove_observer(id)
    }

    pub async fn wait_acknowledged(&self, revision: u64) -> AckOutcome {
        self.core.wait_acknowledged(revision).await
    }
}

impl Resource for DeviceLocation {
    type Value = LocationData;
    type Change = LocationChange;

    fn core(&self) -> &ResourceCore<LocationData, LocationChange> {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_server_update_is_tagged() {
        let location = DeviceLocation::new(LocationData::new(0.0, 0.0));
        let origins = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&origins);
        location.add_observer(Box::new(move |event| sink.lock().unwrap().push(event.origin)));

        location.update(LocationData::new(1.0, 2.0));
        location.apply_server_update(LocationData::new(3.0, 4.0));

        assert_eq!(*origins.lock().unwrap(), vec![Origin::Device, Origin::Server]);
        assert_eq!(location.get().latitude, 3.0);
    }
}
