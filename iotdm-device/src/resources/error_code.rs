use super::{AckOutcome, Observer, ObserverId, Origin, Resource, ResourceCore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCodeChange {
    Appended(i32),
    Cleared,
}

/// Diagnostic error codes reported by the device.
pub struct DiagnosticErrorCode {
    core: ResourceCore<Vec<i32>, ErrorCodeChange>,
}

impl DiagnosticErrorCode {
    pub const NAME: &'static str = "errorCodes";

    pub fn new() -> Self {
        Self {
            core: ResourceCore::new(Self::NAME, Vec::new(), true),
        }
    }

    pub fn codes(&self) -> Vec<i32> {
        self.core.read(Clone::clone)
    }

    pub fn append(&self, code: i32) -> u64 {
        self.core
            .commit(Origin::Device, |codes| {
                codes.push(code);
                Some(ErrorCodeChange::Appended(code))
            })
            .unwrap_or_default()
    }

    /// Clears the local list. Always announced, even when already empty.
    pub fn clear(&self) -> u64 {
        self.core
            .commit(Origin::Device, |codes| {
                codes.clear();
                Some(ErrorCodeChange::Cleared)
            })
            .unwrap_or_default()
    }

    pub fn add_observer(&self, observer: Observer<ErrorCodeChange>) -> ObserverId {
        self.core.add_observer(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.core.remove_observer(id)
    }

    pub async fn wait_acknowledged(&self, revision: u64) -> AckOutcome {
        self.core.wait_acknowledged(revision).await
    }
}

impl Default for DiagnosticErrorCode {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for DiagnosticErrorCode {
    type Value = Vec<i32>;
    type Change = ErrorCodeChange;

    fn core(&self) -> &ResourceCore<Vec<i32>, ErrorCodeChange> {
        &self.core
    }
}
