use iotdm_api::{LogEntry, LogSeverity};

use super::{AckOutcome, Observer, ObserverId, Origin, Resource, ResourceCore};

#[derive(Debug, Clone, PartialEq)]
pub enum LogChange {
    Appended(LogEntry),
    Cleared,
}

/// Diagnostic log entries reported by the device.
pub struct DiagnosticLog {
    core: ResourceCore<Vec<LogEntry>, LogChange>,
}

impl DiagnosticLog {
    pub const NAME: &'static str = "log";

    pub fn new() -> Self {
        Self {
            core: ResourceCore::new(Self::NAME, Vec::new(), true),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.core.read(Clone::clone)
    }

    pub fn append(&self, entry: LogEntry) -> u64 {
        self.core
            .commit(Origin::Device, |entries| {
                entries.push(entry.clone());
                Some(LogChange::Appended(entry))
            })
            .unwrap_or_default()
    }

    pub fn append_message(&self, message: impl Into<String>, severity: LogSeverity) -> u64 {
        self.append(LogEntry::new(message, severity))
    }

    pub fn clear(&self) -> u64 {
        self.core
            .commit(Origin::Device, |entries| {
                entries.clear();
                Some(LogChange::Cleared)
            })
            .unwrap_or_default()
    }

    pub fn add_observer(&self, observer: Observer<LogChange>) -> ObserverId {
        self.core.add_observer(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.core.remove_observer(id)
    }

    pub async fn wait_acknowledged(&self, revision: u64) -> AckOutcome {
        self.core.wait_acknowledged(revision).await
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for DiagnosticLog {
    type Value = Vec<LogEntry>;
    type Change = LogChange;

    fn core(&self) -> &ResourceCore<Vec<LogEntry>, LogChange> {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_message() {
        let log = DiagnosticLog::new();
        log.append_message("disk almost full", LogSeverity::Warning);

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "disk almost full");
        assert_eq!(entries[0].severity, LogSeverity::Warning);
    }
}
