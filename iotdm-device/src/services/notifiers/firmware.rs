use async_trait::async_trait;
use iotdm_api::{DeviceTopic, FieldList};

use super::{Notifier, NotifyContext};
use crate::resources::{AckOutcome, FirmwareChange};

/// Reports download state and update status through the notify topic.
pub struct FirmwareNotifier;

#[async_trait]
impl Notifier for FirmwareNotifier {
    type Change = FirmwareChange;

    fn name(&self) -> &'static str {
        "mgmt.firmware"
    }

    async fn handle_event(&self, ctx: &NotifyContext, change: &FirmwareChange, wait: bool) -> AckOutcome {
        match change {
            FirmwareChange::StateChanged(fields) => match FieldList::firmware_state(*fields) {
                Ok(list) => ctx.send(DeviceTopic::Notify, Some(&list), wait).await,
                Err(e) => {
                    tracing::error!("Failed to encode firmware state: {}", e);
                    AckOutcome::PublishFailed
                }
            },
            // Descriptor rewrites come from the server and are not echoed.
            FirmwareChange::DescriptorUpdated(_) => AckOutcome::Accepted,
        }
    }
}
