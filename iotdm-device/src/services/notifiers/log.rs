use async_trait::async_trait;
use iotdm_api::DeviceTopic;
use serde_json::Value;

use super::{Notifier, NotifyContext};
use crate::resources::{AckOutcome, LogChange};

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    type Change = LogChange;

    fn name(&self) -> &'static str {
        "log"
    }

    fn is_clear(&self, change: &LogChange) -> bool {
        matches!(change, LogChange::Cleared)
    }

    async fn handle_event(&self, ctx: &NotifyContext, change: &LogChange, wait: bool) -> AckOutcome {
        match change {
            LogChange::Appended(entry) => ctx.send(DeviceTopic::AddLog, Some(entry), wait).await,
            LogChange::Cleared => self.clear_event(ctx, change, wait).await,
        }
    }

    async fn clear_event(&self, ctx: &NotifyContext, _change: &LogChange, wait: bool) -> AckOutcome {
        ctx.send::<Value>(DeviceTopic::ClearLog, None, wait).await
    }
}
