use async_trait::async_trait;
use iotdm_api::{DeviceTopic, ErrorCodeFields};
use serde_json::Value;

use super::{Notifier, NotifyContext};
use crate::resources::{AckOutcome, ErrorCodeChange};

pub struct ErrorCodeNotifier;

#[async_trait]
impl Notifier for ErrorCodeNotifier {
    type Change = ErrorCodeChange;

    fn name(&self) -> &'static str {
        "errorCodes"
    }

    fn is_clear(&self, change: &ErrorCodeChange) -> bool {
        matches!(change, ErrorCodeChange::Cleared)
    }

    async fn handle_event(&self, ctx: &NotifyContext, change: &ErrorCodeChange, wait: bool) -> AckOutcome {
        match change {
            ErrorCodeChange::Appended(code) => {
                let fields = ErrorCodeFields { error_code: *code };
                ctx.send(DeviceTopic::AddErrorCode, Some(&fields), wait).await
            }
            ErrorCodeChange::Cleared => self.clear_event(ctx, change, wait).await,
        }
    }

    async fn clear_event(&self, ctx: &NotifyContext, _change: &ErrorCodeChange, wait: bool) -> AckOutcome {
        ctx.send::<Value>(DeviceTopic::ClearErrorCodes, None, wait).await
    }
}
