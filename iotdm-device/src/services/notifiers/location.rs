use async_trait::async_trait;
use iotdm_api::DeviceTopic;

use super::{Notifier, NotifyContext};
use crate::resources::{AckOutcome, LocationChange};

pub struct LocationNotifier;

#[async_trait]
impl Notifier for LocationNotifier {
    type Change = LocationChange;

    fn name(&self) -> &'static str {
        "location"
    }

    async fn handle_event(&self, ctx: &NotifyContext, change: &LocationChange, wait: bool) -> AckOutcome {
        let LocationChange::Updated(location) = change;
        ctx.send(DeviceTopic::UpdateLocation, Some(location), wait).await
    }
}
