use iotdm_api::{InboundRequest, ResponseCode, ServerTopic};

use super::{DeviceCommand, HandlerContext, HandlerOutcome, RequestHandler};
use crate::resources::DeviceActionEvent;

pub struct RebootHandler;

impl RequestHandler for RebootHandler {
    fn topic(&self) -> ServerTopic {
        ServerTopic::InitiateReboot
    }

    fn name(&self) -> &'static str {
        "reboot"
    }

    fn is_wanted(&self, ctx: &HandlerContext<'_>) -> bool {
        ctx.supports.device_actions && ctx.device.action().is_some()
    }

    fn handle_request(&self, ctx: &HandlerContext<'_>, _request: &InboundRequest) -> HandlerOutcome {
        if !self.is_wanted(ctx) {
            return HandlerOutcome::respond(ResponseCode::NotImplemented);
        }

        HandlerOutcome::accept(DeviceCommand::Device(DeviceActionEvent::RebootStart))
    }
}
