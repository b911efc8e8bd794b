use iotdm_api::{FirmwareState, InboundRequest, ResponseCode, ServerTopic};

use super::{DeviceCommand, HandlerContext, HandlerOutcome, RequestHandler};
use crate::resources::FirmwareAction;

pub struct FirmwareUpdateHandler;

impl RequestHandler for FirmwareUpdateHandler {
    fn topic(&self) -> ServerTopic {
        ServerTopic::InitiateFirmwareUpdate
    }

    fn name(&self) -> &'static str {
        "firmware-update"
    }

    fn is_wanted(&self, ctx: &HandlerContext<'_>) -> bool {
        ctx.supports.firmware_actions && ctx.device.firmware().is_some()
    }

    fn handle_request(&self, ctx: &HandlerContext<'_>, _request: &InboundRequest) -> HandlerOutcome {
        let Some(firmware) = ctx.device.firmware().filter(|_| ctx.supports.firmware_actions) else {
            return HandlerOutcome::respond(ResponseCode::NotImplemented);
        };

        // Only a fully downloaded image can be applied.
        let state = firmware.state();
        if state != FirmwareState::Downloaded {
            tracing::warn!(state = ?state, "Firmware update requested before download completed");
            return HandlerOutcome::respond(ResponseCode::BadRequest);
        }

        HandlerOutcome::accept(DeviceCommand::Firmware(FirmwareAction::UpdateStart))
    }
}
