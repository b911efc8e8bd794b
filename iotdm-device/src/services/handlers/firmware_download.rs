use iotdm_api::{FirmwareState, InboundRequest, ResponseCode, ServerTopic};

use super::{DeviceCommand, HandlerContext, HandlerOutcome, RequestHandler};
use crate::resources::FirmwareAction;

pub struct FirmwareDownloadHandler;

impl RequestHandler for FirmwareDownloadHandler {
    fn topic(&self) -> ServerTopic {
        ServerTopic::InitiateFirmwareDownload
    }

    fn name(&self) -> &'static str {
        "firmware-download"
    }

    fn is_wanted(&self, ctx: &HandlerContext<'_>) -> bool {
        ctx.supports.firmware_actions && ctx.device.firmware().is_some()
    }

    fn handle_request(&self, ctx: &HandlerContext<'_>, _request: &InboundRequest) -> HandlerOutcome {
        let Some(firmware) = ctx.device.firmware().filter(|_| ctx.supports.firmware_actions) else {
            return HandlerOutcome::respond(ResponseCode::NotImplemented);
        };

        let descriptor = firmware.descriptor();
        if descriptor.state != FirmwareState::Idle {
            tracing::warn!(state = ?descriptor.state, "Firmware download requested while not idle");
            return HandlerOutcome::respond(ResponseCode::BadRequest);
        }

        if descriptor.url.as_deref().map_or(true, str::is_empty) {
            tracing::warn!("Firmware download requested without a url");
            return HandlerOutcome::respond(ResponseCode::BadRequest);
        }

        HandlerOutcome::accept(DeviceCommand::Firmware(FirmwareAction::DownloadStart))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use iotdm_api::{FirmwareDescriptor, Supports};
    use serde_json::json;

    use super::*;
    use crate::resources::{DeviceData, DeviceFirmware};

    fn request() -> InboundRequest {
        InboundRequest::parse(&serde_json::to_vec(&json!({"reqId": "dl-1"})).unwrap()).unwrap()
    }

    fn decide(data: &DeviceData, firmware_actions: bool) -> HandlerOutcome {
        let ctx = HandlerContext {
            device: data,
            supports: Supports {
                device_actions: false,
                firmware_actions,
            },
        };
        FirmwareDownloadHandler.handle_request(&ctx, &request())
    }

    fn with_firmware(descriptor: FirmwareDescriptor) -> DeviceData {
        DeviceData::builder()
            .firmware(Arc::new(DeviceFirmware::new(descriptor)))
            .build()
    }

    #[test]
    fn test_without_firmware_is_not_implemented() {
        let outcome = decide(&DeviceData::default(), true);
        assert_eq!(outcome, HandlerOutcome::respond(ResponseCode::NotImplemented));
    }

    #[test]
    fn test_unsupported_is_not_implemented() {
        let data = with_firmware(FirmwareDescriptor {
            url: Some("https://fw.example/1.bin".into()),
            ..Default::default()
        });
        assert_eq!(decide(&data, false).code, ResponseCode::NotImplemented);
    }

    #[test]
    fn test_busy_firmware_is_bad_request() {
        for state in [FirmwareState::Downloading, FirmwareState::Downloaded] {
            let data = with_firmware(FirmwareDescriptor {
                url: Some("https://fw.example/1.bin".into()),
                state,
                ..Default::default()
            });
            assert_eq!(decide(&data, true), HandlerOutcome::respond(ResponseCode::BadRequest));
        }
    }

    #[test]
    fn test_missing_url_is_bad_request() {
        let data = with_firmware(FirmwareDescriptor::default());
        assert_eq!(decide(&data, true).code, ResponseCode::BadRequest);
    }

    #[test]
    fn test_idle_with_url_is_accepted() {
        let data = with_firmware(FirmwareDescriptor {
            url: Some("https://fw.example/1.bin".into()),
            ..Default::default()
        });
        assert_eq!(
            decide(&data, true),
            HandlerOutcome::accept(DeviceCommand::Firmware(FirmwareAction::DownloadStart))
        );
    }
}
