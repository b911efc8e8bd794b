use iotdm_api::{
    FIRMWARE_FIELD, FieldList, FieldValue, FirmwareDescriptor, InboundRequest, LOCATION_FIELD,
    LocationData, ResponseCode, ServerTopic,
};

use super::{DeviceCommand, FieldUpdate, HandlerContext, HandlerOutcome, RequestHandler};

/// Server writes to device attributes.
pub struct DeviceUpdateHandler;

impl DeviceUpdateHandler {
    fn parse_field(ctx: &HandlerContext<'_>, field: &FieldValue) -> Result<FieldUpdate, ResponseCode> {
        match field.field.as_str() {
            FIRMWARE_FIELD => {
                ctx.device.firmware().ok_or(ResponseCode::NotFound)?;
                serde_json::from_value::<FirmwareDescriptor>(field.value.clone())
                    .map(FieldUpdate::Firmware)
                    .map_err(|_| ResponseCode::BadRequest)
            }
            LOCATION_FIELD => {
                ctx.device.location().ok_or(ResponseCode::NotFound)?;
                serde_json::from_value::<LocationData>(field.value.clone())
                    .map(FieldUpdate::Location)
                    .map_err(|_| ResponseCode::BadRequest)
            }
            _ => Err(ResponseCode::NotFound),
        }
    }
}

impl RequestHandler for DeviceUpdateHandler {
    fn topic(&self) -> ServerTopic {
        ServerTopic::DeviceUpdate
    }

    fn name(&self) -> &'static str {
        "device-update"
    }

    fn is_wanted(&self, ctx: &HandlerContext<'_>) -> bool {
        ctx.device.firmware().is_some() || ctx.device.location().is_some()
    }

    fn handle_request(&self, ctx: &HandlerContext<'_>, request: &InboundRequest) -> HandlerOutcome {
        let fields = request
            .data()
            .and_then(|d| serde_json::from_value::<FieldList>(d.clone().into()).ok())
            .map(|list| list.fields)
            .unwrap_or_default();

        if fields.is_empty() {
            return HandlerOutcome::respond(ResponseCode::BadRequest);
        }

        let mut updates = Vec::with_capacity(fields.len());
        for field in &fields {
            match Self::parse_field(ctx, field) {
                Ok(update) => updates.push(update),
                Err(code) => {
                    tracing::warn!(field = %field.field, rc = code.code(), "Rejected device update");
                    return HandlerOutcome::respond(code);
                }
            }
        }

        HandlerOutcome {
            code: ResponseCode::Changed,
            command: Some(DeviceCommand::ApplyUpdate(updates)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use iotdm_api::Supports;
    use serde_json::{Value, json};

    use super::*;
    use crate::resources::{DeviceData, DeviceFirmware, DeviceLocation};

    fn decide(data: &DeviceData, body: Value) -> HandlerOutcome {
        let ctx = HandlerContext {
            device: data,
            supports: Supports::default(),
        };
        let request = InboundRequest::parse(&serde_json::to_vec(&body).unwrap()).unwrap();
        DeviceUpdateHandler.handle_request(&ctx, &request)
    }

    fn device() -> DeviceData {
        DeviceData::builder()
            .firmware(Arc::new(DeviceFirmware::default()))
            .location(Arc::new(DeviceLocation::new(LocationData::new(0.0, 0.0))))
            .build()
    }

    #[test]
    fn test_applies_known_fields() {
        let outcome = decide(
            &device(),
            json!({"reqId": "u1", "d": {"fields": [
                {"field": "mgmt.firmware", "value": {"version": "1.1", "url": "https://fw.example/1.1.bin"}},
                {"field": "location", "value": {
                    "latitude": 52.37, "longitude": 4.89,
                    "measuredDateTime": "2024-05-01T12:00:00Z"
                }}
            ]}}),
        );

        assert_eq!(outcome.code, ResponseCode::Changed);
        let Some(DeviceCommand::ApplyUpdate(updates)) = outcome.command else {
            panic!("expected updates");
        };
        assert_eq!(updates.len(), 2);
        assert!(matches!(&updates[0], FieldUpdate::Firmware(fw) if fw.version.as_deref() == Some("1.1")));
    }

    #[test]
    fn test_unknown_field_is_not_found() {
        let outcome = decide(
            &device(),
            json!({"reqId": "u2", "d": {"fields": [{"field": "deviceInfo.model", "value": "X"}]}}),
        );
        assert_eq!(outcome, HandlerOutcome::respond(ResponseCode::NotFound));
    }

    #[test]
    fn test_absent_resource_is_not_found() {
        let outcome = decide(
            &DeviceData::default(),
            json!({"reqId": "u3", "d": {"fields": [{"field": "mgmt.firmware", "value": {}}]}}),
        );
        assert_eq!(outcome.code, ResponseCode::NotFound);
    }

    #[test]
    fn test_no_fields_is_bad_request() {
        assert_eq!(decide(&device(), json!({"reqId": "u4"})).code, ResponseCode::BadRequest);
        assert_eq!(
            decide(&device(), json!({"reqId": "u5", "d": {"fields": []}})).code,
            ResponseCode::BadRequest
        );
    }
}
