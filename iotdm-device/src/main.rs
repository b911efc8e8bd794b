use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use iotdm_api::{FirmwareState, FirmwareUpdateStatus, Supports};
use iotdm_device::ManagedDevice;
use iotdm_device::configs::Settings;
use iotdm_device::resources::{
    DeviceAction, DeviceData, DeviceFirmware, DiagnosticErrorCode, DiagnosticLog, FirmwareAction,
};
use iotdm_device::services::MqttTransport;

const SIMULATED_DOWNLOAD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = settings.logger.level.as_str();

            format!("{app_name}={level},iotdm_agent={level}").into()
        }))
        .init();

    let identity = settings.device.identity();
    let host = settings.broker_host();
    let (transport, inbound, event_loop) = MqttTransport::connect(
        &identity,
        &host,
        &settings.broker,
        settings.device.auth_token.as_deref(),
    );

    let firmware = Arc::new(DeviceFirmware::default());
    watch_firmware(&firmware);

    let action = Arc::new(DeviceAction::new());
    action.subscribe(|event| tracing::info!(?event, "Device action requested"));

    let mut data = DeviceData::builder()
        .info(settings.agent.info.clone())
        .firmware(firmware)
        .action(action)
        .error_code(Arc::new(DiagnosticErrorCode::new()))
        .log(Arc::new(DiagnosticLog::new()));
    if let Some(metadata) = settings.agent.metadata.clone() {
        data = data.metadata(metadata);
    }

    let device = ManagedDevice::builder(identity, Arc::new(transport.clone()))
        .device(data.build())
        .config(settings.engine.to_config())
        .supports(Supports {
            device_actions: settings.agent.supports_device_actions,
            firmware_actions: settings.agent.supports_firmware_actions,
        })
        .build();

    let inbound_task = device.spawn_inbound(inbound);
    device.connect().await?;

    tracing::info!(host = %host, device = %device.identity(), "Connecting");
    device.manage(settings.agent.lifetime_secs).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    if let Err(e) = device.unmanage().await {
        tracing::warn!("Unmanage was not acknowledged: {}", e);
    }
    transport.disconnect().await?;

    inbound_task.abort();
    event_loop.abort();

    Ok(())
}

/// Drive the firmware state machine the way a real downloader would.
fn watch_firmware(firmware: &Arc<DeviceFirmware>) {
    let weak = Arc::downgrade(firmware);
    firmware.subscribe_actions(move |action| {
        let Some(resource) = weak.upgrade() else {
            return;
        };
        tracing::info!(?action, url = ?resource.url(), "Firmware action requested");

        tokio::spawn(async move {
            match action {
                FirmwareAction::DownloadStart => {
                    resource.set_state(FirmwareState::Downloading);
                    tokio::time::sleep(SIMULATED_DOWNLOAD).await;
                    resource.set_state(FirmwareState::Downloaded);
                }
                FirmwareAction::UpdateStart => {
                    resource.set_update_status(FirmwareUpdateStatus::InProgress);
                    tokio::time::sleep(SIMULATED_DOWNLOAD).await;
                    resource.set_update_status(FirmwareUpdateStatus::Success);
                    resource.set_state(FirmwareState::Idle);
                }
            }
        });
    });
}
