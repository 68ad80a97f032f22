//! PiSugar Wi-Fi configuration service
//!
//! The service a PiSugar board exposes for phone-side Wi-Fi setup. Values
//! are placeholders: the board's real readings are not available to the
//! simulated controller.

use std::sync::Arc;
use std::time::Duration;

use blepi_core::{
    AttStatus, BleUuid, Characteristic, Descriptor, Notifier, PeripheralConfig, Request, Result,
    Service, Transport,
};
use blepi_runtime::Peripheral;
use tracing::{debug, info, warn};

pub const SERVICE: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0000);
pub const SERVICE_NAME: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0001);
pub const DEVICE_MODEL: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0002);
pub const WIFI_NAME: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0003);
pub const IP_ADDRESS: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0004);
pub const INPUT: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0005);
pub const NOTIFY_MESSAGE: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0006);
pub const INPUT_SEP: BleUuid = BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0007);
pub const CUSTOM_COMMAND_INPUT: BleUuid =
    BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0008);
pub const CUSTOM_COMMAND_NOTIFY: BleUuid =
    BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0009);
pub const CUSTOM_INFO_COUNT: BleUuid = BleUuid::from_u128(0x0000_0000_0000_0000_0000_FD2BCCAA0000);
pub const CUSTOM_COMMAND_COUNT: BleUuid =
    BleUuid::from_u128(0x0000_0000_0000_0000_0000_FD2BCCAC0000);

/// Characteristics that stream notifications
pub const NOTIFYING: [BleUuid; 4] = [WIFI_NAME, IP_ADDRESS, CUSTOM_COMMAND_NOTIFY, NOTIFY_MESSAGE];

// ----------------------------------------------------------------------------
// Service Tree
// ----------------------------------------------------------------------------

pub fn pisugar_service() -> Service {
    Service::builder(SERVICE)
        .characteristic(
            Characteristic::builder(SERVICE_NAME)
                .on_read(|_req: &Request| Ok(b"PiSugar BLE Wifi Config".to_vec()))
                .descriptor(Descriptor::with_str(
                    BleUuid::from_u16(2001),
                    "PiSugar BLE Wifi Config",
                ))
                .build(),
        )
        .characteristic(
            Characteristic::builder(DEVICE_MODEL)
                .on_read(|_req: &Request| Ok(b"Fake PI VER 1.1".to_vec()))
                .descriptor(Descriptor::with_str(
                    BleUuid::from_u16(2002),
                    "Raspberry Hardware Model",
                ))
                .build(),
        )
        .characteristic(periodic(WIFI_NAME, Duration::from_secs(5), || {
            b"Fake Wifi Name".to_vec()
        }))
        .characteristic(periodic(IP_ADDRESS, Duration::from_secs(5), || {
            b"1.1.1.1".to_vec()
        }))
        .characteristic(logged_input(INPUT, "input"))
        .characteristic(logged_input(INPUT_SEP, "input sep"))
        .characteristic(logged_input(CUSTOM_COMMAND_INPUT, "custom command input"))
        .characteristic(periodic(
            CUSTOM_COMMAND_NOTIFY,
            Duration::from_secs(10),
            timestamp,
        ))
        .characteristic(periodic(NOTIFY_MESSAGE, Duration::from_secs(20), timestamp))
        .characteristic(counter(CUSTOM_INFO_COUNT, "Custom Info Count"))
        .characteristic(counter(CUSTOM_COMMAND_COUNT, "Custom Command Count"))
        .build()
}

/// Notify `payload()` every `period` until the central goes away
fn periodic(uuid: BleUuid, period: Duration, payload: fn() -> Vec<u8>) -> Characteristic {
    Characteristic::builder(uuid)
        .on_notify(move |_req, notifier: Notifier| async move {
            while !notifier.done() {
                if let Err(e) = notifier.write(&payload()).await {
                    debug!("Notification on {} failed: {}", uuid, e);
                }
                notifier.wait(period).await;
            }
        })
        .build()
}

fn logged_input(uuid: BleUuid, label: &'static str) -> Characteristic {
    Characteristic::builder(uuid)
        .on_write(move |req: &Request, data: &[u8]| {
            info!("{} from {}: {}", label, req.central, String::from_utf8_lossy(data));
            AttStatus::Success
        })
        .build()
}

fn counter(uuid: BleUuid, label: &str) -> Characteristic {
    Characteristic::builder(uuid)
        .on_read(|_req: &Request| Ok(b"0".to_vec()))
        .descriptor(Descriptor::with_str(uuid, label))
        .build()
}

fn timestamp() -> Vec<u8> {
    chrono::Local::now().to_rfc3339().into_bytes()
}

// ----------------------------------------------------------------------------
// Peripheral
// ----------------------------------------------------------------------------

/// Build the demo peripheral with logging lifecycle callbacks
pub fn peripheral(config: PeripheralConfig, transport: Arc<dyn Transport>) -> Result<Peripheral> {
    Peripheral::builder(config)
        .service(pisugar_service())
        .on_state_change(|state| info!("State: {}", state))
        .on_central_connected(|central| info!("Connect: {}", central))
        .on_central_disconnected(|central| info!("Disconnect: {}", central))
        .on_setup_failed(|e| warn!("Running degraded: {}", e))
        .build(transport)
}
