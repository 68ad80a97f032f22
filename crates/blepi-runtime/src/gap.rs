//! GAP and GATT meta-services registered ahead of application services

use blepi_core::{BleUuid, Characteristic, Notifier, Request, Service};

pub const GAP_SERVICE: BleUuid = BleUuid::from_u16(0x1800);
pub const DEVICE_NAME: BleUuid = BleUuid::from_u16(0x2A00);
pub const APPEARANCE: BleUuid = BleUuid::from_u16(0x2A01);
pub const PERIPHERAL_PRIVACY_FLAG: BleUuid = BleUuid::from_u16(0x2A02);
pub const RECONNECTION_ADDRESS: BleUuid = BleUuid::from_u16(0x2A03);
pub const PREFERRED_CONNECTION_PARAMETERS: BleUuid = BleUuid::from_u16(0x2A04);

pub const GATT_SERVICE: BleUuid = BleUuid::from_u16(0x1801);
pub const SERVICE_CHANGED: BleUuid = BleUuid::from_u16(0x2A05);

/// Generic computer appearance
const APPEARANCE_VALUE: [u8; 2] = [0x00, 0x80];
/// 7.5 ms connection interval, no latency, 20 s supervision timeout
const PREFERRED_CONNECTION_PARAMETERS_VALUE: [u8; 8] = [0x06, 0x00, 0x06, 0x00, 0x00, 0x00, 0xd0, 0x07];

/// Generic Access service advertising `name`
pub fn gap_service(name: &str) -> Service {
    Service::builder(GAP_SERVICE)
        .characteristic(Characteristic::builder(DEVICE_NAME).value(name.as_bytes()).build())
        .characteristic(Characteristic::builder(APPEARANCE).value(APPEARANCE_VALUE).build())
        .characteristic(
            Characteristic::builder(PERIPHERAL_PRIVACY_FLAG)
                .value([0x00u8])
                .build(),
        )
        .characteristic(
            Characteristic::builder(RECONNECTION_ADDRESS)
                .value([0u8; 6])
                .build(),
        )
        .characteristic(
            Characteristic::builder(PREFERRED_CONNECTION_PARAMETERS)
                .value(PREFERRED_CONNECTION_PARAMETERS_VALUE)
                .build(),
        )
        .build()
}

/// Generic Attribute service
///
/// The attribute database never changes while powered on, so Service
/// Changed holds its subscription open without indicating anything.
pub fn gatt_service() -> Service {
    Service::builder(GATT_SERVICE)
        .characteristic(
            Characteristic::builder(SERVICE_CHANGED)
                .on_notify(|_req: Request, notifier: Notifier| async move {
                    notifier.cancelled().await
                })
                .build(),
        )
        .build()
}
