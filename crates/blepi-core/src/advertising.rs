//! Advertising payloads and radio parameters

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PeripheralError, Result};
use crate::uuid::BleUuid;

/// iBeacon-style payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconPayload {
    pub uuid: BleUuid,
    pub major: u16,
    pub minor: u16,
    /// Calibrated RSSI at one meter, in dBm
    pub tx_power: i8,
}

/// What the peripheral is currently broadcasting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvertisingMode {
    /// Device name and service UUIDs
    Static { name: String, services: Vec<BleUuid> },
    Beacon(BeaconPayload),
    Off,
}

impl AdvertisingMode {
    pub fn is_static(&self) -> bool {
        matches!(self, AdvertisingMode::Static { .. })
    }

    pub fn is_beacon(&self) -> bool {
        matches!(self, AdvertisingMode::Beacon(_))
    }
}

impl fmt::Display for AdvertisingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvertisingMode::Static { name, services } => {
                write!(f, "static({:?}, {} services)", name, services.len())
            }
            AdvertisingMode::Beacon(beacon) => write!(
                f,
                "beacon({} major={} minor={} tx={})",
                beacon.uuid, beacon.major, beacon.minor, beacon.tx_power
            ),
            AdvertisingMode::Off => f.write_str("off"),
        }
    }
}

// ----------------------------------------------------------------------------
// Advertising Parameters
// ----------------------------------------------------------------------------

/// Smallest advertising interval the controller accepts (20 ms)
pub const MIN_ADVERTISING_INTERVAL: u16 = 0x0020;
/// Largest advertising interval the controller accepts (10.24 s)
pub const MAX_ADVERTISING_INTERVAL: u16 = 0x4000;
/// Channels 37, 38 and 39
pub const ALL_ADVERTISING_CHANNELS: u8 = 0x07;

/// LE advertising parameters, intervals in 0.625 ms units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisingParameters {
    pub interval_min: u16,
    pub interval_max: u16,
    pub channel_map: u8,
}

impl AdvertisingParameters {
    pub fn new(interval_min: u16, interval_max: u16, channel_map: u8) -> Self {
        Self {
            interval_min,
            interval_max,
            channel_map,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_map == 0 || self.channel_map & !ALL_ADVERTISING_CHANNELS != 0 {
            return Err(PeripheralError::invalid_config(format!(
                "advertising channel map 0x{:02x} must select channels 37-39 only",
                self.channel_map
            )));
        }
        if self.interval_min < MIN_ADVERTISING_INTERVAL
            || self.interval_max > MAX_ADVERTISING_INTERVAL
            || self.interval_min > self.interval_max
        {
            return Err(PeripheralError::invalid_config(format!(
                "advertising interval 0x{:04x}..0x{:04x} out of range",
                self.interval_min, self.interval_max
            )));
        }
        Ok(())
    }
}

impl Default for AdvertisingParameters {
    fn default() -> Self {
        Self::new(0x00F4, 0x00F4, ALL_ADVERTISING_CHANNELS)
    }
}
