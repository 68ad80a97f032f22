//! Peripheral configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::advertising::{AdvertisingParameters, BeaconPayload};
use crate::error::{PeripheralError, Result};
use crate::uuid::BleUuid;

/// Longest device name the GAP Device Name characteristic can hold
pub const MAX_DEVICE_NAME_LEN: usize = 248;

// ----------------------------------------------------------------------------
// Beacon Configuration
// ----------------------------------------------------------------------------

/// Payload broadcast during the beacon phase of alternating advertising
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub uuid: BleUuid,
    pub major: u16,
    pub minor: u16,
    pub tx_power: i8,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            uuid: BleUuid::from_u128(0x5AFFFFFF_FFFF_FFFF_FFFF_FFFFFFFFFFFF),
            major: 0,
            minor: 0,
            tx_power: -59,
        }
    }
}

impl BeaconConfig {
    pub fn payload(&self) -> BeaconPayload {
        BeaconPayload {
            uuid: self.uuid,
            major: self.major,
            minor: self.minor,
            tx_power: self.tx_power,
        }
    }
}

// ----------------------------------------------------------------------------
// Peripheral Configuration
// ----------------------------------------------------------------------------

/// Configuration for the peripheral runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralConfig {
    /// Maximum number of simultaneously connected centrals
    pub max_connections: usize,
    /// Beacon phase length; zero disables alternation
    pub beacon_duration: Duration,
    /// Static phase length between beacon phases
    pub beacon_interval: Duration,
    /// Advertised name and GAP Device Name value
    pub device_name: String,
    /// Bitmask of advertising channels 37/38/39
    pub advertising_channel_map: u8,
    /// Advertising interval (min, max) in 0.625 ms units
    pub advertising_interval: (u16, u16),
    /// HCI device to open; `None` picks the first available adapter
    ///
    /// Read by whoever constructs the transport. The runtime itself never
    /// touches it, since a [`crate::Transport`] is already bound to a device.
    pub hci_device_index: Option<u16>,
    /// Refuse to start unless the controller supports LE
    pub require_le_support: bool,
    pub beacon: BeaconConfig,
    /// How long teardown waits for notify handlers to return
    pub notify_join_timeout: Duration,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            max_connections: 1,
            beacon_duration: Duration::ZERO,
            beacon_interval: Duration::from_secs(5),
            device_name: "Gopher".to_string(),
            advertising_channel_map: 0x07,
            advertising_interval: (0x00F4, 0x00F4),
            hci_device_index: None,
            require_le_support: true,
            beacon: BeaconConfig::default(),
            notify_join_timeout: Duration::from_secs(1),
        }
    }
}

impl PeripheralConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_beacon_duration(mut self, duration: Duration) -> Self {
        self.beacon_duration = duration;
        self
    }

    pub fn with_beacon_interval(mut self, interval: Duration) -> Self {
        self.beacon_interval = interval;
        self
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_advertising_channel_map(mut self, map: u8) -> Self {
        self.advertising_channel_map = map;
        self
    }

    pub fn with_advertising_interval(mut self, min: u16, max: u16) -> Self {
        self.advertising_interval = (min, max);
        self
    }

    pub fn with_hci_device_index(mut self, index: Option<u16>) -> Self {
        self.hci_device_index = index;
        self
    }

    pub fn with_require_le_support(mut self, required: bool) -> Self {
        self.require_le_support = required;
        self
    }

    pub fn with_beacon(mut self, beacon: BeaconConfig) -> Self {
        self.beacon = beacon;
        self
    }

    pub fn with_notify_join_timeout(mut self, timeout: Duration) -> Self {
        self.notify_join_timeout = timeout;
        self
    }

    /// Whether advertising alternates between beacon and static payloads
    pub fn alternates(&self) -> bool {
        !self.beacon_duration.is_zero()
    }

    pub fn advertising_parameters(&self) -> AdvertisingParameters {
        let (min, max) = self.advertising_interval;
        AdvertisingParameters::new(min, max, self.advertising_channel_map)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(PeripheralError::invalid_config(
                "max_connections must be at least 1",
            ));
        }
        if self.alternates() && self.beacon_interval.is_zero() {
            return Err(PeripheralError::invalid_config(
                "beacon_interval must be non-zero when beacon_duration is set",
            ));
        }
        if self.device_name.is_empty() || self.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(PeripheralError::invalid_config(format!(
                "device name must be 1..={} bytes, got {}",
                MAX_DEVICE_NAME_LEN,
                self.device_name.len()
            )));
        }
        self.advertising_parameters().validate()
    }
}
