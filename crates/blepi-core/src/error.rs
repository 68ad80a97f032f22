//! Error types for the peripheral runtime

use thiserror::Error;

use crate::uuid::BleUuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised by the peripheral core and runtime
///
/// Per-request failures (reads and writes from a central) never surface as a
/// `PeripheralError`; they are converted to an [`AttStatus`](crate::AttStatus)
/// and returned to the peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeripheralError {
    #[error("Malformed UUID {input:?}: {reason}")]
    MalformedUuid { input: String, reason: String },

    #[error("Characteristic {characteristic} declares Notify but has no notify handler")]
    MissingNotifyHandler { characteristic: BleUuid },

    #[error("Characteristic {characteristic} is declared more than once")]
    DuplicateCharacteristic { characteristic: BleUuid },

    #[error("Service {service} is already registered")]
    ServiceAlreadyRegistered { service: BleUuid },

    #[error("Bluetooth adapter not available: {0}")]
    AdapterUnavailable(String),

    #[error("Bluetooth adapter does not support Low Energy")]
    AdapterUnsupported,

    #[error("Raw HCI command 0x{opcode:04x} failed: {reason}")]
    RawCommandFailed { opcode: u16, reason: String },

    #[error("Connection limit reached ({max} centrals)")]
    ConnectionLimitReached { max: usize },

    #[error("Notifications stopped for characteristic {characteristic}")]
    NotifierClosed { characteristic: BleUuid },

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl PeripheralError {
    /// Shorthand for a transport-level failure
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }

    /// Shorthand for a configuration failure
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// Result type used throughout the peripheral crates
pub type Result<T> = std::result::Result<T, PeripheralError>;
