//! ATT status codes returned to centrals

use std::fmt;

/// Outcome of a routed read, write or subscription request
///
/// Discriminants are the ATT error codes carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttStatus {
    Success = 0x00,
    InvalidHandle = 0x01,
    ReadNotPermitted = 0x02,
    WriteNotPermitted = 0x03,
    RequestNotSupported = 0x06,
    /// ATT "Attribute Not Found"
    CharacteristicNotFound = 0x0A,
    UnlikelyError = 0x0E,
    InsufficientResources = 0x11,
}

impl AttStatus {
    /// Wire code
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == AttStatus::Success
    }
}

impl fmt::Display for AttStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttStatus::Success => "success",
            AttStatus::InvalidHandle => "invalid handle",
            AttStatus::ReadNotPermitted => "read not permitted",
            AttStatus::WriteNotPermitted => "write not permitted",
            AttStatus::RequestNotSupported => "request not supported",
            AttStatus::CharacteristicNotFound => "characteristic not found",
            AttStatus::UnlikelyError => "unlikely error",
            AttStatus::InsufficientResources => "insufficient resources",
        };
        write!(f, "{} (0x{:02x})", name, self.code())
    }
}
