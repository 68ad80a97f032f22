//! Bluetooth attribute identifiers
//!
//! A [`BleUuid`] is either the 16-bit short form assigned by the Bluetooth SIG
//! or a full 128-bit UUID. Equality is byte-wise: a 16-bit UUID never equals
//! its 128-bit expansion on the Bluetooth base UUID.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{PeripheralError, Result};

/// The Bluetooth Base UUID that 16-bit identifiers are expanded onto
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

// ----------------------------------------------------------------------------
// UUID Type
// ----------------------------------------------------------------------------

/// A 16-bit or 128-bit attribute UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BleUuid {
    Uuid16(u16),
    Uuid128(Uuid),
}

impl BleUuid {
    /// Create a 16-bit UUID
    pub const fn from_u16(value: u16) -> Self {
        Self::Uuid16(value)
    }

    /// Create a 128-bit UUID
    pub const fn from_u128(value: u128) -> Self {
        Self::Uuid128(Uuid::from_u128(value))
    }

    /// Parse the textual form, ignoring dashes
    ///
    /// Exactly 4 or 32 hex digits are accepted.
    pub fn parse(input: &str) -> Result<Self> {
        let digits: String = input.chars().filter(|c| *c != '-').collect();
        let bytes = hex::decode(&digits).map_err(|e| PeripheralError::MalformedUuid {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        match bytes.len() {
            2 => Ok(Self::Uuid16(u16::from_be_bytes([bytes[0], bytes[1]]))),
            16 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(&bytes);
                Ok(Self::Uuid128(Uuid::from_bytes(raw)))
            }
            n => Err(PeripheralError::MalformedUuid {
                input: input.to_string(),
                reason: format!("UUIDs must have length 2 or 16, got {}", n),
            }),
        }
    }

    /// Length of the identifier in bytes (2 or 16)
    pub fn len(&self) -> usize {
        match self {
            Self::Uuid16(_) => 2,
            Self::Uuid128(_) => 16,
        }
    }

    /// Always false; present for symmetry with `len`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true for the 16-bit short form
    pub fn is_short(&self) -> bool {
        matches!(self, Self::Uuid16(_))
    }

    /// Bytes in ATT (little-endian) order
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Uuid16(v) => v.to_le_bytes().to_vec(),
            Self::Uuid128(u) => {
                let mut bytes = u.as_bytes().to_vec();
                bytes.reverse();
                bytes
            }
        }
    }

    /// Expand to a full 128-bit UUID
    pub fn to_uuid(&self) -> Uuid {
        match self {
            Self::Uuid16(v) => Uuid::from_u128(((*v as u128) << 96) | BLUETOOTH_BASE_UUID),
            Self::Uuid128(u) => *u,
        }
    }
}

impl fmt::Display for BleUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid16(v) => write!(f, "{:04x}", v),
            Self::Uuid128(u) => write!(f, "{}", u.hyphenated()),
        }
    }
}

impl FromStr for BleUuid {
    type Err = PeripheralError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<u16> for BleUuid {
    fn from(value: u16) -> Self {
        Self::Uuid16(value)
    }
}

impl From<Uuid> for BleUuid {
    fn from(value: Uuid) -> Self {
        Self::Uuid128(value)
    }
}

impl Serialize for BleUuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BleUuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_uuid() {
        let uuid = BleUuid::parse("2A00").unwrap();
        assert_eq!(uuid, BleUuid::from_u16(0x2A00));
        assert_eq!(uuid.len(), 2);
        assert_eq!(uuid.to_string(), "2a00");
    }

    #[test]
    fn test_parse_long_uuid_without_dashes() {
        let uuid = BleUuid::parse("FD2B4448AA0F4A15A62FEB0BE77A0000").unwrap();
        assert_eq!(uuid, BleUuid::from_u128(0xFD2B4448_AA0F_4A15_A62F_EB0BE77A0000));
        assert_eq!(uuid.to_string(), "fd2b4448-aa0f-4a15-a62f-eb0be77a0000");
    }

    #[test]
    fn test_malformed_uuids() {
        for input in ["", "XYZ1", "FD2BCCCA", "123", "0000180d-0000-1000-8000-00805f9b34"] {
            let err = BleUuid::parse(input).unwrap_err();
            assert!(
                matches!(err, PeripheralError::MalformedUuid { .. }),
                "{input:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_short_and_expanded_forms_differ() {
        let short = BleUuid::from_u16(0x180D);
        let long = BleUuid::Uuid128(short.to_uuid());
        assert_ne!(short, long);
        assert_eq!(long.to_string(), "0000180d-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn test_le_bytes_order() {
        assert_eq!(BleUuid::from_u16(0x2A05).to_le_bytes(), vec![0x05, 0x2A]);
        let long = BleUuid::from_u128(0x00112233_4455_6677_8899_aabbccddeeff);
        let bytes = long.to_le_bytes();
        assert_eq!(bytes[0], 0xff);
        assert_eq!(bytes[15], 0x00);
    }
}
