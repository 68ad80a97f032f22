//! Raw HCI queries

use std::fmt;

use blepi_core::{PeripheralError, Result, Transport};

/// HCI Read BD_ADDR (OGF 0x04, OCF 0x0009)
pub const READ_BD_ADDR_OPCODE: u16 = 0x1009;

/// A controller's public device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    /// Build from the little-endian byte order used on the HCI wire
    pub fn from_le_bytes(bytes: [u8; 6]) -> Self {
        let mut octets = bytes;
        octets.reverse();
        Self(octets)
    }

    /// Octets in display order, most significant first
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// Query the controller's address
///
/// The response is a status byte followed by six address bytes.
pub async fn read_bd_addr(transport: &dyn Transport) -> Result<BdAddr> {
    let failed = |reason: String| PeripheralError::RawCommandFailed {
        opcode: READ_BD_ADDR_OPCODE,
        reason,
    };

    let response = transport
        .send_raw_command(READ_BD_ADDR_OPCODE, &[])
        .await
        .map_err(|e| failed(e.to_string()))?;

    match response.as_slice() {
        [0x00, a, b, c, d, e, g, ..] => Ok(BdAddr::from_le_bytes([*a, *b, *c, *d, *e, *g])),
        [status, _, _, _, _, _, _, ..] => Err(failed(format!("status 0x{:02x}", status))),
        short => Err(failed(format!("short response ({} bytes)", short.len()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blepi_harness::{MockTransport, MockTransportConfig};

    #[tokio::test]
    async fn test_read_bd_addr() {
        let transport = MockTransport::default();
        let addr = read_bd_addr(&transport).await.unwrap();
        assert_eq!(addr.to_string(), "66:55:44:33:22:11");
    }

    #[tokio::test]
    async fn test_read_bd_addr_failures() {
        for response in [
            None,
            Some(vec![0x0C, 1, 2, 3, 4, 5, 6]),
            Some(vec![0x00, 1, 2]),
        ] {
            let transport =
                MockTransport::new(MockTransportConfig::default().with_bd_addr_response(response));
            let err = read_bd_addr(&transport).await.unwrap_err();
            assert!(matches!(
                err,
                PeripheralError::RawCommandFailed {
                    opcode: READ_BD_ADDR_OPCODE,
                    ..
                }
            ));
        }
    }
}
