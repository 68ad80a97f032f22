//! Mock Transport for Testing
//!
//! Records every call made through the [`Transport`] contract without touching
//! a controller. Raw command responses and LE support are configurable so
//! setup failure paths can be exercised.

use std::sync::Arc;

use async_trait::async_trait;
use blepi_core::{
    AdvertisingMode, AdvertisingParameters, BleUuid, CentralId, PeripheralError, Result, Service,
    Transport,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Mock Transport Configuration
// ----------------------------------------------------------------------------

/// Configuration for mock transport behavior
#[derive(Debug, Clone)]
pub struct MockTransportConfig {
    /// Answer to the LE support query
    pub supports_le: bool,
    /// Response to Read BD_ADDR; `None` makes the raw command fail
    pub bd_addr_response: Option<Vec<u8>>,
    /// Fail every notification send
    pub fail_notifications: bool,
    /// Fail every `start_advertising` call
    pub fail_advertising: bool,
    /// Controller index the transport was opened on
    pub hci_device_index: Option<u16>,
}

impl Default for MockTransportConfig {
    fn default() -> Self {
        Self {
            supports_le: true,
            // status 0, address 66:55:44:33:22:11 in controller order
            bd_addr_response: Some(vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            fail_notifications: false,
            fail_advertising: false,
            hci_device_index: None,
        }
    }
}

impl MockTransportConfig {
    pub fn with_supports_le(mut self, supported: bool) -> Self {
        self.supports_le = supported;
        self
    }

    pub fn with_bd_addr_response(mut self, response: Option<Vec<u8>>) -> Self {
        self.bd_addr_response = response;
        self
    }

    pub fn with_fail_notifications(mut self, fail: bool) -> Self {
        self.fail_notifications = fail;
        self
    }

    pub fn with_fail_advertising(mut self, fail: bool) -> Self {
        self.fail_advertising = fail;
        self
    }

    pub fn with_hci_device_index(mut self, index: Option<u16>) -> Self {
        self.hci_device_index = index;
        self
    }
}

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// One call made by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    SetAdvertisingParameters(AdvertisingParameters),
    StartAdvertising(AdvertisingMode),
    StopAdvertising,
    RawCommand { opcode: u16, parameters: Vec<u8> },
    SupportsLe,
    PublishServices(Vec<BleUuid>),
    ClearServices,
    Notification(RecordedNotification),
    Disconnect(CentralId),
}

/// A notification as it would have gone over the air
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNotification {
    pub central: CentralId,
    pub characteristic: BleUuid,
    pub payload: Vec<u8>,
}

// ----------------------------------------------------------------------------
// Mock Transport Implementation
// ----------------------------------------------------------------------------

/// Mock transport for deterministic testing
///
/// Clones share the same call log.
#[derive(Debug, Clone)]
pub struct MockTransport {
    config: MockTransportConfig,
    calls: Arc<Mutex<Vec<(Instant, TransportCall)>>>,
}

impl MockTransport {
    pub fn new(config: MockTransportConfig) -> Self {
        Self {
            config,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Simulated controller opened on the configured HCI device
    pub fn open(hci_device_index: Option<u16>) -> Self {
        match hci_device_index {
            Some(index) => info!("Mock transport: opened hci{}", index),
            None => info!("Mock transport: opened first available controller"),
        }
        Self::new(MockTransportConfig::default().with_hci_device_index(hci_device_index))
    }

    pub fn config(&self) -> &MockTransportConfig {
        &self.config
    }

    async fn record(&self, call: TransportCall) {
        self.calls.lock().await.push((Instant::now(), call));
    }

    /// Every call so far, with the time it was made
    pub async fn calls(&self) -> Vec<(Instant, TransportCall)> {
        self.calls.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }

    /// Modes passed to `start_advertising`, in order
    pub async fn advertising_history(&self) -> Vec<(Instant, AdvertisingMode)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|(at, call)| match call {
                TransportCall::StartAdvertising(mode) => Some((*at, mode.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn notifications(&self) -> Vec<(Instant, RecordedNotification)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|(at, call)| match call {
                TransportCall::Notification(n) => Some((*at, n.clone())),
                _ => None,
            })
            .collect()
    }

    /// Payloads sent on one characteristic, in order
    pub async fn payloads_for(&self, characteristic: BleUuid) -> Vec<Vec<u8>> {
        self.notifications()
            .await
            .into_iter()
            .filter(|(_, n)| n.characteristic == characteristic)
            .map(|(_, n)| n.payload)
            .collect()
    }

    /// Service lists passed to `publish_services`
    pub async fn published(&self) -> Vec<Vec<BleUuid>> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|(_, call)| match call {
                TransportCall::PublishServices(services) => Some(services.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn disconnects(&self) -> Vec<CentralId> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|(_, call)| match call {
                TransportCall::Disconnect(central) => Some(central.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(_, call)| predicate(call))
            .count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(MockTransportConfig::default())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn set_advertising_parameters(&self, parameters: AdvertisingParameters) -> Result<()> {
        debug!("Mock transport: advertising parameters {:?}", parameters);
        self.record(TransportCall::SetAdvertisingParameters(parameters))
            .await;
        Ok(())
    }

    async fn start_advertising(&self, mode: &AdvertisingMode) -> Result<()> {
        info!("Mock transport: advertising {}", mode);
        self.record(TransportCall::StartAdvertising(mode.clone()))
            .await;
        if self.config.fail_advertising {
            return Err(PeripheralError::transport("mock advertising failure"));
        }
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<()> {
        debug!("Mock transport: advertising stopped");
        self.record(TransportCall::StopAdvertising).await;
        Ok(())
    }

    async fn send_raw_command(&self, opcode: u16, parameters: &[u8]) -> Result<Vec<u8>> {
        self.record(TransportCall::RawCommand {
            opcode,
            parameters: parameters.to_vec(),
        })
        .await;

        match &self.config.bd_addr_response {
            Some(response) if opcode == 0x1009 => Ok(response.clone()),
            _ => Err(PeripheralError::transport(format!(
                "mock controller rejected opcode 0x{:04x}",
                opcode
            ))),
        }
    }

    async fn supports_le(&self) -> Result<bool> {
        self.record(TransportCall::SupportsLe).await;
        Ok(self.config.supports_le)
    }

    async fn publish_services(&self, services: &[Arc<Service>]) -> Result<()> {
        let uuids: Vec<BleUuid> = services.iter().map(|s| s.uuid()).collect();
        info!("Mock transport: published {} services", uuids.len());
        self.record(TransportCall::PublishServices(uuids)).await;
        Ok(())
    }

    async fn clear_services(&self) -> Result<()> {
        self.record(TransportCall::ClearServices).await;
        Ok(())
    }

    async fn send_notification(
        &self,
        central: &CentralId,
        characteristic: &BleUuid,
        payload: &[u8],
    ) -> Result<()> {
        if self.config.fail_notifications {
            return Err(PeripheralError::transport("mock notification failure"));
        }
        debug!(
            "Mock transport: notify {} on {}: {:?}",
            central,
            characteristic,
            String::from_utf8_lossy(payload)
        );
        self.record(TransportCall::Notification(RecordedNotification {
            central: central.clone(),
            characteristic: *characteristic,
            payload: payload.to_vec(),
        }))
        .await;
        Ok(())
    }

    async fn disconnect(&self, central: &CentralId) -> Result<()> {
        info!("Mock transport: disconnecting {}", central);
        self.record(TransportCall::Disconnect(central.clone())).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bd_addr_response_is_configurable() {
        let transport = MockTransport::default();
        let response = transport.send_raw_command(0x1009, &[]).await.unwrap();
        assert_eq!(response.len(), 7);

        let failing = MockTransport::new(MockTransportConfig::default().with_bd_addr_response(None));
        assert!(failing.send_raw_command(0x1009, &[]).await.is_err());
        assert_eq!(
            failing
                .count(|c| matches!(c, TransportCall::RawCommand { .. }))
                .await,
            1
        );
    }

    #[test]
    fn test_open_records_device_index() {
        assert_eq!(MockTransport::open(Some(1)).config().hci_device_index, Some(1));
        assert_eq!(MockTransport::open(None).config().hci_device_index, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_timestamped() {
        let transport = MockTransport::default();
        let start = Instant::now();
        transport.stop_advertising().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        transport.stop_advertising().await.unwrap();

        let calls = transport.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0 - start, std::time::Duration::from_secs(3));
    }
}
