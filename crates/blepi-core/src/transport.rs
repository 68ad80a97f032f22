//! Contract between the peripheral runtime and the radio transport
//!
//! The transport owns the HCI link to the controller. The runtime drives it
//! through [`Transport`] and consumes its [`TransportEvent`] feed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::advertising::{AdvertisingMode, AdvertisingParameters};
use crate::attribute::Service;
use crate::error::Result;
use crate::handler::{CentralId, ReadResult};
use crate::state::AdapterState;
use crate::status::AttStatus;
use crate::uuid::BleUuid;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Operations the runtime needs from the controller
#[async_trait]
pub trait Transport: Send + Sync {
    async fn set_advertising_parameters(&self, parameters: AdvertisingParameters) -> Result<()>;

    /// Begin broadcasting `mode`; never called with [`AdvertisingMode::Off`]
    async fn start_advertising(&self, mode: &AdvertisingMode) -> Result<()>;

    async fn stop_advertising(&self) -> Result<()>;

    /// Issue a raw HCI command and return the response parameters
    async fn send_raw_command(&self, opcode: u16, parameters: &[u8]) -> Result<Vec<u8>>;

    /// Whether the controller supports Low Energy
    async fn supports_le(&self) -> Result<bool>;

    /// Expose the attribute database to centrals
    async fn publish_services(&self, services: &[Arc<Service>]) -> Result<()>;

    async fn clear_services(&self) -> Result<()>;

    async fn send_notification(
        &self,
        central: &CentralId,
        characteristic: &BleUuid,
        payload: &[u8],
    ) -> Result<()>;

    /// Drop the link to a central
    async fn disconnect(&self, central: &CentralId) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Event Feed
// ----------------------------------------------------------------------------

/// Events delivered by the transport, in controller order
#[derive(Debug)]
pub enum TransportEvent {
    AdapterStateChanged(AdapterState),
    CentralConnected {
        central: CentralId,
    },
    CentralDisconnected {
        central: CentralId,
    },
    MtuChanged {
        central: CentralId,
        mtu: u16,
    },
    /// Notifications enabled through the CCCD
    Subscribe {
        central: CentralId,
        characteristic: BleUuid,
    },
    /// Notifications disabled through the CCCD
    Unsubscribe {
        central: CentralId,
        characteristic: BleUuid,
    },
    ReadRequest {
        central: CentralId,
        characteristic: BleUuid,
        responder: oneshot::Sender<ReadResult>,
    },
    /// Write request; write-without-response carries no responder
    WriteRequest {
        central: CentralId,
        characteristic: BleUuid,
        payload: Vec<u8>,
        responder: Option<oneshot::Sender<AttStatus>>,
    },
}

pub type EventSender = mpsc::Sender<TransportEvent>;
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

/// Create the bounded event feed between a transport and the runtime
pub fn create_event_channel(buffer: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(buffer)
}
