//! Scripted adapter and central events

use blepi_core::{
    AdapterState, AttStatus, BleUuid, CentralId, EventSender, PeripheralError, ReadResult,
    Result, TransportEvent,
};
use tokio::sync::oneshot;
use tracing::debug;

/// Drives the peripheral's event feed the way a controller would
#[derive(Debug, Clone)]
pub struct EventInjector {
    events: EventSender,
}

impl EventInjector {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    async fn send(&self, event: TransportEvent) -> Result<()> {
        debug!("Injecting {:?}", event);
        self.events
            .send(event)
            .await
            .map_err(|_| PeripheralError::transport("event feed closed"))
    }

    pub async fn set_state(&self, state: AdapterState) -> Result<()> {
        self.send(TransportEvent::AdapterStateChanged(state)).await
    }

    pub async fn power_on(&self) -> Result<()> {
        self.set_state(AdapterState::PoweredOn).await
    }

    pub async fn power_off(&self) -> Result<()> {
        self.set_state(AdapterState::PoweredOff).await
    }

    pub async fn connect(&self, central: &str) -> Result<()> {
        self.send(TransportEvent::CentralConnected {
            central: CentralId::new(central),
        })
        .await
    }

    pub async fn disconnect(&self, central: &str) -> Result<()> {
        self.send(TransportEvent::CentralDisconnected {
            central: CentralId::new(central),
        })
        .await
    }

    pub async fn mtu(&self, central: &str, mtu: u16) -> Result<()> {
        self.send(TransportEvent::MtuChanged {
            central: CentralId::new(central),
            mtu,
        })
        .await
    }

    pub async fn subscribe(&self, central: &str, characteristic: BleUuid) -> Result<()> {
        self.send(TransportEvent::Subscribe {
            central: CentralId::new(central),
            characteristic,
        })
        .await
    }

    pub async fn unsubscribe(&self, central: &str, characteristic: BleUuid) -> Result<()> {
        self.send(TransportEvent::Unsubscribe {
            central: CentralId::new(central),
            characteristic,
        })
        .await
    }

    /// Issue a read and wait for the peripheral's answer
    pub async fn read(&self, central: &str, characteristic: BleUuid) -> Result<ReadResult> {
        let (responder, response) = oneshot::channel();
        self.send(TransportEvent::ReadRequest {
            central: CentralId::new(central),
            characteristic,
            responder,
        })
        .await?;
        response
            .await
            .map_err(|_| PeripheralError::transport("read request dropped"))
    }

    /// Issue a write request and wait for its status
    pub async fn write(
        &self,
        central: &str,
        characteristic: BleUuid,
        payload: &[u8],
    ) -> Result<AttStatus> {
        let (responder, response) = oneshot::channel();
        self.send(TransportEvent::WriteRequest {
            central: CentralId::new(central),
            characteristic,
            payload: payload.to_vec(),
            responder: Some(responder),
        })
        .await?;
        response
            .await
            .map_err(|_| PeripheralError::transport("write request dropped"))
    }

    /// Issue a write command, which carries no response
    pub async fn write_command(
        &self,
        central: &str,
        characteristic: BleUuid,
        payload: &[u8],
    ) -> Result<()> {
        self.send(TransportEvent::WriteRequest {
            central: CentralId::new(central),
            characteristic,
            payload: payload.to_vec(),
            responder: None,
        })
        .await
    }
}
