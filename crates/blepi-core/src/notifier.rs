//! Per-subscription notification handle given to notify handlers

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{PeripheralError, Result};
use crate::handler::{CentralId, DEFAULT_ATT_MTU};
use crate::transport::Transport;
use crate::uuid::BleUuid;

/// ATT header bytes preceding a notification payload
const ATT_NOTIFY_OVERHEAD: usize = 3;

/// Write side of one notification channel
///
/// A notifier is bound to a single (central, characteristic) pair. Its
/// [`done`](Self::done) signal flips once the central disconnects,
/// unsubscribes, or the adapter powers off, and never flips back.
#[derive(Clone)]
pub struct Notifier {
    central: CentralId,
    characteristic: BleUuid,
    mtu: u16,
    token: CancellationToken,
    transport: Arc<dyn Transport>,
}

impl Notifier {
    /// Bind a notifier to a subscription
    ///
    /// The runtime constructs notifiers when it opens a channel; the token is
    /// owned by that channel.
    pub fn new(
        central: CentralId,
        characteristic: BleUuid,
        mtu: u16,
        token: CancellationToken,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            central,
            characteristic,
            mtu: if mtu < DEFAULT_ATT_MTU { DEFAULT_ATT_MTU } else { mtu },
            token,
            transport,
        }
    }

    pub fn central(&self) -> &CentralId {
        &self.central
    }

    pub fn characteristic(&self) -> BleUuid {
        self.characteristic
    }

    /// Returns true once the subscription has ended
    pub fn done(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Largest payload a single notification can carry
    pub fn cap(&self) -> usize {
        self.mtu as usize - ATT_NOTIFY_OVERHEAD
    }

    /// Send one notification, truncated to [`cap`](Self::cap) bytes
    ///
    /// Returns the number of bytes queued. Fails with `NotifierClosed` once
    /// the subscription has ended, without emitting anything.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        if self.done() {
            return Err(PeripheralError::NotifierClosed {
                characteristic: self.characteristic,
            });
        }

        let chunk = &data[..data.len().min(self.cap())];
        self.transport
            .send_notification(&self.central, &self.characteristic, chunk)
            .await?;
        trace!(
            "Notified {} on {} ({} bytes)",
            self.central,
            self.characteristic,
            chunk.len()
        );
        Ok(chunk.len())
    }

    /// Sleep for `period` or until the subscription ends
    ///
    /// Returns true when woken by the end of the subscription.
    pub async fn wait(&self, period: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(period) => self.done(),
        }
    }

    /// Resolve once the subscription has ended
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("central", &self.central)
            .field("characteristic", &self.characteristic)
            .field("mtu", &self.mtu)
            .field("done", &self.done())
            .finish()
    }
}
