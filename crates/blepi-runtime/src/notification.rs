//! Notification channels
//!
//! One channel per (central, characteristic) subscription. The channel owns
//! the task running the characteristic's notify handler and the cancellation
//! token behind that handler's [`Notifier`].

use std::sync::Arc;
use std::time::Duration;

use blepi_core::{BleUuid, CentralId, Notifier, NotifyHandler, Request, Transport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A running notify handler for one subscription
#[derive(Debug)]
pub struct NotificationChannel {
    central: CentralId,
    characteristic: BleUuid,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl NotificationChannel {
    /// Start the handler on its own task
    pub fn spawn(
        handler: Arc<dyn NotifyHandler>,
        request: Request,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let token = CancellationToken::new();
        let notifier = Notifier::new(
            request.central.clone(),
            request.characteristic,
            request.mtu,
            token.clone(),
            transport,
        );
        let central = request.central.clone();
        let characteristic = request.characteristic;

        let handle = tokio::spawn(async move {
            handler.notify(request, notifier).await;
        });
        debug!("Opened notification channel {} / {}", central, characteristic);

        Self {
            central,
            characteristic,
            token,
            handle,
        }
    }

    pub fn central(&self) -> &CentralId {
        &self.central
    }

    pub fn characteristic(&self) -> BleUuid {
        self.characteristic
    }

    /// Flip the handler's done signal
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the handler has returned
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the handler to return
    ///
    /// Returns false if it is still running after `timeout`; the task is then
    /// left detached and logged as leaked.
    pub async fn join(self, timeout: Duration) -> bool {
        let Self {
            central,
            characteristic,
            handle,
            ..
        } = self;

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) if e.is_panic() => {
                warn!(
                    "Notify handler for {} on {} panicked",
                    characteristic, central
                );
                true
            }
            Ok(Err(_)) => true,
            Err(_) => {
                warn!(
                    "Notify handler for {} on {} ignored cancellation for {:?}; leaking its task",
                    characteristic, central, timeout
                );
                false
            }
        }
    }
}

/// Join a batch of cancelled channels concurrently
///
/// Returns the number that failed to exit in time.
pub async fn join_all(channels: Vec<NotificationChannel>, timeout: Duration) -> usize {
    let results =
        futures::future::join_all(channels.into_iter().map(|channel| channel.join(timeout))).await;
    results.into_iter().filter(|exited| !exited).count()
}
