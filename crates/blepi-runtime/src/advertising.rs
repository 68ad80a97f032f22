//! Advertising scheduler
//!
//! Broadcasts the static name+services payload, or alternates between the
//! beacon and static payloads on a background task when a beacon duration is
//! configured.

use std::sync::Arc;
use std::time::Duration;

use blepi_core::{AdvertisingMode, BeaconPayload, BleUuid, PeripheralConfig, Result, Transport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Advertising Scheduler
// ----------------------------------------------------------------------------

pub struct AdvertisingScheduler {
    transport: Arc<dyn Transport>,
    mode: Arc<watch::Sender<AdvertisingMode>>,
    cycle: Option<(CancellationToken, JoinHandle<()>)>,
    /// A start was issued since the last stop, whether or not it succeeded
    session: bool,
}

impl AdvertisingScheduler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (mode, _) = watch::channel(AdvertisingMode::Off);
        Self {
            transport,
            mode: Arc::new(mode),
            cycle: None,
            session: false,
        }
    }

    /// The payload currently on air
    pub fn current_mode(&self) -> AdvertisingMode {
        self.mode.borrow().clone()
    }

    /// Follow mode switches as they happen
    pub fn watch(&self) -> watch::Receiver<AdvertisingMode> {
        self.mode.subscribe()
    }

    pub fn is_alternating(&self) -> bool {
        self.cycle.is_some()
    }

    /// Start advertising for a power-on session
    ///
    /// A zero beacon duration means static advertising for the whole session.
    pub async fn start(&mut self, config: &PeripheralConfig, services: Vec<BleUuid>) -> Result<()> {
        self.stop().await;
        self.session = true;

        let static_mode = AdvertisingMode::Static {
            name: config.device_name.clone(),
            services,
        };

        if !config.alternates() {
            self.transport.start_advertising(&static_mode).await?;
            info!("Advertising {}", static_mode);
            self.mode.send_replace(static_mode);
            return Ok(());
        }

        let token = CancellationToken::new();
        let cycle = AlternatingCycle {
            transport: Arc::clone(&self.transport),
            mode: Arc::clone(&self.mode),
            beacon: config.beacon.payload(),
            static_mode,
            beacon_duration: config.beacon_duration,
            beacon_interval: config.beacon_interval,
        };
        info!(
            "Alternating advertising: beacon {:?}, static {:?}",
            config.beacon_duration, config.beacon_interval
        );
        let handle = tokio::spawn(cycle.run(token.clone()));
        self.cycle = Some((token, handle));
        Ok(())
    }

    /// Cancel any alternation and take the radio off air
    pub async fn stop(&mut self) {
        if let Some((token, handle)) = self.cycle.take() {
            token.cancel();
            if let Err(e) = handle.await {
                warn!("Advertising cycle ended abnormally: {}", e);
            }
        }

        // A failed start may still have left the controller advertising.
        let on_air = *self.mode.borrow() != AdvertisingMode::Off;
        if self.session || on_air {
            self.session = false;
            if let Err(e) = self.transport.stop_advertising().await {
                warn!("Failed to stop advertising: {}", e);
            }
            self.mode.send_replace(AdvertisingMode::Off);
            info!("Advertising stopped");
        }
    }
}

// ----------------------------------------------------------------------------
// Alternation
// ----------------------------------------------------------------------------

struct AlternatingCycle {
    transport: Arc<dyn Transport>,
    mode: Arc<watch::Sender<AdvertisingMode>>,
    beacon: BeaconPayload,
    static_mode: AdvertisingMode,
    beacon_duration: Duration,
    beacon_interval: Duration,
}

impl AlternatingCycle {
    async fn run(self, token: CancellationToken) {
        let beacon_mode = AdvertisingMode::Beacon(self.beacon);
        loop {
            self.switch(&beacon_mode).await;
            if Self::hold(&token, self.beacon_duration).await {
                break;
            }
            self.switch(&self.static_mode).await;
            if Self::hold(&token, self.beacon_interval).await {
                break;
            }
        }
        debug!("Advertising cycle cancelled");
    }

    async fn switch(&self, mode: &AdvertisingMode) {
        match self.transport.start_advertising(mode).await {
            Ok(()) => {
                debug!("Advertising {}", mode);
                self.mode.send_replace(mode.clone());
            }
            Err(e) => warn!("Failed to advertise {}: {}", mode, e),
        }
    }

    /// Returns true when cancelled before `period` elapsed
    async fn hold(token: &CancellationToken, period: Duration) -> bool {
        tokio::select! {
            _ = token.cancelled() => true,
            _ = tokio::time::sleep(period) => false,
        }
    }
}
