//! Demo application wiring
//!
//! Runs the PiSugar peripheral against the in-memory controller from
//! `blepi-harness`, powers the adapter on and keeps dispatching until Ctrl-C
//! or the configured run time elapses.

use std::sync::Arc;
use std::time::Duration;

use blepi_core::{create_event_channel, PeripheralConfig};
use blepi_harness::{EventInjector, MockTransport};
use tracing::{info, warn};

use crate::demo;
use crate::error::Result;
use crate::simulate::simulate_central;

/// Capacity of the controller event feed
const EVENT_BUFFER: usize = 64;

/// How the demo run should behave once the peripheral is up
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub simulate_central: bool,
    pub run_for: Option<Duration>,
}

/// Totals observed on the simulated controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub advertising_switches: usize,
    pub notifications: usize,
}

pub async fn run(config: PeripheralConfig, options: RunOptions) -> Result<RunSummary> {
    let transport = Arc::new(MockTransport::open(config.hci_device_index));
    let peripheral = demo::peripheral(config, transport.clone())?;
    let (sender, receiver) = create_event_channel(EVENT_BUFFER);
    let handle = peripheral.spawn(receiver);
    let injector = EventInjector::new(sender);

    injector.power_on().await?;
    if options.simulate_central {
        simulate_central(&injector, "simulated-central").await?;
    }

    match options.run_for {
        Some(duration) => tokio::time::sleep(duration).await,
        None => {
            info!("Peripheral running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    info!("Stopping peripheral");
    if let Err(e) = injector.power_off().await {
        warn!("Failed to power off: {}", e);
    }
    drop(injector);
    handle.await??;

    Ok(RunSummary {
        advertising_switches: transport.advertising_history().await.len(),
        notifications: transport.notifications().await.len(),
    })
}
