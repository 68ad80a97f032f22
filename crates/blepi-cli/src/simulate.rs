//! Scripted central for exercising the demo peripheral without a radio

use blepi_harness::EventInjector;
use tracing::{info, warn};

use crate::demo::{INPUT, NOTIFYING, SERVICE_NAME};
use crate::error::Result;

/// MTU the scripted central negotiates after connecting
pub const SIMULATED_MTU: u16 = 185;

/// Connect `central`, subscribe to every notifying characteristic, then
/// read the service name and write to the input characteristic
pub async fn simulate_central(injector: &EventInjector, central: &str) -> Result<()> {
    info!("Simulating central {}", central);
    injector.connect(central).await?;
    injector.mtu(central, SIMULATED_MTU).await?;

    for characteristic in NOTIFYING {
        injector.subscribe(central, characteristic).await?;
    }

    match injector.read(central, SERVICE_NAME).await? {
        Ok(value) => info!("Read service name: {}", String::from_utf8_lossy(&value)),
        Err(status) => warn!("Service name read failed: {}", status),
    }

    let status = injector
        .write(central, INPUT, b"hello from the simulated central")
        .await?;
    info!("Write to input: {}", status);
    Ok(())
}
