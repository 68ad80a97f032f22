//! Peripheral event dispatch
//!
//! [`Peripheral`] consumes the transport's event feed on a single task. Power
//! edges drive setup and teardown; connection and request events go to the
//! connection registry. Nothing in request handling can stop the loop.

use std::sync::Arc;

use blepi_core::{
    AdapterState, AdapterStateReader, AdvertisingMode, BleUuid, CentralId,
    EventReceiver, PeripheralConfig, PeripheralError, Result, Service, Transport, TransportEvent,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterStateMachine, Transition};
use crate::advertising::AdvertisingScheduler;
use crate::gap::{gap_service, gatt_service};
use crate::hci::{read_bd_addr, BdAddr};
use crate::notification::{join_all, NotificationChannel};
use crate::registry::{Central, ConnectionRegistry};

pub type StateCallback = Arc<dyn Fn(AdapterState) + Send + Sync>;
pub type CentralCallback = Arc<dyn Fn(&CentralId) + Send + Sync>;
pub type SetupFailedCallback = Arc<dyn Fn(&PeripheralError) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    state_changed: Option<StateCallback>,
    central_connected: Option<CentralCallback>,
    central_disconnected: Option<CentralCallback>,
    setup_failed: Option<SetupFailedCallback>,
}

// ----------------------------------------------------------------------------
// Peripheral Builder
// ----------------------------------------------------------------------------

/// Builder for [`Peripheral`]
pub struct PeripheralBuilder {
    config: PeripheralConfig,
    services: Vec<Service>,
    callbacks: Callbacks,
}

impl PeripheralBuilder {
    pub fn new(config: PeripheralConfig) -> Self {
        Self {
            config,
            services: Vec::new(),
            callbacks: Callbacks::default(),
        }
    }

    /// Add an application service, registered on every power-on
    pub fn service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// Called with every adapter state the transport reports
    ///
    /// Also called with `Unsupported` (no LE support) or `Unknown` (LE query
    /// failed) when power-on setup finds the adapter unusable.
    pub fn on_state_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(AdapterState) + Send + Sync + 'static,
    {
        self.callbacks.state_changed = Some(Arc::new(callback));
        self
    }

    pub fn on_central_connected<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CentralId) + Send + Sync + 'static,
    {
        self.callbacks.central_connected = Some(Arc::new(callback));
        self
    }

    pub fn on_central_disconnected<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CentralId) + Send + Sync + 'static,
    {
        self.callbacks.central_disconnected = Some(Arc::new(callback));
        self
    }

    /// Called with the error whenever power-on setup fails
    pub fn on_setup_failed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PeripheralError) + Send + Sync + 'static,
    {
        self.callbacks.setup_failed = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration and service tree and bind to a transport
    ///
    /// Services are frozen here: the peripheral keeps them behind `Arc` and
    /// re-registers the same tree on every power-on. The tree is registered
    /// once into a scratch database alongside the meta-services, so anything
    /// setup would reject is rejected here instead.
    pub fn build(self, transport: Arc<dyn Transport>) -> Result<Peripheral> {
        self.config.validate()?;

        let services: Vec<Arc<Service>> = self.services.into_iter().map(Arc::new).collect();
        let mut scratch =
            ConnectionRegistry::new(Arc::clone(&transport), self.config.max_connections);
        register_all(&mut scratch, &self.config, &services)?;

        Ok(Peripheral {
            registry: ConnectionRegistry::new(Arc::clone(&transport), self.config.max_connections),
            scheduler: AdvertisingScheduler::new(Arc::clone(&transport)),
            adapter: AdapterStateMachine::new(),
            transport,
            config: self.config,
            services,
            callbacks: self.callbacks,
            ready: false,
            bd_addr: None,
        })
    }
}

// ----------------------------------------------------------------------------
// Peripheral
// ----------------------------------------------------------------------------

pub struct Peripheral {
    config: PeripheralConfig,
    transport: Arc<dyn Transport>,
    services: Vec<Arc<Service>>,
    callbacks: Callbacks,
    adapter: AdapterStateMachine,
    registry: ConnectionRegistry,
    scheduler: AdvertisingScheduler,
    /// Setup finished for the current power-on session
    ready: bool,
    bd_addr: Option<BdAddr>,
}

impl Peripheral {
    pub fn builder(config: PeripheralConfig) -> PeripheralBuilder {
        PeripheralBuilder::new(config)
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    pub fn state(&self) -> AdapterState {
        self.adapter.state()
    }

    pub fn state_reader(&self) -> AdapterStateReader {
        self.adapter.reader()
    }

    pub fn advertising_mode(&self) -> AdvertisingMode {
        self.scheduler.current_mode()
    }

    pub fn advertising_watch(&self) -> watch::Receiver<AdvertisingMode> {
        self.scheduler.watch()
    }

    /// Number of times power-on setup has run
    pub fn setup_runs(&self) -> u64 {
        self.adapter.power_on_edges()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Address reported by the last successful Read BD_ADDR
    pub fn bd_addr(&self) -> Option<BdAddr> {
        self.bd_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Dispatch events until the feed closes
    pub async fn run(mut self, mut events: EventReceiver) -> Result<()> {
        info!("Peripheral {:?} starting", self.config.device_name);
        if let Err(e) = self.transport.stop_advertising().await {
            warn!("Failed to stop stale advertising: {}", e);
        }

        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }

        info!("Event feed closed, shutting down");
        self.teardown().await;
        Ok(())
    }

    /// Run the dispatch loop on its own task
    pub fn spawn(self, events: EventReceiver) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(events))
    }

    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::AdapterStateChanged(state) => self.on_state_changed(state).await,
            TransportEvent::CentralConnected { central } => self.on_connected(central).await,
            TransportEvent::CentralDisconnected { central } => self.on_disconnected(&central),
            TransportEvent::MtuChanged { central, mtu } => self.registry.set_mtu(&central, mtu),
            TransportEvent::Subscribe {
                central,
                characteristic,
            } => {
                let status = self.registry.subscribe(&central, &characteristic);
                if !status.is_success() {
                    warn!(
                        "Subscription of {} to {} refused: {}",
                        central, characteristic, status
                    );
                }
            }
            TransportEvent::Unsubscribe {
                central,
                characteristic,
            } => {
                if let Some(channel) = self.registry.unsubscribe(&central, &characteristic) {
                    self.reap(vec![channel]);
                }
            }
            TransportEvent::ReadRequest {
                central,
                characteristic,
                responder,
            } => {
                let result = self.registry.route_read(&central, &characteristic);
                if responder.send(result).is_err() {
                    debug!("Read response for {} dropped by transport", characteristic);
                }
            }
            TransportEvent::WriteRequest {
                central,
                characteristic,
                payload,
                responder,
            } => {
                let status = self.registry.route_write(&central, &characteristic, &payload);
                if let Some(responder) = responder {
                    if responder.send(status).is_err() {
                        debug!("Write response for {} dropped by transport", characteristic);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Adapter lifecycle
    // ------------------------------------------------------------------------

    async fn on_state_changed(&mut self, state: AdapterState) {
        let transition = self.adapter.observe(state);
        if let Some(callback) = &self.callbacks.state_changed {
            callback(state);
        }

        match transition {
            Transition::PowerOn => {
                if let Err(e) = self.setup().await {
                    self.abort_setup(e).await;
                }
            }
            Transition::PowerOff => self.teardown().await,
            Transition::Unchanged => {}
        }
    }

    async fn setup(&mut self) -> Result<()> {
        info!("Powered on, running setup ({})", self.setup_runs());

        if self.config.require_le_support {
            let supported = self
                .transport
                .supports_le()
                .await
                .map_err(|e| PeripheralError::AdapterUnavailable(e.to_string()))?;
            if !supported {
                return Err(PeripheralError::AdapterUnsupported);
            }
        }

        match read_bd_addr(self.transport.as_ref()).await {
            Ok(addr) => {
                info!("BD_ADDR: {}", addr);
                self.bd_addr = Some(addr);
            }
            Err(e) => warn!("Continuing without adapter address: {}", e),
        }

        self.transport
            .set_advertising_parameters(self.config.advertising_parameters())
            .await?;

        register_all(&mut self.registry, &self.config, &self.services)?;
        self.transport
            .publish_services(self.registry.services())
            .await?;
        self.ready = true;

        let advertised: Vec<BleUuid> = self.services.iter().map(|s| s.uuid()).collect();
        self.scheduler.start(&self.config, advertised).await?;
        info!("Setup complete");
        Ok(())
    }

    /// Undo a partial setup and report why the peripheral is not advertising
    async fn abort_setup(&mut self, error: PeripheralError) {
        error!("Power-on setup failed, not advertising: {}", error);
        self.ready = false;

        let registered = !self.registry.services().is_empty();
        let severed = self.registry.reset();
        self.reap(severed.into_iter().flat_map(Central::into_channels).collect());
        self.scheduler.stop().await;
        if registered {
            if let Err(e) = self.transport.clear_services().await {
                warn!("Failed to clear services: {}", e);
            }
        }

        let degraded = match error {
            PeripheralError::AdapterUnsupported => Some(AdapterState::Unsupported),
            PeripheralError::AdapterUnavailable(_) => Some(AdapterState::Unknown),
            _ => None,
        };
        if let Some(state) = degraded {
            self.adapter.degrade(state);
            if let Some(callback) = &self.callbacks.state_changed {
                callback(state);
            }
        }
        if let Some(callback) = &self.callbacks.setup_failed {
            callback(&error);
        }
    }

    async fn teardown(&mut self) {
        self.ready = false;

        // Every channel is signalled before anything below can yield.
        let centrals = self.registry.reset();

        self.scheduler.stop().await;

        let mut channels = Vec::new();
        for central in centrals {
            if let Some(callback) = &self.callbacks.central_disconnected {
                callback(central.id());
            }
            channels.extend(central.into_channels());
        }
        let leaked = join_all(channels, self.config.notify_join_timeout).await;
        if leaked > 0 {
            warn!("{} notify handlers still running after teardown", leaked);
        }

        if let Err(e) = self.transport.clear_services().await {
            warn!("Failed to clear services: {}", e);
        }
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    async fn on_connected(&mut self, central: CentralId) {
        if !self.ready {
            warn!("Refusing {}: peripheral not set up", central);
            self.refuse(&central).await;
            return;
        }

        let newly_admitted = !self.registry.is_admitted(&central);
        match self.registry.admit(central.clone()) {
            Ok(_) => {
                if newly_admitted {
                    if let Some(callback) = &self.callbacks.central_connected {
                        callback(&central);
                    }
                }
            }
            Err(e) => {
                warn!("Refusing {}: {}", central, e);
                self.refuse(&central).await;
            }
        }
    }

    async fn refuse(&self, central: &CentralId) {
        if let Err(e) = self.transport.disconnect(central).await {
            warn!("Failed to disconnect {}: {}", central, e);
        }
    }

    fn on_disconnected(&mut self, central: &CentralId) {
        let Some(entry) = self.registry.remove(central) else {
            debug!("Disconnect from unknown central {}", central);
            return;
        };
        if let Some(callback) = &self.callbacks.central_disconnected {
            callback(central);
        }
        self.reap(entry.into_channels());
    }

    /// Join cancelled channels off the dispatch path
    fn reap(&self, channels: Vec<NotificationChannel>) {
        if channels.is_empty() {
            return;
        }
        let timeout = self.config.notify_join_timeout;
        tokio::spawn(async move {
            join_all(channels, timeout).await;
        });
    }
}

/// Register the meta-services followed by the application tree
fn register_all(
    registry: &mut ConnectionRegistry,
    config: &PeripheralConfig,
    services: &[Arc<Service>],
) -> Result<()> {
    registry.register(Arc::new(gap_service(&config.device_name)))?;
    registry.register(Arc::new(gatt_service()))?;
    for service in services {
        registry.register(Arc::clone(service))?;
    }
    Ok(())
}
