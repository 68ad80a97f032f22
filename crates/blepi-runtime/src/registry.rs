//! Connection registry
//!
//! Sole owner of the connected centrals and of the registered attribute
//! database. Routes reads, writes and subscriptions to characteristic handlers.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use blepi_core::{
    AttStatus, BleUuid, CentralId, Characteristic, PeripheralError, ReadResult, Request, Result,
    Service, Transport, DEFAULT_ATT_MTU,
};
use tracing::{debug, info, warn};

use crate::notification::NotificationChannel;

// ----------------------------------------------------------------------------
// Central
// ----------------------------------------------------------------------------

/// A connected central and its live subscriptions
#[derive(Debug)]
pub struct Central {
    id: CentralId,
    mtu: u16,
    channels: HashMap<BleUuid, NotificationChannel>,
}

impl Central {
    fn new(id: CentralId) -> Self {
        Self {
            id,
            mtu: DEFAULT_ATT_MTU,
            channels: HashMap::new(),
        }
    }

    pub fn id(&self) -> &CentralId {
        &self.id
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn is_subscribed(&self, characteristic: &BleUuid) -> bool {
        self.channels.contains_key(characteristic)
    }

    pub fn subscriptions(&self) -> Vec<BleUuid> {
        let mut uuids: Vec<BleUuid> = self.channels.keys().copied().collect();
        uuids.sort();
        uuids
    }

    fn cancel_all(&self) {
        for channel in self.channels.values() {
            channel.cancel();
        }
    }

    /// Hand over the (already cancelled) channels for joining
    pub fn into_channels(self) -> Vec<NotificationChannel> {
        self.channels.into_values().collect()
    }
}

// ----------------------------------------------------------------------------
// Connection Registry
// ----------------------------------------------------------------------------

pub struct ConnectionRegistry {
    transport: Arc<dyn Transport>,
    max_connections: usize,
    services: Vec<Arc<Service>>,
    centrals: HashMap<CentralId, Central>,
}

impl ConnectionRegistry {
    pub fn new(transport: Arc<dyn Transport>, max_connections: usize) -> Self {
        Self {
            transport,
            max_connections,
            services: Vec::new(),
            centrals: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Attribute database
    // ------------------------------------------------------------------------

    /// Add a service to the attribute database
    ///
    /// Characteristic UUIDs must be unique across all registered services,
    /// since requests address characteristics by UUID alone.
    pub fn register(&mut self, service: Arc<Service>) -> Result<()> {
        service.validate()?;

        if self.services.iter().any(|s| s.uuid() == service.uuid()) {
            return Err(PeripheralError::ServiceAlreadyRegistered {
                service: service.uuid(),
            });
        }
        for characteristic in service.characteristics() {
            if self.find(&characteristic.uuid()).is_some() {
                return Err(PeripheralError::DuplicateCharacteristic {
                    characteristic: characteristic.uuid(),
                });
            }
        }

        info!(
            "Registered service {} ({} characteristics)",
            service.uuid(),
            service.characteristics().len()
        );
        self.services.push(service);
        Ok(())
    }

    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    fn find(&self, uuid: &BleUuid) -> Option<(&Service, &Characteristic)> {
        self.services
            .iter()
            .find_map(|s| s.characteristic(uuid).map(|c| (s.as_ref(), c)))
    }

    // ------------------------------------------------------------------------
    // Centrals
    // ------------------------------------------------------------------------

    /// Track a newly connected central
    ///
    /// Admitting an already admitted central returns the existing entry.
    pub fn admit(&mut self, id: CentralId) -> Result<&Central> {
        if !self.centrals.contains_key(&id) {
            if self.centrals.len() >= self.max_connections {
                return Err(PeripheralError::ConnectionLimitReached {
                    max: self.max_connections,
                });
            }
            info!("Admitted central {}", id);
        }
        Ok(self
            .centrals
            .entry(id.clone())
            .or_insert_with(|| Central::new(id)))
    }

    /// Forget a central, cancelling all of its channels
    pub fn remove(&mut self, id: &CentralId) -> Option<Central> {
        let central = self.centrals.remove(id)?;
        central.cancel_all();
        info!(
            "Removed central {} ({} subscriptions cancelled)",
            id,
            central.channels.len()
        );
        Some(central)
    }

    pub fn central(&self, id: &CentralId) -> Option<&Central> {
        self.centrals.get(id)
    }

    pub fn is_admitted(&self, id: &CentralId) -> bool {
        self.centrals.contains_key(id)
    }

    pub fn central_count(&self) -> usize {
        self.centrals.len()
    }

    /// Record a negotiated MTU; channels opened afterwards use it
    pub fn set_mtu(&mut self, id: &CentralId, mtu: u16) {
        if let Some(central) = self.centrals.get_mut(id) {
            debug!("Central {} MTU {} -> {}", id, central.mtu, mtu);
            central.mtu = mtu.max(DEFAULT_ATT_MTU);
        }
    }

    fn mtu_of(&self, id: &CentralId) -> u16 {
        self.centrals
            .get(id)
            .map(|c| c.mtu)
            .unwrap_or(DEFAULT_ATT_MTU)
    }

    // ------------------------------------------------------------------------
    // Request routing
    // ------------------------------------------------------------------------

    /// Run the characteristic's write handler and return its status
    pub fn route_write(
        &self,
        central: &CentralId,
        characteristic: &BleUuid,
        payload: &[u8],
    ) -> AttStatus {
        let Some((service, target)) = self.find(characteristic) else {
            debug!("Write from {} to unknown {}", central, characteristic);
            return AttStatus::CharacteristicNotFound;
        };
        let request = Request {
            central: central.clone(),
            service: service.uuid(),
            characteristic: *characteristic,
            mtu: self.mtu_of(central),
        };

        let status = catch_unwind(AssertUnwindSafe(|| target.write(&request, payload)))
            .unwrap_or_else(|_| {
                warn!("Write handler for {} panicked", characteristic);
                AttStatus::UnlikelyError
            });
        debug!(
            "Write {} bytes from {} to {}: {}",
            payload.len(),
            central,
            characteristic,
            status
        );
        status
    }

    /// Run the characteristic's read handler, or serve its fixed value
    pub fn route_read(&self, central: &CentralId, characteristic: &BleUuid) -> ReadResult {
        let Some((service, target)) = self.find(characteristic) else {
            debug!("Read from {} of unknown {}", central, characteristic);
            return Err(AttStatus::CharacteristicNotFound);
        };
        let request = Request {
            central: central.clone(),
            service: service.uuid(),
            characteristic: *characteristic,
            mtu: self.mtu_of(central),
        };

        let result = catch_unwind(AssertUnwindSafe(|| target.read(&request))).unwrap_or_else(|_| {
            warn!("Read handler for {} panicked", characteristic);
            Err(AttStatus::UnlikelyError)
        });
        match &result {
            Ok(value) => debug!("Read {} by {}: {} bytes", characteristic, central, value.len()),
            Err(status) => debug!("Read {} by {} rejected: {}", characteristic, central, status),
        }
        result
    }

    /// Open a notification channel for the pair
    ///
    /// Subscribing twice to the same characteristic keeps the existing channel.
    pub fn subscribe(&mut self, central: &CentralId, characteristic: &BleUuid) -> AttStatus {
        let Some((service, target)) = self.find(characteristic) else {
            return AttStatus::CharacteristicNotFound;
        };
        let Some(handler) = target.notify_handler().cloned() else {
            return AttStatus::RequestNotSupported;
        };
        let service = service.uuid();

        let Some(entry) = self.centrals.get_mut(central) else {
            warn!("Subscribe from unknown central {}", central);
            return AttStatus::UnlikelyError;
        };
        if entry.is_subscribed(characteristic) {
            return AttStatus::Success;
        }

        let request = Request {
            central: central.clone(),
            service,
            characteristic: *characteristic,
            mtu: entry.mtu,
        };
        let channel = NotificationChannel::spawn(handler, request, Arc::clone(&self.transport));
        entry.channels.insert(*characteristic, channel);
        info!("Central {} subscribed to {}", central, characteristic);
        AttStatus::Success
    }

    /// Cancel the pair's channel and hand it back for joining
    pub fn unsubscribe(
        &mut self,
        central: &CentralId,
        characteristic: &BleUuid,
    ) -> Option<NotificationChannel> {
        let channel = self
            .centrals
            .get_mut(central)?
            .channels
            .remove(characteristic)?;
        channel.cancel();
        info!("Central {} unsubscribed from {}", central, characteristic);
        Some(channel)
    }

    /// Drop every central and service
    ///
    /// All channels are cancelled before this returns; the removed centrals
    /// are handed back so their channels can be joined.
    pub fn reset(&mut self) -> Vec<Central> {
        let centrals: Vec<Central> = self.centrals.drain().map(|(_, c)| c).collect();
        for central in &centrals {
            central.cancel_all();
        }
        self.services.clear();
        if !centrals.is_empty() {
            info!("Registry reset, severed {} centrals", centrals.len());
        }
        centrals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blepi_core::{Notifier, Properties};
    use blepi_harness::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SERVICE: BleUuid = BleUuid::from_u16(0xFFF0);
    const WRITE_ONLY: BleUuid = BleUuid::from_u16(0xFFF1);
    const READ_ONLY: BleUuid = BleUuid::from_u16(0xFFF2);
    const STREAM: BleUuid = BleUuid::from_u16(0xFFF3);

    fn registry(writes: Arc<AtomicUsize>) -> ConnectionRegistry {
        let mut registry = ConnectionRegistry::new(Arc::new(MockTransport::default()), 2);
        let service = Service::builder(SERVICE)
            .characteristic(
                Characteristic::builder(WRITE_ONLY)
                    .on_write(move |_req: &Request, _data: &[u8]| {
                        writes.fetch_add(1, Ordering::SeqCst);
                        AttStatus::Success
                    })
                    .build(),
            )
            .characteristic(Characteristic::builder(READ_ONLY).value(b"0".to_vec()).build())
            .characteristic(
                Characteristic::builder(STREAM)
                    .on_notify(|_req, n: Notifier| async move { n.cancelled().await })
                    .build(),
            )
            .build();
        registry.register(Arc::new(service)).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_write_to_unknown_characteristic_invokes_nothing() {
        let writes = Arc::new(AtomicUsize::new(0));
        let registry = registry(writes.clone());
        let central = CentralId::new("c1");

        let status = registry.route_write(&central, &BleUuid::from_u16(0xBEEF), b"x");
        assert_eq!(status, AttStatus::CharacteristicNotFound);
        assert_eq!(writes.load(Ordering::SeqCst), 0);

        assert_eq!(registry.route_write(&central, &WRITE_ONLY, b"x"), AttStatus::Success);
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_permissions() {
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        let central = CentralId::new("c1");

        assert_eq!(
            registry.route_read(&central, &WRITE_ONLY),
            Err(AttStatus::ReadNotPermitted)
        );
        assert_eq!(registry.route_read(&central, &READ_ONLY), Ok(b"0".to_vec()));
        assert_eq!(
            registry.route_write(&central, &READ_ONLY, b"1"),
            AttStatus::WriteNotPermitted
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_unlikely_error() {
        let mut registry = ConnectionRegistry::new(Arc::new(MockTransport::default()), 1);
        let uuid = BleUuid::from_u16(0xAAA1);
        let service = Service::builder(BleUuid::from_u16(0xAAA0))
            .characteristic(
                Characteristic::builder(uuid)
                    .on_read(|_req: &Request| panic!("boom"))
                    .build(),
            )
            .build();
        registry.register(Arc::new(service)).unwrap();

        assert_eq!(
            registry.route_read(&CentralId::new("c1"), &uuid),
            Err(AttStatus::UnlikelyError)
        );
    }

    #[tokio::test]
    async fn test_admit_is_idempotent_and_capped() {
        let mut registry = registry(Arc::new(AtomicUsize::new(0)));
        registry.admit(CentralId::new("c1")).unwrap();
        registry.admit(CentralId::new("c1")).unwrap();
        registry.admit(CentralId::new("c2")).unwrap();
        assert_eq!(registry.central_count(), 2);

        let err = registry.admit(CentralId::new("c3")).unwrap_err();
        assert_eq!(err, PeripheralError::ConnectionLimitReached { max: 2 });
        assert!(registry.remove(&CentralId::new("missing")).is_none());
    }

    #[tokio::test]
    async fn test_remove_cancels_channels() {
        let mut registry = registry(Arc::new(AtomicUsize::new(0)));
        let central = CentralId::new("c1");
        registry.admit(central.clone()).unwrap();

        assert_eq!(registry.subscribe(&central, &STREAM), AttStatus::Success);
        assert_eq!(registry.subscribe(&central, &STREAM), AttStatus::Success);
        assert_eq!(
            registry.subscribe(&central, &READ_ONLY),
            AttStatus::RequestNotSupported
        );
        assert_eq!(registry.central(&central).unwrap().subscriptions(), vec![STREAM]);

        let removed = registry.remove(&central).unwrap();
        let channels = removed.into_channels();
        assert_eq!(channels.len(), 1);
        assert!(channels[0].is_cancelled());
        assert_eq!(
            crate::notification::join_all(channels, Duration::from_secs(1)).await,
            0
        );
    }

    #[tokio::test]
    async fn test_registration_rejects_duplicates() {
        let mut registry = registry(Arc::new(AtomicUsize::new(0)));

        let same_service = Service::builder(SERVICE).build();
        assert!(matches!(
            registry.register(Arc::new(same_service)),
            Err(PeripheralError::ServiceAlreadyRegistered { .. })
        ));

        let clash = Service::builder(BleUuid::from_u16(0xEEE0))
            .characteristic(Characteristic::builder(READ_ONLY).value(b"1".to_vec()).build())
            .build();
        assert!(matches!(
            registry.register(Arc::new(clash)),
            Err(PeripheralError::DuplicateCharacteristic { .. })
        ));

        let missing_handler = Service::builder(BleUuid::from_u16(0xEEE1))
            .characteristic(
                Characteristic::builder(BleUuid::from_u16(0xEEE2))
                    .properties(Properties::NOTIFY)
                    .build(),
            )
            .build();
        assert!(matches!(
            registry.register(Arc::new(missing_handler)),
            Err(PeripheralError::MissingNotifyHandler { .. })
        ));
    }
}
