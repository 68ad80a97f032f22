//! GATT attribute tree: services, characteristics and descriptors
//!
//! Trees are assembled with [`ServiceBuilder`] and [`CharacteristicBuilder`].
//! Once built, a [`Service`] exposes no mutating API; registering it moves it
//! behind an `Arc` owned by the connection registry.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::error::{PeripheralError, Result};
use crate::handler::{NotifyHandler, ReadHandler, ReadResult, Request, WriteHandler};
use crate::notifier::Notifier;
use crate::status::AttStatus;
use crate::uuid::BleUuid;

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

/// Characteristic property flags, using the ATT bit values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Properties(u8);

impl Properties {
    pub const READ: Self = Self(0x02);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Properties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Properties {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::READ, "read"),
            (Self::WRITE, "write"),
            (Self::NOTIFY, "notify"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

// ----------------------------------------------------------------------------
// Descriptor
// ----------------------------------------------------------------------------

/// A fixed-value descriptor attached to a characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    uuid: BleUuid,
    value: Vec<u8>,
}

impl Descriptor {
    pub fn new(uuid: BleUuid, value: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid,
            value: value.into(),
        }
    }

    /// Descriptor holding a UTF-8 string
    pub fn with_str(uuid: BleUuid, value: &str) -> Self {
        Self::new(uuid, value.as_bytes())
    }

    pub fn uuid(&self) -> BleUuid {
        self.uuid
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

// ----------------------------------------------------------------------------
// Characteristic
// ----------------------------------------------------------------------------

/// A characteristic with its descriptors and handlers
#[derive(Clone)]
pub struct Characteristic {
    uuid: BleUuid,
    properties: Properties,
    descriptors: Vec<Descriptor>,
    value: Option<Vec<u8>>,
    read_handler: Option<Arc<dyn ReadHandler>>,
    write_handler: Option<Arc<dyn WriteHandler>>,
    notify_handler: Option<Arc<dyn NotifyHandler>>,
}

impl Characteristic {
    pub fn builder(uuid: BleUuid) -> CharacteristicBuilder {
        CharacteristicBuilder::new(uuid)
    }

    pub fn uuid(&self) -> BleUuid {
        self.uuid
    }

    pub fn properties(&self) -> Properties {
        self.properties
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Fixed value served on read when no read handler is attached
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn read_handler(&self) -> Option<&Arc<dyn ReadHandler>> {
        self.read_handler.as_ref()
    }

    pub fn write_handler(&self) -> Option<&Arc<dyn WriteHandler>> {
        self.write_handler.as_ref()
    }

    pub fn notify_handler(&self) -> Option<&Arc<dyn NotifyHandler>> {
        self.notify_handler.as_ref()
    }

    /// Produce the value for a read request
    ///
    /// The handler takes precedence over a fixed value. Without either, or
    /// without the Read property, the read is not permitted.
    pub fn read(&self, request: &Request) -> ReadResult {
        if !self.properties.contains(Properties::READ) {
            return Err(AttStatus::ReadNotPermitted);
        }
        match (&self.read_handler, &self.value) {
            (Some(handler), _) => handler.read(request),
            (None, Some(value)) => Ok(value.clone()),
            (None, None) => Err(AttStatus::ReadNotPermitted),
        }
    }

    /// Deliver a write request to the handler
    pub fn write(&self, request: &Request, payload: &[u8]) -> AttStatus {
        match &self.write_handler {
            Some(handler) if self.properties.contains(Properties::WRITE) => {
                handler.write(request, payload)
            }
            _ => AttStatus::WriteNotPermitted,
        }
    }
}

impl fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Characteristic")
            .field("uuid", &self.uuid)
            .field("properties", &self.properties)
            .field("descriptors", &self.descriptors)
            .field("value", &self.value)
            .field("read_handler", &self.read_handler.is_some())
            .field("write_handler", &self.write_handler.is_some())
            .field("notify_handler", &self.notify_handler.is_some())
            .finish()
    }
}

/// Builder for [`Characteristic`]
///
/// Attaching a handler or fixed value also sets the matching property, so a
/// characteristic only needs an explicit [`properties`](Self::properties)
/// call to declare a capability without backing it.
pub struct CharacteristicBuilder {
    inner: Characteristic,
}

impl CharacteristicBuilder {
    pub fn new(uuid: BleUuid) -> Self {
        Self {
            inner: Characteristic {
                uuid,
                properties: Properties::empty(),
                descriptors: Vec::new(),
                value: None,
                read_handler: None,
                write_handler: None,
                notify_handler: None,
            },
        }
    }

    /// Declare additional property flags
    pub fn properties(mut self, properties: Properties) -> Self {
        self.inner.properties |= properties;
        self
    }

    pub fn descriptor(mut self, descriptor: Descriptor) -> Self {
        self.inner.descriptors.push(descriptor);
        self
    }

    /// Serve a fixed value on read
    pub fn value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.inner.value = Some(value.into());
        self.inner.properties |= Properties::READ;
        self
    }

    pub fn on_read<F>(self, handler: F) -> Self
    where
        F: Fn(&Request) -> ReadResult + Send + Sync + 'static,
    {
        self.read_handler(Arc::new(handler))
    }

    pub fn on_write<F>(self, handler: F) -> Self
    where
        F: Fn(&Request, &[u8]) -> AttStatus + Send + Sync + 'static,
    {
        self.write_handler(Arc::new(handler))
    }

    pub fn on_notify<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(Request, Notifier) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notify_handler(Arc::new(handler))
    }

    pub fn read_handler(mut self, handler: Arc<dyn ReadHandler>) -> Self {
        self.inner.read_handler = Some(handler);
        self.inner.properties |= Properties::READ;
        self
    }

    pub fn write_handler(mut self, handler: Arc<dyn WriteHandler>) -> Self {
        self.inner.write_handler = Some(handler);
        self.inner.properties |= Properties::WRITE;
        self
    }

    pub fn notify_handler(mut self, handler: Arc<dyn NotifyHandler>) -> Self {
        self.inner.notify_handler = Some(handler);
        self.inner.properties |= Properties::NOTIFY;
        self
    }

    pub fn build(self) -> Characteristic {
        self.inner
    }
}

// ----------------------------------------------------------------------------
// Service
// ----------------------------------------------------------------------------

/// A primary service and its ordered characteristics
#[derive(Debug, Clone)]
pub struct Service {
    uuid: BleUuid,
    characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn builder(uuid: BleUuid) -> ServiceBuilder {
        ServiceBuilder::new(uuid)
    }

    pub fn uuid(&self) -> BleUuid {
        self.uuid
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    pub fn characteristic(&self, uuid: &BleUuid) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.uuid == *uuid)
    }

    /// Check the invariants enforced at registration time
    ///
    /// Every characteristic declaring Notify must carry a notify handler, and
    /// characteristic UUIDs must be unique within the service.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for characteristic in &self.characteristics {
            if characteristic.properties.contains(Properties::NOTIFY)
                && characteristic.notify_handler.is_none()
            {
                return Err(PeripheralError::MissingNotifyHandler {
                    characteristic: characteristic.uuid,
                });
            }
            if !seen.insert(characteristic.uuid) {
                return Err(PeripheralError::DuplicateCharacteristic {
                    characteristic: characteristic.uuid,
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`Service`]
pub struct ServiceBuilder {
    uuid: BleUuid,
    characteristics: Vec<Characteristic>,
}

impl ServiceBuilder {
    pub fn new(uuid: BleUuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    pub fn characteristic(mut self, characteristic: Characteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    pub fn build(self) -> Service {
        Service {
            uuid: self.uuid,
            characteristics: self.characteristics,
        }
    }
}
