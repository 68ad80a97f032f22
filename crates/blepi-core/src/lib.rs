//! Core types for the blepi BLE peripheral runtime
//!
//! This crate holds everything the runtime and applications share:
//!
//! - [`uuid`] - 16-bit and 128-bit attribute identifiers
//! - [`attribute`] - the service/characteristic/descriptor tree and its builders
//! - [`handler`] - request context and read/write/notify handler contracts
//! - [`notifier`] - the write side of a notification channel
//! - [`state`] - adapter power state and its single-writer cell
//! - [`advertising`] - advertising payloads and radio parameters
//! - [`transport`] - the contract the radio transport satisfies
//! - [`config`] - peripheral configuration
//!
//! ## Usage
//!
//! ```rust
//! use blepi_core::{AttStatus, BleUuid, Characteristic, Descriptor, Request, Service};
//!
//! let service = Service::builder(BleUuid::parse("FD2B4448-AA0F-4A15-A62F-EB0BE77A0000").unwrap())
//!     .characteristic(
//!         Characteristic::builder(BleUuid::from_u16(0xFF01))
//!             .on_read(|_req: &Request| Ok(b"PiSugar".to_vec()))
//!             .descriptor(Descriptor::with_str(BleUuid::from_u16(2001), "Service Name"))
//!             .build(),
//!     )
//!     .characteristic(
//!         Characteristic::builder(BleUuid::from_u16(0xFF02))
//!             .on_write(|_req: &Request, _data: &[u8]| AttStatus::Success)
//!             .build(),
//!     )
//!     .build();
//!
//! assert!(service.validate().is_ok());
//! ```

pub mod advertising;
pub mod attribute;
pub mod config;
pub mod error;
pub mod handler;
pub mod notifier;
pub mod state;
pub mod status;
pub mod transport;
pub mod uuid;

pub use advertising::{AdvertisingMode, AdvertisingParameters, BeaconPayload};
pub use attribute::{
    Characteristic, CharacteristicBuilder, Descriptor, Properties, Service, ServiceBuilder,
};
pub use config::{BeaconConfig, PeripheralConfig};
pub use error::{PeripheralError, Result};
pub use handler::{
    CentralId, NotifyHandler, ReadHandler, ReadResult, Request, WriteHandler, DEFAULT_ATT_MTU,
};
pub use notifier::Notifier;
pub use state::{AdapterState, AdapterStateCell, AdapterStateReader};
pub use status::AttStatus;
pub use transport::{create_event_channel, EventReceiver, EventSender, Transport, TransportEvent};
pub use uuid::BleUuid;
