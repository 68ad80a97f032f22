//! Runtime for the blepi BLE peripheral
//!
//! - [`Peripheral`] - event dispatch, power-on setup and power-off teardown
//! - [`ConnectionRegistry`] - connected centrals, request routing, subscriptions
//! - [`NotificationChannel`] - one notify handler task per subscription
//! - [`AdapterStateMachine`] - power edge detection over the adapter state cell
//! - [`AdvertisingScheduler`] - static or alternating beacon/static advertising
//!
//! The runtime talks to the controller only through
//! [`blepi_core::Transport`] and its event feed.

pub mod adapter;
pub mod advertising;
pub mod gap;
pub mod hci;
pub mod notification;
pub mod peripheral;
pub mod registry;

pub use adapter::{AdapterStateMachine, Transition};
pub use advertising::AdvertisingScheduler;
pub use hci::{read_bd_addr, BdAddr, READ_BD_ADDR_OPCODE};
pub use notification::NotificationChannel;
pub use peripheral::{
    CentralCallback, Peripheral, PeripheralBuilder, SetupFailedCallback, StateCallback,
};
pub use registry::{Central, ConnectionRegistry};

// Re-export core types for convenience
pub use blepi_core::{
    create_event_channel, AdapterState, AdvertisingMode, AttStatus, BleUuid, CentralId,
    Characteristic, Descriptor, EventReceiver, EventSender, Notifier, PeripheralConfig,
    PeripheralError, Properties, Request, Result, Service, Transport, TransportEvent,
};
