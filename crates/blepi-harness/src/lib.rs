//! Test harness for the blepi peripheral runtime
//!
//! [`MockTransport`] stands in for the HCI transport and records every call
//! the runtime makes, stamped with tokio's clock so paused-time tests can
//! assert on exact schedules. [`EventInjector`] scripts the adapter and
//! central side of the event feed.

pub mod injector;
pub mod mock_transport;

pub use injector::EventInjector;
pub use mock_transport::{MockTransport, MockTransportConfig, RecordedNotification, TransportCall};
