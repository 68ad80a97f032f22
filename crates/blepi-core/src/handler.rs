//! Request context and characteristic handler contracts
//!
//! Handlers receive everything they need through an explicit [`Request`]; they
//! are plain objects or closures and never reach into peripheral state.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::notifier::Notifier;
use crate::status::AttStatus;
use crate::uuid::BleUuid;

/// Default ATT MTU before any exchange
pub const DEFAULT_ATT_MTU: u16 = 23;

/// Outcome of a read handler: the value, or the status to reject with
pub type ReadResult = std::result::Result<Vec<u8>, AttStatus>;

// ----------------------------------------------------------------------------
// Request Context
// ----------------------------------------------------------------------------

/// Opaque connection handle of a central, as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CentralId(String);

impl CentralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CentralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CentralId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Context handed to every handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Central that issued the request
    pub central: CentralId,
    /// Service owning the characteristic
    pub service: BleUuid,
    /// Characteristic the request targets
    pub characteristic: BleUuid,
    /// ATT MTU negotiated with the central
    pub mtu: u16,
}

// ----------------------------------------------------------------------------
// Handler Traits
// ----------------------------------------------------------------------------

/// Produces the value of a characteristic for a read request
pub trait ReadHandler: Send + Sync {
    fn read(&self, request: &Request) -> ReadResult;
}

/// Consumes a write request and reports its status
pub trait WriteHandler: Send + Sync {
    fn write(&self, request: &Request, payload: &[u8]) -> AttStatus;
}

/// Streams notifications for one subscription
///
/// The handler runs on its own task for as long as the subscription lives.
/// It must poll [`Notifier::done`] (or use [`Notifier::wait`]) between
/// emissions and return once the subscription ends. Handlers are never
/// interrupted; one that ignores the signal keeps its task alive.
#[async_trait]
pub trait NotifyHandler: Send + Sync {
    async fn notify(&self, request: Request, notifier: Notifier);
}

impl<F> ReadHandler for F
where
    F: Fn(&Request) -> ReadResult + Send + Sync,
{
    fn read(&self, request: &Request) -> ReadResult {
        self(request)
    }
}

impl<F> WriteHandler for F
where
    F: Fn(&Request, &[u8]) -> AttStatus + Send + Sync,
{
    fn write(&self, request: &Request, payload: &[u8]) -> AttStatus {
        self(request, payload)
    }
}

#[async_trait]
impl<F, Fut> NotifyHandler for F
where
    F: Fn(Request, Notifier) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn notify(&self, request: Request, notifier: Notifier) {
        self(request, notifier).await
    }
}
