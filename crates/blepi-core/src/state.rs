//! Adapter power state and its single-writer cell

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Power state reported by the Bluetooth controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub fn is_powered_on(self) -> bool {
        self == AdapterState::PoweredOn
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterState::Unknown => "Unknown",
            AdapterState::Resetting => "Resetting",
            AdapterState::Unsupported => "Unsupported",
            AdapterState::Unauthorized => "Unauthorized",
            AdapterState::PoweredOff => "PoweredOff",
            AdapterState::PoweredOn => "PoweredOn",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// State Cell
// ----------------------------------------------------------------------------

/// The process-wide adapter state
///
/// The cell is the only writer and is not `Clone`; any number of
/// [`AdapterStateReader`]s observe consistent snapshots from other tasks.
#[derive(Debug)]
pub struct AdapterStateCell {
    tx: watch::Sender<AdapterState>,
}

impl AdapterStateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AdapterState::Unknown);
        Self { tx }
    }

    /// Store a new state and return the previous one
    pub fn set(&mut self, state: AdapterState) -> AdapterState {
        self.tx.send_replace(state)
    }

    pub fn snapshot(&self) -> AdapterState {
        *self.tx.borrow()
    }

    pub fn reader(&self) -> AdapterStateReader {
        AdapterStateReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AdapterStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the adapter state
#[derive(Debug, Clone)]
pub struct AdapterStateReader {
    rx: watch::Receiver<AdapterState>,
}

impl AdapterStateReader {
    pub fn snapshot(&self) -> AdapterState {
        *self.rx.borrow()
    }

    /// Wait for the next state change
    ///
    /// Returns `None` once the cell has been dropped.
    pub async fn changed(&mut self) -> Option<AdapterState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readers_observe_writes() {
        let mut cell = AdapterStateCell::new();
        let mut reader = cell.reader();
        assert_eq!(reader.snapshot(), AdapterState::Unknown);

        let previous = cell.set(AdapterState::PoweredOn);
        assert_eq!(previous, AdapterState::Unknown);
        assert_eq!(reader.changed().await, Some(AdapterState::PoweredOn));
        assert_eq!(cell.snapshot(), AdapterState::PoweredOn);

        drop(cell);
        assert_eq!(reader.changed().await, None);
    }
}
