//! Adapter state machine
//!
//! Owns the [`AdapterStateCell`] and turns raw state observations into
//! power edges. Only the edge into `PoweredOn` triggers setup, and only the
//! edge out of it triggers teardown, however often the transport repeats a
//! state.

use blepi_core::{AdapterState, AdapterStateCell, AdapterStateReader};
use tracing::{info, warn};

/// Side effect demanded by a state observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered `PoweredOn`: run setup
    PowerOn,
    /// Left `PoweredOn`: stop advertising and sever centrals
    PowerOff,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct AdapterStateMachine {
    cell: AdapterStateCell,
    power_on_edges: u64,
}

impl AdapterStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AdapterState {
        self.cell.snapshot()
    }

    pub fn reader(&self) -> AdapterStateReader {
        self.cell.reader()
    }

    /// Number of power-on edges observed so far
    pub fn power_on_edges(&self) -> u64 {
        self.power_on_edges
    }

    /// Record a state found by power-on setup rather than reported
    ///
    /// Used when the controller turns out to be unusable while the transport
    /// still reports `PoweredOn`. A later `PoweredOn` report retries setup.
    pub fn degrade(&mut self, state: AdapterState) {
        let previous = self.cell.set(state);
        warn!("Adapter degraded {} -> {}", previous, state);
    }

    /// Record a state reported by the transport
    pub fn observe(&mut self, next: AdapterState) -> Transition {
        let previous = self.cell.set(next);
        if previous != next {
            info!("Adapter state {} -> {}", previous, next);
        }
        match next {
            AdapterState::Unsupported => warn!("Bluetooth adapter does not support this peripheral"),
            AdapterState::Unauthorized => warn!("Not authorized to use the Bluetooth adapter"),
            _ => {}
        }

        match (previous.is_powered_on(), next.is_powered_on()) {
            (false, true) => {
                self.power_on_edges += 1;
                Transition::PowerOn
            }
            (true, false) => Transition::PowerOff,
            _ => Transition::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_edges() {
        let mut machine = AdapterStateMachine::new();
        assert_eq!(machine.observe(AdapterState::PoweredOff), Transition::Unchanged);
        assert_eq!(machine.observe(AdapterState::PoweredOn), Transition::PowerOn);
        assert_eq!(machine.observe(AdapterState::PoweredOn), Transition::Unchanged);
        assert_eq!(machine.observe(AdapterState::Resetting), Transition::PowerOff);
        assert_eq!(machine.observe(AdapterState::PoweredOff), Transition::Unchanged);
        assert_eq!(machine.observe(AdapterState::PoweredOn), Transition::PowerOn);
        assert_eq!(machine.power_on_edges(), 2);
        assert_eq!(machine.state(), AdapterState::PoweredOn);
    }

    #[test]
    fn test_unsupported_is_not_an_edge() {
        let mut machine = AdapterStateMachine::new();
        assert_eq!(machine.observe(AdapterState::Unsupported), Transition::Unchanged);
        assert_eq!(machine.reader().snapshot(), AdapterState::Unsupported);
        assert_eq!(machine.power_on_edges(), 0);
    }
}
