//! Single-writer collection of probe outcomes.
//!
//! Probe tasks never touch the result map. They send [`ProbeOutcome`]s over
//! an mpsc channel to one aggregator task, which owns the map exclusively and
//! hands it back, frozen, once every sender has been dropped.

use super::traits::{PortState, ProbeOutcome};
use crate::error::{ScanError, ScanResult};
use crate::types::Port;
use std::collections::btree_map::{self, BTreeMap};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Channel depth between probes and the aggregator.
const CHANNEL_CAPACITY: usize = 1024;

/// Outcomes of one scan, keyed and ordered by port.
///
/// At most one entry per port. Only the aggregator can insert, so once a
/// `ResultSet` is handed out it is read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    ports: BTreeMap<Port, PortState>,
}

impl ResultSet {
    /// Record an outcome. The first outcome for a port wins; returns
    /// whether this one was stored.
    pub(crate) fn insert(&mut self, outcome: ProbeOutcome) -> bool {
        match self.ports.entry(outcome.port) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(outcome.state);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, port: Port) -> Option<PortState> {
        self.ports.get(&port).copied()
    }

    pub fn contains(&self, port: Port) -> bool {
        self.ports.contains_key(&port)
    }

    pub fn is_open(&self, port: u16) -> bool {
        Port::new(port).and_then(|p| self.get(p)) == Some(PortState::Open)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// All outcomes in ascending port order.
    pub fn iter(&self) -> impl Iterator<Item = ProbeOutcome> + '_ {
        self.ports
            .iter()
            .map(|(&port, &state)| ProbeOutcome::new(port, state))
    }

    /// Open ports in ascending order.
    pub fn open_ports(&self) -> impl Iterator<Item = Port> + '_ {
        self.iter()
            .filter(|o| o.state.is_open())
            .map(|o| o.port)
    }

    pub fn count(&self, state: PortState) -> usize {
        self.ports.values().filter(|&&s| s == state).count()
    }
}

impl FromIterator<ProbeOutcome> for ResultSet {
    fn from_iter<I: IntoIterator<Item = ProbeOutcome>>(iter: I) -> Self {
        let mut set = Self::default();
        for outcome in iter {
            set.insert(outcome);
        }
        set
    }
}

/// Sending half given to probe tasks.
#[derive(Debug, Clone)]
pub struct AggregatorHandle {
    tx: mpsc::Sender<ProbeOutcome>,
}

impl AggregatorHandle {
    /// Hand an outcome to the aggregator.
    pub async fn report(&self, outcome: ProbeOutcome) -> ScanResult<()> {
        self.tx
            .send(outcome)
            .await
            .map_err(|_| ScanError::AggregatorFailed)
    }
}

/// The task that owns the result map.
pub struct Aggregator {
    handle: JoinHandle<ResultSet>,
}

impl Aggregator {
    /// Start the aggregator. The returned handle is the only way to add
    /// outcomes; drop every clone of it to finish the scan phase.
    pub fn spawn() -> (AggregatorHandle, Self) {
        let (tx, mut rx) = mpsc::channel::<ProbeOutcome>(CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            let mut results = ResultSet::default();
            while let Some(outcome) = rx.recv().await {
                if !results.insert(outcome) {
                    tracing::debug!(port = %outcome.port, "ignoring duplicate outcome");
                }
            }
            results
        });

        (AggregatorHandle { tx }, Self { handle })
    }

    /// Wait for all senders to be dropped and return the frozen results.
    pub async fn finish(self) -> ScanResult<ResultSet> {
        self.handle.await.map_err(|_| ScanError::AggregatorFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(port: u16, state: PortState) -> ProbeOutcome {
        ProbeOutcome::new(Port::new(port).unwrap(), state)
    }

    #[test]
    fn test_first_outcome_wins() {
        let mut set = ResultSet::default();
        assert!(set.insert(outcome(22, PortState::Open)));
        assert!(!set.insert(outcome(22, PortState::Closed)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(Port::new(22).unwrap()), Some(PortState::Open));
    }

    #[test]
    fn test_iteration_is_ascending() {
        let set: ResultSet = [
            outcome(443, PortState::Open),
            outcome(22, PortState::Open),
            outcome(80, PortState::Filtered),
            outcome(21, PortState::Closed),
        ]
        .into_iter()
        .collect();

        let ports: Vec<u16> = set.iter().map(|o| o.port.as_u16()).collect();
        assert_eq!(ports, vec![21, 22, 80, 443]);

        let open: Vec<u16> = set.open_ports().map(Port::as_u16).collect();
        assert_eq!(open, vec![22, 443]);
        assert_eq!(set.count(PortState::Filtered), 1);
        assert!(set.is_open(443));
        assert!(!set.is_open(80));
        assert!(!set.is_open(0));
    }

    #[tokio::test]
    async fn test_concurrent_reports_are_serialized() {
        let (handle, aggregator) = Aggregator::spawn();

        let mut tasks = tokio::task::JoinSet::new();
        for port in 1..=500u16 {
            let handle = handle.clone();
            tasks.spawn(async move {
                let state = if port % 7 == 0 { PortState::Open } else { PortState::Closed };
                handle.report(outcome(port, state)).await.unwrap();
                // A second report for the same port must not duplicate it
                handle.report(outcome(port, PortState::Filtered)).await.unwrap();
            });
        }
        drop(handle);
        while tasks.join_next().await.is_some() {}

        let results = aggregator.finish().await.unwrap();
        assert_eq!(results.len(), 500);
        assert_eq!(results.count(PortState::Open), 500 / 7);
        assert_eq!(results.count(PortState::Filtered), 0);
    }
}
