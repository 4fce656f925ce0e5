//! Events a scan session publishes to the hosting screen.

use crate::error::ScanError;
use crate::ledger::Identity;
use crate::scan::ScanPhase;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something the screen may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// The session moved to a new phase.
    PhaseChanged(ScanPhase),
    /// Cameras were enumerated.
    DevicesListed {
        /// Number of cameras found.
        count: usize,
    },
    /// A scan resolved to a counterparty.
    Resolved(Identity),
    /// A scan or device operation failed.
    Error(ScanError),
}

/// Sending half of the scan event channel.
pub type ScanEventsSender = broadcast::Sender<ScanEvent>;

/// Receiving half of the scan event channel.
pub type ScanEventsChannel = broadcast::Receiver<ScanEvent>;

/// Create a new scan event channel.
#[must_use]
pub fn create_event_channel() -> (ScanEventsSender, ScanEventsChannel) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
