//! Events published on the in-process bus after a successful mutation.
//!
//! Events carry the post-mutation state so subscribers never have to read
//! back from storage. They are internal; the websocket adapter maps them to
//! wire messages.

use crate::device::Device;
use crate::history::HistoryEntry;
use crate::id::DeviceId;

/// Something observable happened to the fleet state.
#[derive(Debug, Clone)]
pub enum Event {
    /// A device was created or had its identity/status fields updated.
    DeviceChanged(Device),
    /// A device's current snapshot was replaced wholesale.
    SnapshotReplaced(Device),
    /// A reading was appended to a device's history.
    ReadingAppended {
        device_name: String,
        entry: HistoryEntry,
    },
    /// A device was removed from the registry.
    DeviceRemoved(DeviceId),
    /// The number of connected websocket clients changed.
    ClientsChanged { count: usize },
}

impl Event {
    /// Short label for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceChanged(_) => "device-changed",
            Self::SnapshotReplaced(_) => "snapshot-replaced",
            Self::ReadingAppended { .. } => "reading-appended",
            Self::DeviceRemoved(_) => "device-removed",
            Self::ClientsChanged { .. } => "clients-changed",
        }
    }
}
