//! Shared application state for axum handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fleethub_app::event_bus::InProcessEventBus;
use fleethub_app::ports::{DeviceRepository, HistoryRepository};
use fleethub_app::services::device_service::DeviceService;
use fleethub_app::services::history_service::HistoryService;

/// Tracks how many websocket clients are currently connected.
#[derive(Debug, Default)]
pub struct ClientCounter(AtomicUsize);

impl ClientCounter {
    /// Record a new connection, returning the updated count.
    pub fn join(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a disconnect, returning the updated count.
    pub fn leave(&self) -> usize {
        self.0.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Current number of connected clients.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Application state shared across all axum handlers.
///
/// Generic over the repository types to avoid dynamic dispatch. `Clone` is
/// implemented manually so the underlying types themselves do not need to be
/// `Clone` — only the `Arc` wrappers are cloned.
pub struct AppState<DR, HR> {
    /// Device registry service.
    pub device_service: Arc<DeviceService<DR, Arc<InProcessEventBus>>>,
    /// History store service.
    pub history_service: Arc<HistoryService<HR, DR, Arc<InProcessEventBus>>>,
    /// Event bus the websocket hub subscribes to.
    pub event_bus: Arc<InProcessEventBus>,
    /// Connected websocket client count.
    pub clients: Arc<ClientCounter>,
}

impl<DR, HR> Clone for AppState<DR, HR> {
    fn clone(&self) -> Self {
        Self {
            device_service: Arc::clone(&self.device_service),
            history_service: Arc::clone(&self.history_service),
            event_bus: Arc::clone(&self.event_bus),
            clients: Arc::clone(&self.clients),
        }
    }
}

impl<DR, HR> AppState<DR, HR>
where
    DR: DeviceRepository + Send + Sync + 'static,
    HR: HistoryRepository + Send + Sync + 'static,
{
    /// Create a new application state from service instances.
    pub fn new(
        device_service: DeviceService<DR, Arc<InProcessEventBus>>,
        history_service: HistoryService<HR, DR, Arc<InProcessEventBus>>,
        event_bus: Arc<InProcessEventBus>,
    ) -> Self {
        Self {
            device_service: Arc::new(device_service),
            history_service: Arc::new(history_service),
            event_bus,
            clients: Arc::new(ClientCounter::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_track_joins_and_leaves() {
        let counter = ClientCounter::default();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.join(), 1);
        assert_eq!(counter.join(), 2);
        assert_eq!(counter.leave(), 1);
        assert_eq!(counter.count(), 1);
    }
}
