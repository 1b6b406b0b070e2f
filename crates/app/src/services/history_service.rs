//! History service — append-only time series of readings per device.
//!
//! Appends for a given device are serialized through a per-device lock and
//! the timestamp is assigned inside it, so entries land in the store in
//! non-decreasing timestamp order per device.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use fleethub_domain::device::SensorSnapshot;
use fleethub_domain::error::{FleetError, NotFoundError, ValidationError};
use fleethub_domain::event::Event;
use fleethub_domain::history::HistoryEntry;
use fleethub_domain::id::DeviceId;
use fleethub_domain::time::{Timestamp, now};

use crate::ports::{DeviceRepository, EventPublisher, HistoryRepository};

/// Window size used when a query does not specify a limit.
pub const DEFAULT_LIMIT: usize = 100;
/// Largest window size a query may request.
pub const MAX_LIMIT: usize = 1000;

/// Application service for the history store.
pub struct HistoryService<H, D, P> {
    history: H,
    devices: D,
    publisher: P,
    locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl<H, D, P> HistoryService<H, D, P>
where
    H: HistoryRepository,
    D: DeviceRepository,
    P: EventPublisher,
{
    /// Create a new service backed by the given repositories and event bus.
    pub fn new(history: H, devices: D, publisher: P) -> Self {
        Self {
            history,
            devices,
            publisher,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, id: DeviceId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Append a reading for an existing device, stamping it with the
    /// current time.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NotFound`] when the device does not exist,
    /// or a storage error from the repositories.
    #[tracing::instrument(skip(self, reading))]
    pub async fn append(
        &self,
        device_id: DeviceId,
        reading: SensorSnapshot,
    ) -> Result<HistoryEntry, FleetError> {
        let device = self.devices.get_by_id(device_id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            }
        })?;

        let lock = self.lock_for(device_id);
        let entry = {
            let _guard = lock.lock().await;
            let entry = HistoryEntry::new(device_id, reading, now());
            let entry = self.history.append(entry).await?;
            // Enqueued under the lock so events carry insertion order.
            self.publisher
                .publish(Event::ReadingAppended {
                    device_name: device.name,
                    entry: entry.clone(),
                })
                .await?;
            entry
        };
        Ok(entry)
    }

    /// Query a device's history window.
    ///
    /// Bounds are inclusive; `from` defaults to the epoch and `to` to now.
    /// When more than `limit` entries fall inside the range, the **newest**
    /// `limit` are kept. Results come back in ascending timestamp order,
    /// insertion order as tiebreak. Entries of deleted devices remain
    /// queryable.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Validation`] when the limit is outside
    /// `1..=1000`, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn query(
        &self,
        device_id: DeviceId,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, FleetError> {
        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
            Some(_) => {
                return Err(ValidationError::single(format!(
                    "limit must be between 1 and {MAX_LIMIT}"
                ))
                .into());
            }
        };
        let from = from.unwrap_or(chrono::DateTime::UNIX_EPOCH);
        let to = to.unwrap_or_else(now);

        self.history.find_in_range(device_id, from, to, limit).await
    }

    /// The most recent entry for a device.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::NotFound`] when the device does not exist or
    /// has no history yet, or a storage error from the repositories.
    #[tracing::instrument(skip(self))]
    pub async fn latest(&self, device_id: DeviceId) -> Result<HistoryEntry, FleetError> {
        if let Some(entry) = self.history.latest(device_id).await? {
            return Ok(entry);
        }
        // Distinguish an unknown device from a known one with no readings.
        let entity = if self.devices.get_by_id(device_id).await?.is_some() {
            "History for device"
        } else {
            "Device"
        };
        Err(NotFoundError {
            entity,
            id: device_id.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use fleethub_domain::device::{Device, DeviceKind, PowerState};
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct InMemoryDeviceRepo {
        store: StdMutex<HashMap<DeviceId, Device>>,
    }

    impl DeviceRepository for InMemoryDeviceRepo {
        fn create(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send {
            let mut store = self.store.lock().unwrap();
            store.insert(device.id, device.clone());
            async { Ok(device) }
        }

        fn get_by_id(
            &self,
            id: DeviceId,
        ) -> impl Future<Output = Result<Option<Device>, FleetError>> + Send {
            let store = self.store.lock().unwrap();
            let result = store.get(&id).cloned();
            async { Ok(result) }
        }

        fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, FleetError>> + Send {
            let store = self.store.lock().unwrap();
            let result: Vec<Device> = store.values().cloned().collect();
            async { Ok(result) }
        }

        fn update(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send {
            let mut store = self.store.lock().unwrap();
            store.insert(device.id, device.clone());
            async { Ok(device) }
        }

        fn delete(&self, id: DeviceId) -> impl Future<Output = Result<bool, FleetError>> + Send {
            let mut store = self.store.lock().unwrap();
            let removed = store.remove(&id).is_some();
            async move { Ok(removed) }
        }
    }

    #[derive(Default)]
    struct InMemoryHistoryRepo {
        entries: StdMutex<Vec<HistoryEntry>>,
    }

    impl HistoryRepository for InMemoryHistoryRepo {
        fn append(
            &self,
            entry: HistoryEntry,
        ) -> impl Future<Output = Result<HistoryEntry, FleetError>> + Send {
            let mut entries = self.entries.lock().unwrap();
            entries.push(entry.clone());
            async { Ok(entry) }
        }

        fn find_in_range(
            &self,
            device_id: DeviceId,
            from: Timestamp,
            to: Timestamp,
            newest: usize,
        ) -> impl Future<Output = Result<Vec<HistoryEntry>, FleetError>> + Send {
            let entries = self.entries.lock().unwrap();
            let mut matching: Vec<HistoryEntry> = entries
                .iter()
                .filter(|e| e.device_id == device_id && e.timestamp >= from && e.timestamp <= to)
                .cloned()
                .collect();
            matching.sort_by_key(|e| e.timestamp);
            let skip = matching.len().saturating_sub(newest);
            let result = matching.split_off(skip);
            async { Ok(result) }
        }

        fn latest(
            &self,
            device_id: DeviceId,
        ) -> impl Future<Output = Result<Option<HistoryEntry>, FleetError>> + Send {
            let entries = self.entries.lock().unwrap();
            let result = entries
                .iter()
                .filter(|e| e.device_id == device_id)
                .next_back()
                .cloned();
            async { Ok(result) }
        }
    }

    type TestService =
        HistoryService<InMemoryHistoryRepo, Arc<InMemoryDeviceRepo>, Arc<InProcessEventBus>>;

    async fn make_service_with_device() -> (TestService, DeviceId) {
        let devices = Arc::new(InMemoryDeviceRepo::default());
        let device = Device::builder()
            .name("T1")
            .kind(DeviceKind::Sensor)
            .build()
            .unwrap();
        let id = device.id;
        devices.create(device).await.unwrap();
        let svc = HistoryService::new(
            InMemoryHistoryRepo::default(),
            devices,
            Arc::new(InProcessEventBus::new(16)),
        );
        (svc, id)
    }

    fn reading(temperature: f64) -> SensorSnapshot {
        SensorSnapshot {
            temperature,
            humidity: 45.0,
            power: PowerState::On,
        }
    }

    #[tokio::test]
    async fn should_append_and_publish_reading() {
        let (svc, id) = make_service_with_device().await;
        let mut rx = svc.publisher.subscribe();

        let entry = svc.append(id, reading(23.0)).await.unwrap();
        assert_eq!(entry.device_id, id);
        assert!((entry.temperature - 23.0).abs() < f64::EPSILON);

        let Event::ReadingAppended { device_name, entry: published } = rx.recv().await.unwrap()
        else {
            panic!("expected reading-appended event");
        };
        assert_eq!(device_name, "T1");
        assert_eq!(published.id, entry.id);
    }

    #[tokio::test]
    async fn should_reject_append_for_unknown_device() {
        let (svc, _) = make_service_with_device().await;
        let result = svc.append(DeviceId::new(), reading(23.0)).await;
        assert!(matches!(result, Err(FleetError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_return_entries_in_ascending_order() {
        let (svc, id) = make_service_with_device().await;
        let first = svc.append(id, reading(20.0)).await.unwrap();
        let second = svc.append(id, reading(21.0)).await.unwrap();

        let entries = svc.query(id, None, None, None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[1].id, second.id);
    }

    #[tokio::test]
    async fn should_keep_newest_entries_when_limited() {
        let (svc, id) = make_service_with_device().await;
        svc.append(id, reading(20.0)).await.unwrap();
        let newest = svc.append(id, reading(21.0)).await.unwrap();

        let entries = svc.query(id, None, None, Some(1)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, newest.id);
    }

    #[tokio::test]
    async fn should_reject_out_of_range_limits() {
        let (svc, id) = make_service_with_device().await;

        let zero = svc.query(id, None, None, Some(0)).await;
        assert!(matches!(zero, Err(FleetError::Validation(_))));

        let too_big = svc.query(id, None, None, Some(MAX_LIMIT + 1)).await;
        assert!(matches!(too_big, Err(FleetError::Validation(_))));
    }

    #[tokio::test]
    async fn should_return_empty_window_for_disjoint_range() {
        let (svc, id) = make_service_with_device().await;
        svc.append(id, reading(20.0)).await.unwrap();

        let past = now() - chrono::Duration::hours(2);
        let entries = svc
            .query(id, None, Some(past), None)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn should_return_latest_entry() {
        let (svc, id) = make_service_with_device().await;
        svc.append(id, reading(20.0)).await.unwrap();
        let newest = svc.append(id, reading(25.0)).await.unwrap();

        let latest = svc.latest(id).await.unwrap();
        assert_eq!(latest.id, newest.id);
    }

    #[tokio::test]
    async fn should_distinguish_missing_device_from_empty_history() {
        let (svc, id) = make_service_with_device().await;

        let empty = svc.latest(id).await.unwrap_err();
        assert!(empty.to_string().contains("History for device"));

        let missing = svc.latest(DeviceId::new()).await.unwrap_err();
        assert!(missing.to_string().starts_with("Device"));
    }
}
