//! Storage ports — repository traits for persistence.

use std::future::Future;

use fleethub_domain::device::Device;
use fleethub_domain::error::FleetError;
use fleethub_domain::history::HistoryEntry;
use fleethub_domain::id::DeviceId;
use fleethub_domain::time::Timestamp;

/// Repository for the device registry.
pub trait DeviceRepository {
    /// Persist a new device.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send;

    /// Get a device by its unique identifier.
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, FleetError>> + Send;

    /// Get every registered device.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, FleetError>> + Send;

    /// Replace the stored record for an existing device.
    fn update(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send;

    /// Delete a device by id. Returns whether a record was removed.
    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<bool, FleetError>> + Send;
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for std::sync::Arc<T> {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send {
        (**self).create(device)
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, FleetError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, FleetError>> + Send {
        (**self).get_all()
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, FleetError>> + Send {
        (**self).update(device)
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<bool, FleetError>> + Send {
        (**self).delete(id)
    }
}

/// Repository for the append-only history store.
///
/// Entries keep their device id after the device is deleted; nothing here
/// cascades.
pub trait HistoryRepository {
    /// Persist a new entry.
    fn append(
        &self,
        entry: HistoryEntry,
    ) -> impl Future<Output = Result<HistoryEntry, FleetError>> + Send;

    /// The newest `newest` entries for `device_id` with
    /// `from <= timestamp <= to`, returned in ascending timestamp order
    /// (insertion order as tiebreak).
    fn find_in_range(
        &self,
        device_id: DeviceId,
        from: Timestamp,
        to: Timestamp,
        newest: usize,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, FleetError>> + Send;

    /// The single most recent entry for `device_id`, if any.
    fn latest(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<HistoryEntry>, FleetError>> + Send;
}

impl<T: HistoryRepository + Send + Sync> HistoryRepository for std::sync::Arc<T> {
    fn append(
        &self,
        entry: HistoryEntry,
    ) -> impl Future<Output = Result<HistoryEntry, FleetError>> + Send {
        (**self).append(entry)
    }

    fn find_in_range(
        &self,
        device_id: DeviceId,
        from: Timestamp,
        to: Timestamp,
        newest: usize,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, FleetError>> + Send {
        (**self).find_in_range(device_id, from, to, newest)
    }

    fn latest(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<HistoryEntry>, FleetError>> + Send {
        (**self).latest(device_id)
    }
}
