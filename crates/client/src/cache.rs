//! Local device cache reconciled against server broadcasts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use fleethub_domain::device::{Device, DeviceKind, DeviceStatus, SensorSnapshot};
use fleethub_domain::id::DeviceId;
use fleethub_domain::protocol::{CommandName, ServerMessage};
use fleethub_domain::time::Timestamp;

/// How many recent readings are kept per device.
const DEFAULT_READING_CAPACITY: usize = 50;

/// One reading as observed on the feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingSample {
    pub timestamp: Timestamp,
    pub data: SensorSnapshot,
}

/// Thread-safe local mirror of the fleet state.
///
/// A `device-list` snapshot replaces the whole cache; `sensor-data` and
/// `device-status` messages update single devices in place. Messages for a
/// device the cache has never seen synthesize a placeholder entry rather
/// than being dropped, so out-of-order delivery around a snapshot cannot
/// lose data.
pub struct DeviceCache {
    devices: DashMap<DeviceId, Device>,
    readings: DashMap<DeviceId, VecDeque<ReadingSample>>,
    client_count: AtomicUsize,
    reading_capacity: usize,
}

impl Default for DeviceCache {
    fn default() -> Self {
        Self::with_reading_capacity(DEFAULT_READING_CAPACITY)
    }
}

impl DeviceCache {
    /// Create a cache keeping up to `capacity` recent readings per device.
    #[must_use]
    pub fn with_reading_capacity(capacity: usize) -> Self {
        Self {
            devices: DashMap::new(),
            readings: DashMap::new(),
            client_count: AtomicUsize::new(0),
            reading_capacity: capacity.max(1),
        }
    }

    /// Apply one server message to the cache.
    pub fn apply(&self, message: &ServerMessage) {
        match message {
            ServerMessage::DeviceList { devices, .. } => self.replace_all(devices),
            ServerMessage::SensorData {
                device_id,
                device_name,
                data,
                timestamp,
            } => {
                self.upsert(*device_id, device_name, None, *data, *timestamp);
                self.push_reading(*device_id, *data, *timestamp);
            }
            ServerMessage::DeviceStatus {
                device_id,
                device_name,
                status,
                data,
                timestamp,
            } => {
                self.upsert(*device_id, device_name, Some(*status), *data, *timestamp);
            }
            ServerMessage::ConnectionStatus { client_count, .. } => {
                self.client_count.store(*client_count, Ordering::SeqCst);
            }
            ServerMessage::Error { .. } => {}
        }
    }

    fn replace_all(&self, devices: &[Device]) {
        self.devices.clear();
        for device in devices {
            self.devices.insert(device.id, device.clone());
        }
        // Drop rolling buffers of devices no longer in the fleet.
        self.readings.retain(|id, _| self.devices.contains_key(id));
    }

    fn upsert(
        &self,
        id: DeviceId,
        name: &str,
        status: Option<DeviceStatus>,
        data: SensorSnapshot,
        timestamp: Timestamp,
    ) {
        let mut entry = self.devices.entry(id).or_insert_with(|| Device {
            id,
            name: name.to_string(),
            kind: DeviceKind::Sensor,
            status: DeviceStatus::Online,
            last_update: timestamp,
            data,
        });
        entry.name = name.to_string();
        if let Some(status) = status {
            entry.status = status;
        }
        entry.data = data;
        entry.last_update = entry.last_update.max(timestamp);
    }

    fn push_reading(&self, id: DeviceId, data: SensorSnapshot, timestamp: Timestamp) {
        let mut buffer = self.readings.entry(id).or_default();
        if buffer.len() == self.reading_capacity {
            buffer.pop_front();
        }
        buffer.push_back(ReadingSample { timestamp, data });
    }

    /// Apply the expected effect of a command locally, ahead of the
    /// authoritative broadcast. No-op for devices not in the cache.
    pub fn apply_command_locally(&self, id: DeviceId, command: CommandName, value: Option<f64>) {
        if let Some(mut device) = self.devices.get_mut(&id) {
            match command {
                CommandName::TogglePower => device.data.power = device.data.power.toggled(),
                CommandName::SetTemperature => {
                    if let Some(value) = value {
                        device.data.temperature = value;
                    }
                }
                CommandName::SetHumidity => {
                    if let Some(value) = value {
                        device.data.humidity = value;
                    }
                }
            }
        }
    }

    /// All cached devices.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(|entry| entry.value().clone()).collect()
    }

    /// One cached device by id.
    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices.get(&id).map(|entry| entry.value().clone())
    }

    /// Recent readings observed for a device, oldest first.
    #[must_use]
    pub fn readings(&self, id: DeviceId) -> Vec<ReadingSample> {
        self.readings
            .get(&id)
            .map(|buffer| buffer.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Last client count announced by the hub.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }

    /// Number of cached devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the cache holds no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleethub_domain::device::PowerState;
    use fleethub_domain::time::now;

    fn device(name: &str) -> Device {
        Device::builder()
            .name(name)
            .kind(DeviceKind::Sensor)
            .build()
            .unwrap()
    }

    fn sensor_data(device: &Device, temperature: f64) -> ServerMessage {
        ServerMessage::SensorData {
            device_id: device.id,
            device_name: device.name.clone(),
            data: SensorSnapshot {
                temperature,
                humidity: 45.0,
                power: PowerState::On,
            },
            timestamp: now(),
        }
    }

    #[test]
    fn should_replace_cache_on_snapshot() {
        let cache = DeviceCache::default();
        let stale = device("stale");
        cache.apply(&ServerMessage::DeviceList {
            devices: vec![stale.clone()],
            timestamp: now(),
        });
        cache.apply(&sensor_data(&stale, 20.0));
        assert_eq!(cache.readings(stale.id).len(), 1);

        let fresh = device("fresh");
        cache.apply(&ServerMessage::DeviceList {
            devices: vec![fresh.clone()],
            timestamp: now(),
        });

        assert_eq!(cache.len(), 1);
        assert!(cache.device(stale.id).is_none());
        assert!(cache.device(fresh.id).is_some());
        // Rolling buffer of the removed device is pruned too.
        assert!(cache.readings(stale.id).is_empty());
    }

    #[test]
    fn should_update_device_in_place_on_sensor_data() {
        let cache = DeviceCache::default();
        let device = device("T1");
        cache.apply(&ServerMessage::DeviceList {
            devices: vec![device.clone()],
            timestamp: now(),
        });

        cache.apply(&sensor_data(&device, 25.5));

        let cached = cache.device(device.id).unwrap();
        assert!((cached.data.temperature - 25.5).abs() < f64::EPSILON);
        assert_eq!(cached.data.power, PowerState::On);
        assert_eq!(cache.readings(device.id).len(), 1);
    }

    #[test]
    fn should_synthesize_entry_for_unknown_device() {
        let cache = DeviceCache::default();
        let unknown = device("T9");

        cache.apply(&sensor_data(&unknown, 19.0));

        let cached = cache.device(unknown.id).unwrap();
        assert_eq!(cached.name, "T9");
        assert_eq!(cached.kind, DeviceKind::Sensor);
        assert_eq!(cached.status, DeviceStatus::Online);
    }

    #[test]
    fn should_apply_status_updates() {
        let cache = DeviceCache::default();
        let device = device("T1");
        cache.apply(&ServerMessage::DeviceList {
            devices: vec![device.clone()],
            timestamp: now(),
        });

        cache.apply(&ServerMessage::DeviceStatus {
            device_id: device.id,
            device_name: device.name.clone(),
            status: DeviceStatus::Offline,
            data: device.data,
            timestamp: now(),
        });

        assert_eq!(cache.device(device.id).unwrap().status, DeviceStatus::Offline);
    }

    #[test]
    fn should_cap_rolling_reading_buffer() {
        let cache = DeviceCache::with_reading_capacity(3);
        let device = device("T1");

        for i in 0..5 {
            cache.apply(&sensor_data(&device, f64::from(i)));
        }

        let readings = cache.readings(device.id);
        assert_eq!(readings.len(), 3);
        assert!((readings[0].data.temperature - 2.0).abs() < f64::EPSILON);
        assert!((readings[2].data.temperature - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_track_client_count() {
        let cache = DeviceCache::default();
        cache.apply(&ServerMessage::ConnectionStatus {
            message: "2 clients connected".to_string(),
            client_count: 2,
            timestamp: now(),
        });
        assert_eq!(cache.client_count(), 2);
    }

    #[test]
    fn should_toggle_power_optimistically() {
        let cache = DeviceCache::default();
        let device = device("T1");
        cache.apply(&ServerMessage::DeviceList {
            devices: vec![device.clone()],
            timestamp: now(),
        });

        cache.apply_command_locally(device.id, CommandName::TogglePower, None);
        assert_eq!(cache.device(device.id).unwrap().data.power, PowerState::On);

        cache.apply_command_locally(device.id, CommandName::SetTemperature, Some(21.5));
        let cached = cache.device(device.id).unwrap();
        assert!((cached.data.temperature - 21.5).abs() < f64::EPSILON);
    }
}
