//! History entry — an immutable time-series record of one sensor reading.
//!
//! Entries reference their device by id only; their lifetime is independent
//! of the device's. Deleting a device orphans its history rather than
//! cascading.

use serde::{Deserialize, Serialize};

use crate::device::{PowerState, SensorSnapshot};
use crate::id::{DeviceId, HistoryEntryId};
use crate::time::Timestamp;

/// A historical sensor reading for one device at one point in time.
///
/// Once appended, an entry is never mutated. Entries for a given device are
/// ordered by timestamp, with insertion order as the tiebreak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub device_id: DeviceId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    pub temperature: f64,
    pub humidity: f64,
    pub power: PowerState,
}

impl HistoryEntry {
    /// Create a new entry from a validated reading, assigning a fresh id.
    #[must_use]
    pub fn new(device_id: DeviceId, reading: SensorSnapshot, timestamp: Timestamp) -> Self {
        Self {
            id: HistoryEntryId::new(),
            device_id,
            timestamp,
            temperature: reading.temperature,
            humidity: reading.humidity,
            power: reading.power,
        }
    }

    /// The reading carried by this entry, as a snapshot value.
    #[must_use]
    pub fn reading(&self) -> SensorSnapshot {
        SensorSnapshot {
            temperature: self.temperature,
            humidity: self.humidity,
            power: self.power,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_copy_reading_fields_into_entry() {
        let reading = SensorSnapshot {
            temperature: 23.0,
            humidity: 46.0,
            power: PowerState::On,
        };
        let device_id = DeviceId::new();
        let ts = now();

        let entry = HistoryEntry::new(device_id, reading, ts);

        assert_eq!(entry.device_id, device_id);
        assert_eq!(entry.timestamp, ts);
        assert_eq!(entry.reading(), reading);
    }

    #[test]
    fn should_assign_unique_ids_to_each_entry() {
        let reading = SensorSnapshot::default();
        let device_id = DeviceId::new();
        let a = HistoryEntry::new(device_id, reading, now());
        let b = HistoryEntry::new(device_id, reading, now());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn should_serialize_with_wire_field_names() {
        let entry = HistoryEntry::new(DeviceId::new(), SensorSnapshot::default(), now());
        let json = serde_json::to_value(&entry).unwrap();

        assert!(json["deviceId"].is_string());
        assert!(json["timestamp"].is_i64());
        assert_eq!(json["power"], "off");
    }
}
