//! Health observations and the shared status table

use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};

/// JSON keys owned by the status itself; details never override them.
pub const RESERVED_KEYS: [&str; 2] = ["healthy", "didChange"];

/// One observation produced by a probe provider.
///
/// `did_change` is computed by the provider, not derived locally. Provider
/// specific fields are carried in `details` and flattened into the JSON
/// object sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    pub did_change: bool,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl HealthStatus {
    pub fn new(healthy: bool, did_change: bool) -> Self {
        Self {
            healthy,
            did_change,
            details: Map::new(),
        }
    }

    /// Adds a provider specific field. Reserved keys are dropped.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if is_reserved(&key) {
            tracing::warn!(key = %key, "ignoring status detail with reserved key");
            return self;
        }
        self.details.insert(key, value.into());
        self
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

impl Serialize for HealthStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let details: Vec<_> = self
            .details
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .collect();

        let mut map = serializer.serialize_map(Some(details.len() + 2))?;
        map.serialize_entry("healthy", &self.healthy)?;
        map.serialize_entry("didChange", &self.did_change)?;
        for (key, value) in details {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Fixed-size table of the latest observation per monitor, index-aligned
/// with the monitor list it was built for.
///
/// Each slot has exactly one writer (its supervisor). The table is never
/// resized: reconfiguration builds a new table instead.
#[derive(Debug)]
pub struct StatusTable {
    slots: Box<[Mutex<HealthStatus>]>,
}

impl StatusTable {
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| Mutex::new(HealthStatus::default())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stores the latest observation for a monitor. Out-of-range writes are ignored.
    pub fn set(&self, index: usize, status: HealthStatus) {
        match self.slots.get(index) {
            Some(slot) => *slot.lock() = status,
            None => tracing::warn!(index, len = self.len(), "status write out of range"),
        }
    }

    pub fn get(&self, index: usize) -> Option<HealthStatus> {
        self.slots.get(index).map(|slot| slot.lock().clone())
    }

    /// Copies every slot, in monitor order.
    pub fn snapshot(&self) -> Vec<HealthStatus> {
        self.slots.iter().map(|slot| slot.lock().clone()).collect()
    }
}
