//! Atomic store for the published value snapshot

use crate::{
    error::ValueError,
    types::{MeterValue, ValueEntry, ValueSnapshot},
};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Read-only registry of the eight published values.
///
/// Writes replace the whole snapshot under a single lock acquisition, so an
/// observer never sees a mix of old and new entries. Stale entries are
/// served flagged rather than withheld: with a multi-day upstream reporting
/// lag, a retained value is more useful than a blank one.
pub struct ValueRegistry {
    snapshot: RwLock<ValueSnapshot>,
}

impl ValueRegistry {
    /// Creates an empty registry; values appear after the first cycle
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(ValueSnapshot::empty()),
        }
    }

    /// Replaces every published entry in one step
    pub async fn publish(&self, entries: HashMap<MeterValue, ValueEntry>) {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = ValueSnapshot {
            entries,
            published_at: Some(Utc::now()),
        };
    }

    /// Returns a consistent copy of the current snapshot
    pub async fn snapshot(&self) -> ValueSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Reads one published value.
    ///
    /// # Returns
    /// The entry (possibly flagged stale), or [`ValueError::NotAvailable`]
    /// when the value was never published or is marked unavailable.
    pub async fn get(&self, value: MeterValue) -> Result<ValueEntry, ValueError> {
        let snapshot = self.snapshot.read().await;
        match snapshot.entries.get(&value) {
            Some(entry) if entry.available => Ok(*entry),
            _ => Err(ValueError::not_available(value)),
        }
    }

    /// Flags every entry unavailable, used when credentials are rejected
    pub async fn mark_all_unavailable(&self) {
        let mut snapshot = self.snapshot.write().await;
        for entry in snapshot.entries.values_mut() {
            entry.available = false;
        }
    }

    /// Flags every entry stale after a failed refresh; values are retained
    pub async fn mark_all_stale(&self) {
        let mut snapshot = self.snapshot.write().await;
        for entry in snapshot.entries.values_mut() {
            entry.stale = true;
        }
    }
}

impl Default for ValueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_set(value: f64) -> HashMap<MeterValue, ValueEntry> {
        MeterValue::all()
            .iter()
            .map(|v| (*v, ValueEntry::fresh(value, Utc::now())))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_registry_serves_nothing() {
        let registry = ValueRegistry::new();
        assert!(registry.get(MeterValue::TotalCost).await.is_err());
        assert!(registry.snapshot().await.published_at.is_none());
    }

    #[tokio::test]
    async fn test_publish_replaces_the_full_set() {
        let registry = ValueRegistry::new();
        registry.publish(full_set(1.0)).await;
        registry.publish(full_set(2.0)).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.entries.len(), 8);
        assert!(snapshot.published_at.is_some());
        // No mix of old and new values survives a publish
        for value in MeterValue::all() {
            assert!((snapshot.get(*value).unwrap().value - 2.0).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_stale_entries_are_served_flagged() {
        let registry = ValueRegistry::new();
        registry.publish(full_set(3.39)).await;
        registry.mark_all_stale().await;

        let entry = registry.get(MeterValue::ElectricityCost).await.unwrap();
        assert!(entry.stale);
        assert!((entry.value - 3.39).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unavailable_entries_are_withheld() {
        let registry = ValueRegistry::new();
        registry.publish(full_set(3.39)).await;
        registry.mark_all_unavailable().await;

        assert!(registry.get(MeterValue::ElectricityCost).await.is_err());
        // The snapshot still exposes the flags for diagnostics
        let snapshot = registry.snapshot().await;
        assert!(snapshot.entries.values().all(|entry| !entry.available));
    }
}
