//! In-memory record store
//!
//! Useful for tests and ephemeral sessions. Identifiers increase
//! monotonically and are never reused, even after deletes.

use crate::storage::error::StoreResult;
use crate::storage::types::{Reading, Record, RecordId};
use crate::storage::RecordStore;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<RecordId, Reading>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl RecordStore for MemoryStore {
    fn append(&mut self, reading: &Reading) -> StoreResult<RecordId> {
        let id = RecordId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.records.insert(id, reading.clone());
        Ok(id)
    }

    fn fetch_many(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>> {
        let wanted: BTreeSet<RecordId> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| {
                self.records.get(&id).map(|reading| Record {
                    id,
                    reading: reading.clone(),
                })
            })
            .collect())
    }

    fn update_value(&mut self, id: RecordId, value: f64) -> StoreResult<bool> {
        match self.records.get_mut(&id) {
            Some(reading) => {
                reading.value = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&mut self, id: RecordId) -> StoreResult<bool> {
        Ok(self.records.remove(&id).is_some())
    }

    fn scan_all(&self) -> StoreResult<Vec<Record>> {
        let mut records: Vec<Record> = self
            .records
            .iter()
            .map(|(id, reading)| Record {
                id: *id,
                reading: reading.clone(),
            })
            .collect();
        records.sort_by_key(|r| (r.reading.timestamp, r.id));
        Ok(records)
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_never_reused() {
        let mut store = MemoryStore::new();
        let a = store
            .append(&Reading::new(1, "Station_1", "temperature", 1.0))
            .unwrap();
        store.delete(a).unwrap();
        let b = store
            .append(&Reading::new(2, "Station_1", "temperature", 2.0))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_default_store_starts_at_one() {
        let mut store = MemoryStore::default();
        let id = store
            .append(&Reading::new(1, "Station_1", "temperature", 1.0))
            .unwrap();
        assert_eq!(id, RecordId(1));
    }

    #[test]
    fn test_fetch_many_dedups_and_skips_missing() {
        let mut store = MemoryStore::new();
        let a = store
            .append(&Reading::new(1, "Station_1", "humidity", 55.0))
            .unwrap();

        let records = store.fetch_many(&[a, a, RecordId(77)]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reading.metric_name, "humidity");
    }
}
