use crate::persistence::codec::ReadFrom;
use crate::persistence::codec::WriteTo;
use crate::persistence::{ChangeList, ChangeType, PersistedData, PersistenceError, SnapshotError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Counters kept alongside the record table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_nodes: u64,
    pub total_data_size: u64,
    pub ephemeral_nodes: u64,
    pub max_id: u64,
    pub last_zxid: i64,
}

/// The record table of one store. Only the apply loop and snapshot loading mutate it.
pub(crate) struct DataStore {
    name: String,
    records: BTreeMap<u64, PersistedData>,
    stats: StoreStats,
}

impl DataStore {
    pub(crate) fn new(name: String) -> Self {
        DataStore {
            name,
            records: BTreeMap::new(),
            stats: StoreStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> StoreStats {
        self.stats
    }

    pub(crate) fn get(&self, id: u64) -> Option<&PersistedData> {
        self.records.get(&id)
    }

    /// Records in id order.
    pub(crate) fn records(&self) -> Vec<PersistedData> {
        self.records.values().cloned().collect()
    }

    /// Applies every change of the list. Validates the whole list first so that an inconsistent
    /// list leaves the table untouched.
    pub(crate) fn apply(&mut self, list: &ChangeList) -> Result<(), PersistenceError> {
        self.validate(list)?;

        for change in &list.changes {
            let data = &change.data;
            match change.change_type {
                ChangeType::Add => {
                    self.count(data, 1);
                    self.stats.max_id = self.stats.max_id.max(data.id);
                    self.records.insert(data.id, data.clone());
                }
                ChangeType::Update => {
                    if let Some(previous) = self.records.insert(data.id, data.clone()) {
                        self.count(&previous, -1);
                    }
                    self.count(data, 1);
                }
                ChangeType::Remove => {
                    if let Some(previous) = self.records.remove(&data.id) {
                        self.count(&previous, -1);
                    }
                }
            }
        }
        self.stats.last_zxid = self.stats.last_zxid.max(list.id as i64);

        Ok(())
    }

    fn validate(&self, list: &ChangeList) -> Result<(), PersistenceError> {
        // Ids added or removed earlier in the same list.
        let mut present: BTreeMap<u64, bool> = BTreeMap::new();

        for change in &list.changes {
            let id = change.data.id;
            let exists = present.get(&id).copied().unwrap_or_else(|| self.records.contains_key(&id));
            let now_exists = match (change.change_type, exists) {
                (ChangeType::Add, false) => true,
                (ChangeType::Update, true) => true,
                (ChangeType::Remove, true) => false,
                (change_type, _) => {
                    return Err(PersistenceError::Inconsistent {
                        store: self.name.clone(),
                        message: format!(
                            "change-list {}: {:?} of id {} which {}",
                            list.id,
                            change_type,
                            id,
                            if exists { "already exists" } else { "does not exist" }
                        ),
                    });
                }
            };
            present.insert(id, now_exists);
        }

        Ok(())
    }

    fn count(&mut self, data: &PersistedData, sign: i64) {
        let apply = |counter: &mut u64, delta: u64| {
            if sign > 0 {
                *counter += delta;
            } else {
                *counter = counter.saturating_sub(delta);
            }
        };

        apply(&mut self.stats.total_nodes, 1);
        apply(&mut self.stats.total_data_size, data.data_size() as u64);
        if data.is_ephemeral() {
            apply(&mut self.stats.ephemeral_nodes, 1);
        }
    }

    /// Replaces the whole table, recomputing the counters.
    pub(crate) fn replace(&mut self, records: Vec<PersistedData>, last_zxid: i64) {
        self.records.clear();
        self.stats = StoreStats::default();
        for record in records {
            self.count(&record, 1);
            self.stats.max_id = self.stats.max_id.max(record.id);
            self.stats.last_zxid = self.stats.last_zxid.max(record.stat.mzxid).max(record.stat.pzxid);
            self.records.insert(record.id, record);
        }
        self.stats.last_zxid = self.stats.last_zxid.max(last_zxid);
    }

    pub(crate) fn save_to<W: Write>(&self, writer: &mut W) -> Result<(), SnapshotError> {
        save_records(writer, self.records.values())
    }
}

/// Snapshot layout: `u64` record count followed by that many serialized records.
pub fn save_records<'a, W, I>(writer: &mut W, records: I) -> Result<(), SnapshotError>
where
    W: Write,
    I: ExactSizeIterator<Item = &'a PersistedData>,
{
    writer.write_u64::<LittleEndian>(records.len() as u64)?;
    for record in records {
        record.write_to(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_records<R: Read>(reader: &mut R) -> Result<Vec<PersistedData>, SnapshotError> {
    let count = reader.read_u64::<LittleEndian>()?;
    let mut records = Vec::with_capacity((count as usize).min(64 * 1024));
    for _ in 0..count {
        records.push(PersistedData::read_from(reader)?);
    }

    let mut ids = std::collections::HashSet::with_capacity(records.len());
    for record in &records {
        if !ids.insert(record.id) {
            return Err(SnapshotError::Inconsistent(format!("duplicate record id {}", record.id)));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::persisted_data::tests::record;
    use crate::persistence::Change;
    use bytes::Bytes;

    fn store_with_root() -> DataStore {
        let mut store = DataStore::new("test".to_string());
        store
            .apply(&ChangeList::new(1, vec![Change::add(record(1, "", 0))]))
            .unwrap();
        store
    }

    #[test]
    fn counters_follow_changes() {
        let mut store = store_with_root();
        let mut child = record(2, "a", 1);
        child.data = Some(Bytes::from_static(b"1234"));
        child.ephemeral_owner = 9;

        store.apply(&ChangeList::new(2, vec![Change::add(child.clone())])).unwrap();
        assert_eq!(
            store.stats(),
            StoreStats {
                total_nodes: 2,
                total_data_size: 4,
                ephemeral_nodes: 1,
                max_id: 2,
                last_zxid: 2,
            }
        );

        child.data = Some(Bytes::from_static(b"12"));
        store.apply(&ChangeList::new(3, vec![Change::update(child.clone())])).unwrap();
        assert_eq!(store.stats().total_data_size, 2);

        store.apply(&ChangeList::new(4, vec![Change::remove(child)])).unwrap();
        assert_eq!(store.stats().total_nodes, 1);
        assert_eq!(store.stats().ephemeral_nodes, 0);
        assert_eq!(store.stats().max_id, 2);
        assert_eq!(store.stats().last_zxid, 4);
    }

    #[test]
    fn inconsistent_list_leaves_store_untouched() {
        let mut store = store_with_root();
        let list = ChangeList::new(
            2,
            vec![Change::add(record(2, "a", 1)), Change::remove(record(3, "b", 1))],
        );

        assert!(matches!(store.apply(&list), Err(PersistenceError::Inconsistent { .. })));
        assert!(store.get(2).is_none());
        assert_eq!(store.stats().total_nodes, 1);

        let duplicate = ChangeList::new(2, vec![Change::add(record(1, "", 0))]);
        assert!(store.apply(&duplicate).is_err());
    }

    #[test]
    fn add_then_remove_in_one_list_is_consistent() {
        let mut store = store_with_root();
        let list = ChangeList::new(
            2,
            vec![Change::add(record(2, "a", 1)), Change::remove(record(2, "a", 1))],
        );
        store.apply(&list).unwrap();
        assert_eq!(store.stats().total_nodes, 1);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut store = store_with_root();
        store
            .apply(&ChangeList::new(2, vec![Change::add(record(2, "a", 1))]))
            .unwrap();

        let mut buf = Vec::new();
        store.save_to(&mut buf).unwrap();

        let mut reloaded = DataStore::new("reloaded".to_string());
        reloaded.replace(load_records(&mut buf.as_slice()).unwrap(), 0);

        assert_eq!(reloaded.records(), store.records());
        assert_eq!(reloaded.stats().total_nodes, 2);
        assert_eq!(reloaded.stats().max_id, 2);

        let mut again = Vec::new();
        reloaded.save_to(&mut again).unwrap();
        assert_eq!(again, buf);
    }

    #[test]
    fn duplicate_ids_in_snapshot_are_rejected() {
        let mut buf = Vec::new();
        let records = vec![record(1, "", 0), record(1, "", 0)];
        save_records(&mut buf, records.iter()).unwrap();
        assert!(matches!(
            load_records(&mut buf.as_slice()),
            Err(SnapshotError::Inconsistent(_))
        ));
    }
}
