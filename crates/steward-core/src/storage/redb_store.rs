//! # redb-backed Participant Storage
//!
//! One table maps participant id to a framed snapshot (see
//! [`crate::formats`]). Every `put` is its own ACID write transaction; redb
//! gives crash safety and concurrent readers.

use super::ParticipantStore;
use crate::formats::{state_from_bytes, state_to_bytes};
use crate::state::ParticipantLifecycleState;
use crate::types::{ParticipantId, StewardError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for participants: id -> framed state bytes
const PARTICIPANTS: TableDefinition<&str, &[u8]> = TableDefinition::new("participants");

fn io(e: impl std::fmt::Display) -> StewardError {
    StewardError::IoError(e.to_string())
}

/// A disk-backed participant store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StewardError> {
        let db = Database::create(path.as_ref()).map_err(io)?;
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(PARTICIPANTS).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }
        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), StewardError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }
}

impl ParticipantStore for RedbStore {
    fn get(&self, id: &ParticipantId) -> Result<Option<ParticipantLifecycleState>, StewardError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(PARTICIPANTS).map_err(io)?;
        match table.get(id.as_str()).map_err(io)? {
            Some(data) => Ok(Some(state_from_bytes(data.value())?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, state: &ParticipantLifecycleState) -> Result<(), StewardError> {
        let bytes = state_to_bytes(state)?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(PARTICIPANTS).map_err(io)?;
            table
                .insert(state.participant_id.as_str(), bytes.as_slice())
                .map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn contains(&self, id: &ParticipantId) -> Result<bool, StewardError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(PARTICIPANTS).map_err(io)?;
        Ok(table.get(id.as_str()).map_err(io)?.is_some())
    }

    fn ids(&self) -> Result<Vec<ParticipantId>, StewardError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(PARTICIPANTS).map_err(io)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (key, _) = entry.map_err(io)?;
            ids.push(ParticipantId::new(key.value()));
        }
        Ok(ids)
    }

    fn len(&self) -> Result<usize, StewardError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(PARTICIPANTS).map_err(io)?;
        Ok(table.len().map_err(io)? as usize)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{PointBalances, Tier};
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap()
    }

    #[test]
    fn put_and_get() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("steward.redb")).expect("open db");
        let id = ParticipantId::new("p-1");
        assert!(store.get(&id).unwrap().is_none());

        let mut state = ParticipantLifecycleState::enroll(id.clone(), t0());
        state.points = PointBalances::new(5, 6, 7);
        store.put(&state).expect("put");

        assert_eq!(store.get(&id).unwrap(), Some(state));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn put_replaces_existing() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("steward.redb")).expect("open db");
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p-1"), t0());
        store.put(&state).expect("put");
        state.current_tier = Tier::L1;
        store.put(&state).expect("put");

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store.load(&state.participant_id).unwrap().current_tier,
            Tier::L1
        );
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("steward.redb");
        {
            let mut store = RedbStore::open(&path).expect("open db");
            for id in ["b", "a"] {
                store
                    .put(&ParticipantLifecycleState::enroll(ParticipantId::new(id), t0()))
                    .expect("put");
            }
        }
        let store = RedbStore::open(&path).expect("reopen db");
        let ids: Vec<String> = store.ids().unwrap().into_iter().map(|id| id.0).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn compact_and_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("steward.redb");
        {
            let mut store = RedbStore::open(&path).expect("open db");
            store
                .put(&ParticipantLifecycleState::enroll(ParticipantId::new("p"), t0()))
                .expect("put");
            store.compact().expect("compact");
        }
        let store = RedbStore::open(&path).expect("reopen db");
        assert!(store.contains(&ParticipantId::new("p")).unwrap());
    }
}
