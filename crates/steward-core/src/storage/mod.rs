//! # Participant Storage
//!
//! Hosts keep one [`ParticipantLifecycleState`] per participant. The engine
//! never reads a store itself; callers load a state, run an operation and
//! write the returned state back.
//!
//! Two backends:
//! - [`MemoryStore`]: in-memory `BTreeMap` (tests, ephemeral servers)
//! - [`RedbStore`]: disk-backed redb table of framed snapshots

mod redb_store;

pub use redb_store::RedbStore;

use crate::state::ParticipantLifecycleState;
use crate::types::{ParticipantId, StewardError};
use std::collections::BTreeMap;

/// Keyed storage of participant states.
pub trait ParticipantStore: Send + Sync {
    fn get(&self, id: &ParticipantId) -> Result<Option<ParticipantLifecycleState>, StewardError>;

    /// Insert or replace the state under its own participant id.
    fn put(&mut self, state: &ParticipantLifecycleState) -> Result<(), StewardError>;

    fn contains(&self, id: &ParticipantId) -> Result<bool, StewardError>;

    /// All stored ids in ascending order.
    fn ids(&self) -> Result<Vec<ParticipantId>, StewardError>;

    fn len(&self) -> Result<usize, StewardError> {
        Ok(self.ids()?.len())
    }

    /// Load a state, failing with `ParticipantNotFound` when absent.
    fn load(&self, id: &ParticipantId) -> Result<ParticipantLifecycleState, StewardError> {
        self.get(id)?
            .ok_or_else(|| StewardError::ParticipantNotFound(id.clone()))
    }
}

/// In-memory participant store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    states: BTreeMap<ParticipantId, ParticipantLifecycleState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParticipantStore for MemoryStore {
    fn get(&self, id: &ParticipantId) -> Result<Option<ParticipantLifecycleState>, StewardError> {
        Ok(self.states.get(id).cloned())
    }

    fn put(&mut self, state: &ParticipantLifecycleState) -> Result<(), StewardError> {
        self.states
            .insert(state.participant_id.clone(), state.clone());
        Ok(())
    }

    fn contains(&self, id: &ParticipantId) -> Result<bool, StewardError> {
        Ok(self.states.contains_key(id))
    }

    fn ids(&self) -> Result<Vec<ParticipantId>, StewardError> {
        Ok(self.states.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, StewardError> {
        Ok(self.states.len())
    }
}
