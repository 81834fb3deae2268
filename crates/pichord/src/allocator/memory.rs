use super::{Assignment, AssignmentStore, Claim, Claimant, GlobalCounter, table::Table};
use crate::{digits::DigitSequence, error::StoreError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A process-local [`AssignmentStore`].
///
/// The whole table sits behind one [`RwLock`]: reads share it, and
/// [`claim`](AssignmentStore::claim) takes the write half for the
/// check-increment-insert step. Nothing survives a restart.
///
/// ## Recommended When
/// - Tests and demos
/// - Single-process deployments that can afford to lose assignments
///
/// ## See Also
/// - [`FileStore`](crate::FileStore)
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentStore for MemoryStore {
    fn counter(&self) -> Result<GlobalCounter, StoreError> {
        Ok(self.table.read().counter())
    }

    fn get(&self, participant_id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(self.table.read().get(participant_id).cloned())
    }

    fn claim(
        &self,
        participant_id: &str,
        assigned_at: DateTime<Utc>,
        digits: &DigitSequence,
    ) -> Result<Claim, StoreError> {
        self.table
            .write()
            .claim(participant_id, assigned_at, digits)
    }

    fn list(&self) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.table.read().list())
    }

    fn remember(&self, participant_id: &str, claimant: Claimant) -> Result<(), StoreError> {
        self.table.write().remember(participant_id, claimant);
        Ok(())
    }

    fn claimants(&self) -> Result<HashMap<String, Claimant>, StoreError> {
        Ok(self.table.read().claimants())
    }

    fn mark_rendered(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.table.write().mark_rendered(at);
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.table.write().reset();
        Ok(())
    }
}
