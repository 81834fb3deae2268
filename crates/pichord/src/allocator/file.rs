use super::{
    Assignment, AssignmentStore, Claim, Claimant, GlobalCounter,
    table::{Snapshot, Table},
};
use crate::{digits::DigitSequence, error::StoreError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// An [`AssignmentStore`] persisted as a JSON snapshot on disk.
///
/// Every mutation is applied to a copy of the table, written to a temporary
/// sibling file, renamed over the snapshot and only then swapped in. A failed
/// write leaves both the file and the in-memory table untouched, so the
/// counter can never drift from the rows.
///
/// ## Recommended When
/// - Single-node deployments that need assignments to survive restarts
///
/// ## See Also
/// - [`MemoryStore`](crate::MemoryStore)
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: RwLock<Table>,
}

impl FileStore {
    /// Opens the snapshot at `path`, or starts empty if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Io`] if the file exists but cannot be read.
    /// - [`StoreError::Encoding`] if it is not a valid snapshot.
    /// - [`StoreError::Corrupt`] if rows are duplicated or positions have
    ///   gaps.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = match fs::read(&path) {
            Ok(raw) => {
                let snapshot: Snapshot = serde_json::from_slice(&raw)?;
                let claimed = snapshot.assigned_count;
                let (table, reconciled) =
                    Table::from_snapshot(snapshot).map_err(|reason| StoreError::Corrupt {
                        path: path.clone(),
                        reason,
                    })?;
                if reconciled {
                    tracing::warn!(
                        path = %path.display(),
                        recorded = claimed,
                        rows = table.counter().assigned_count,
                        "Counter disagreed with assignment rows; reconciled to row count"
                    );
                }
                table
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Table::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::info!(
            path = %path.display(),
            assigned = table.counter().assigned_count,
            "Opened assignment store"
        );
        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    /// Applies `mutate` to a copy of the table and makes it visible only once
    /// the copy is on disk.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self.table.write();
        let mut next = table.clone();
        let out = mutate(&mut next)?;
        self.persist(&next)?;
        *table = next;
        Ok(out)
    }

    fn persist(&self, table: &Table) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(&table.snapshot())?;
        let tmp = self.path.with_extension("tmp");
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| StoreError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
        file.write_all(&encoded).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(io_err(&self.path))
    }
}

impl AssignmentStore for FileStore {
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
        let mut table = self.table.write();
        if let Some(existing) = table.get(participant_id) {
            return Ok(Claim::Existing(existing.clone()));
        }
        let mut next = table.clone();
        let claim = next.claim(participant_id, assigned_at, digits)?;
        self.persist(&next)?;
        *table = next;
        Ok(claim)
    }

    fn list(&self) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.table.read().list())
    }

    fn remember(&self, participant_id: &str, claimant: Claimant) -> Result<(), StoreError> {
        if self.table.read().claimant(participant_id) == Some(&claimant) {
            return Ok(());
        }
        self.commit(|table| {
            table.remember(participant_id, claimant);
            Ok(())
        })
    }

    fn claimants(&self) -> Result<HashMap<String, Claimant>, StoreError> {
        Ok(self.table.read().claimants())
    }

    fn mark_rendered(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.commit(|table| {
            table.mark_rendered(at);
            Ok(())
        })
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.commit(|table| {
            table.reset();
            Ok(())
        })
    }
}
