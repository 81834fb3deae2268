use super::{Assignment, Claim, Claimant, GlobalCounter};
use crate::{digits::DigitSequence, error::StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The in-memory assignment table shared by every store implementation.
///
/// Rows are keyed by position, with a secondary index by participant. Both
/// keys are unique. The counter is kept alongside the rows so that a single
/// critical section can bump it and insert the row together.
#[derive(Clone, Debug, Default)]
pub(crate) struct Table {
    assigned_count: u64,
    last_rendered_at: Option<DateTime<Utc>>,
    by_position: BTreeMap<u64, Assignment>,
    by_participant: HashMap<String, u64>,
    profiles: BTreeMap<String, Claimant>,
}

/// Serialized form of a [`Table`].
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Snapshot {
    pub assigned_count: u64,
    #[serde(default)]
    pub last_rendered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Claimant>,
}

impl Table {
    pub fn counter(&self) -> GlobalCounter {
        GlobalCounter {
            assigned_count: self.assigned_count,
            last_rendered_at: self.last_rendered_at,
        }
    }

    pub fn get(&self, participant_id: &str) -> Option<&Assignment> {
        self.by_participant
            .get(participant_id)
            .and_then(|position| self.by_position.get(position))
    }

    /// Get-or-create for `participant_id`.
    ///
    /// The counter bump and the row insert happen on the same `&mut self`, so
    /// callers holding the table's write lock observe them as one step. If the
    /// insert is rejected the bump is undone before returning.
    pub fn claim(
        &mut self,
        participant_id: &str,
        assigned_at: DateTime<Utc>,
        digits: &DigitSequence,
    ) -> Result<Claim, StoreError> {
        if let Some(existing) = self.get(participant_id) {
            return Ok(Claim::Existing(existing.clone()));
        }

        self.assigned_count += 1;
        let position = self.assigned_count;
        let assignment = Assignment {
            participant_id: participant_id.to_owned(),
            position,
            digit_at_position: digits.digit_at_position(position),
            assigned_at,
        };

        match self.insert(assignment.clone()) {
            Ok(()) => Ok(Claim::Created(assignment)),
            Err(StoreError::DuplicateParticipant { .. }) => {
                self.assigned_count -= 1;
                self.get(participant_id)
                    .cloned()
                    .map(Claim::Existing)
                    .ok_or_else(|| StoreError::DuplicateParticipant {
                        participant_id: participant_id.to_owned(),
                    })
            }
            Err(err) => {
                self.assigned_count -= 1;
                Err(err)
            }
        }
    }

    fn insert(&mut self, assignment: Assignment) -> Result<(), StoreError> {
        if self.by_participant.contains_key(&assignment.participant_id) {
            return Err(StoreError::DuplicateParticipant {
                participant_id: assignment.participant_id,
            });
        }
        if self.by_position.contains_key(&assignment.position) {
            return Err(StoreError::DuplicatePosition {
                position: assignment.position,
            });
        }
        self.by_participant
            .insert(assignment.participant_id.clone(), assignment.position);
        self.by_position.insert(assignment.position, assignment);
        Ok(())
    }

    pub fn list(&self) -> Vec<Assignment> {
        self.by_position.values().cloned().collect()
    }

    pub fn remember(&mut self, participant_id: &str, claimant: Claimant) {
        self.profiles.insert(participant_id.to_owned(), claimant);
    }

    pub fn claimant(&self, participant_id: &str) -> Option<&Claimant> {
        self.profiles.get(participant_id)
    }

    pub fn claimants(&self) -> HashMap<String, Claimant> {
        self.profiles
            .iter()
            .map(|(id, claimant)| (id.clone(), claimant.clone()))
            .collect()
    }

    pub fn mark_rendered(&mut self, at: DateTime<Utc>) {
        self.last_rendered_at = Some(at);
    }

    /// Clears rows, profiles and the counter together.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            assigned_count: self.assigned_count,
            last_rendered_at: self.last_rendered_at,
            assignments: self.list(),
            profiles: self.profiles.clone(),
        }
    }

    /// Rebuilds a table from a snapshot, enforcing the row invariants.
    ///
    /// Duplicate keys or gaps in the position sequence are rejected. A counter
    /// that disagrees with the row count is reconciled to the row count; the
    /// returned flag reports whether that happened.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<(Self, bool), String> {
        let mut table = Self {
            last_rendered_at: snapshot.last_rendered_at,
            profiles: snapshot.profiles,
            ..Self::default()
        };

        for assignment in snapshot.assignments {
            table.insert(assignment).map_err(|e| e.to_string())?;
        }

        let rows = table.by_position.len() as u64;
        if !table.by_position.keys().copied().eq(1..=rows) {
            return Err(format!("positions are not contiguous over {rows} rows"));
        }
        table.assigned_count = rows;
        Ok((table, snapshot.assigned_count != rows))
    }
}
