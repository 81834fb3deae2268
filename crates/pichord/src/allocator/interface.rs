use super::{Assignment, Claim, Claimant, GlobalCounter};
use crate::{digits::DigitSequence, error::StoreError};
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};

/// Persistence seam for the allocator.
///
/// Implementations own the global counter, the assignment rows and the
/// claimant profiles. Reads may be served from a snapshot that lags a
/// concurrent write; writes must be linearizable.
///
/// # Atomicity
///
/// [`claim`] is the only operation that allocates. It must check for an
/// existing row, increment the counter and insert the new row inside one
/// critical section, so two concurrent first-time calls can never observe the
/// same position and a duplicate call for the same participant can never bump
/// the counter twice. A participant uniqueness violation on insert is
/// reported as [`Claim::Existing`], never as an error.
///
/// [`claim`]: AssignmentStore::claim
pub trait AssignmentStore: Send + Sync {
    /// Returns the counter record. An untouched store reads as zero.
    fn counter(&self) -> Result<GlobalCounter, StoreError>;

    /// Returns the assignment held by `participant_id`, if any.
    fn get(&self, participant_id: &str) -> Result<Option<Assignment>, StoreError>;

    /// Atomically returns the existing assignment for `participant_id` or
    /// allocates the next position for it.
    fn claim(
        &self,
        participant_id: &str,
        assigned_at: DateTime<Utc>,
        digits: &DigitSequence,
    ) -> Result<Claim, StoreError>;

    /// Returns every assignment ordered by position ascending.
    fn list(&self) -> Result<Vec<Assignment>, StoreError>;

    /// Records the public display attributes of a participant.
    fn remember(&self, participant_id: &str, claimant: Claimant) -> Result<(), StoreError>;

    /// Returns the known display attributes keyed by participant.
    fn claimants(&self) -> Result<HashMap<String, Claimant>, StoreError>;

    /// Stamps the counter record with the time of the last published render.
    fn mark_rendered(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Deletes all rows and profiles and zeroes the counter, all or nothing.
    fn reset(&self) -> Result<(), StoreError>;
}

macro_rules! forward_store {
    ($($wrapper:ident),*) => {
        $(
            impl<S: AssignmentStore + ?Sized> AssignmentStore for $wrapper<S> {
                fn counter(&self) -> Result<GlobalCounter, StoreError> {
                    (**self).counter()
                }

                fn get(&self, participant_id: &str) -> Result<Option<Assignment>, StoreError> {
                    (**self).get(participant_id)
                }

                fn claim(
                    &self,
                    participant_id: &str,
                    assigned_at: DateTime<Utc>,
                    digits: &DigitSequence,
                ) -> Result<Claim, StoreError> {
                    (**self).claim(participant_id, assigned_at, digits)
                }

                fn list(&self) -> Result<Vec<Assignment>, StoreError> {
                    (**self).list()
                }

                fn remember(&self, participant_id: &str, claimant: Claimant) -> Result<(), StoreError> {
                    (**self).remember(participant_id, claimant)
                }

                fn claimants(&self) -> Result<HashMap<String, Claimant>, StoreError> {
                    (**self).claimants()
                }

                fn mark_rendered(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
                    (**self).mark_rendered(at)
                }

                fn reset(&self) -> Result<(), StoreError> {
                    (**self).reset()
                }
            }
        )*
    };
}

forward_store!(Box, Arc);
