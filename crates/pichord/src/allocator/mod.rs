//! Sequential, idempotent position allocation.
//!
//! Every participant may claim exactly one position. Positions are handed out
//! in arrival order starting at 1, with no gaps and no duplicates, and the
//! claimed digit is always `digits.get(position - 1)`.
//!
//! ## Structure
//!
//! - [`Allocator`] - get-or-create entry point.
//! - [`AssignmentStore`] - persistence seam with an atomic `claim`.
//! - [`MemoryStore`] / [`FileStore`] - shipped store implementations.

mod file;
mod interface;
mod memory;
mod table;
#[cfg(test)]
mod tests;

pub use file::*;
pub use interface::*;
pub use memory::*;

use crate::{
    digits::DigitSequence,
    error::StoreError,
    time::{SystemClock, TimeSource},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One participant's permanent claim on a position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub participant_id: String,
    /// 1-based rank in allocation order.
    pub position: u64,
    pub digit_at_position: u8,
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    /// Returns the digit this assignment's chord starts from, i.e. the digit
    /// of the preceding position. Position 1 has no chord.
    pub fn from_digit(&self, digits: &DigitSequence) -> Option<u8> {
        (self.position > 1).then(|| digits.digit_at_position(self.position - 1))
    }
}

/// The single global counter record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalCounter {
    /// Number of participants ever assigned; also the last position handed
    /// out.
    pub assigned_count: u64,
    /// When an image set was last published. Advisory only.
    pub last_rendered_at: Option<DateTime<Utc>>,
}

/// Public display attributes of a participant.
///
/// Never carries the participant identifier itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claimant {
    pub display_name: Option<String>,
    pub handle: Option<String>,
}

/// Outcome of a get-or-create allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Claim {
    /// A new position was allocated by this call.
    Created(Assignment),
    /// The participant already held a position.
    Existing(Assignment),
}

impl Claim {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn assignment(&self) -> &Assignment {
        match self {
            Self::Created(a) | Self::Existing(a) => a,
        }
    }

    pub fn into_assignment(self) -> Assignment {
        match self {
            Self::Created(a) | Self::Existing(a) => a,
        }
    }
}

/// Hands out positions to participants on top of an [`AssignmentStore`].
///
/// The allocator does a cheap read first so repeat callers never contend for
/// the store's write path, then defers to [`AssignmentStore::claim`] which is
/// atomic with respect to other claims.
///
/// # Example
///
/// ```
/// use pichord::{Allocator, DigitSequence, MemoryStore};
///
/// let allocator = Allocator::new(MemoryStore::new(), DigitSequence::from_text("3.14"));
///
/// let first = allocator.assign("alice").unwrap();
/// assert!(first.is_created());
/// assert_eq!(first.assignment().position, 1);
/// assert_eq!(first.assignment().digit_at_position, 3);
///
/// let again = allocator.assign("alice").unwrap();
/// assert!(!again.is_created());
/// assert_eq!(again.assignment(), first.assignment());
/// ```
#[derive(Debug)]
pub struct Allocator<S, C = SystemClock> {
    store: S,
    digits: DigitSequence,
    clock: C,
}

impl<S: AssignmentStore> Allocator<S> {
    /// Creates an allocator stamping assignments with the system clock.
    pub fn new(store: S, digits: DigitSequence) -> Self {
        Self::with_clock(store, digits, SystemClock)
    }
}

impl<S, C> Allocator<S, C>
where
    S: AssignmentStore,
    C: TimeSource,
{
    pub fn with_clock(store: S, digits: DigitSequence, clock: C) -> Self {
        Self {
            store,
            digits,
            clock,
        }
    }

    /// Returns the participant's assignment, allocating the next position if
    /// this is their first call.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn assign(&self, participant_id: &str) -> Result<Claim, StoreError> {
        if let Some(existing) = self.store.get(participant_id)? {
            return Ok(Claim::Existing(existing));
        }

        let claim = self
            .store
            .claim(participant_id, self.clock.now(), &self.digits)?;
        match &claim {
            Claim::Created(a) => tracing::info!(
                position = a.position,
                digit = a.digit_at_position,
                "Assigned new position"
            ),
            Claim::Existing(a) => tracing::debug!(
                position = a.position,
                "Concurrent duplicate claim resolved to existing position"
            ),
        }
        Ok(claim)
    }

    /// Returns the participant's assignment without allocating.
    pub fn assignment(&self, participant_id: &str) -> Result<Option<Assignment>, StoreError> {
        self.store.get(participant_id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn digits(&self) -> &DigitSequence {
        &self.digits
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
