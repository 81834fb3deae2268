//! Error types for the allocation and rendering pipeline.
//!
//! Each component owns a narrow error enum, and [`Error`] unifies them at the
//! [`ChordService`] boundary:
//!
//! - [`StoreError`]: persistence failures and uniqueness violations raised by
//!   an [`AssignmentStore`].
//! - [`RenderError`]: invalid canvas sizes or PNG encoding failures.
//! - [`PublishError`]: failures mirroring a rendered set to disk.
//!
//! A duplicate participant on insert is not an error from the caller's
//! perspective; stores translate it into the existing assignment.
//!
//! [`ChordService`]: crate::ChordService
//! [`AssignmentStore`]: crate::AssignmentStore

use std::path::PathBuf;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type surfaced by [`ChordService`](crate::ChordService).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The assignment store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Rendering one of the configured resolutions failed.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The rendered set could not be published.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Failures raised by an [`AssignmentStore`](crate::AssignmentStore).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A row for this participant already exists.
    #[error("participant {participant_id:?} already holds a position")]
    DuplicateParticipant { participant_id: String },

    /// A row for this position already exists.
    #[error("position {position} is already assigned")]
    DuplicatePosition { position: u64 },

    /// The persisted snapshot violates the table invariants.
    #[error("corrupt snapshot at {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Reading or writing the snapshot failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be (de)serialized.
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Failures raised while rendering an image set.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The resolution cannot back a canvas.
    #[error("invalid resolution {name}: {width}x{height}")]
    InvalidResolution {
        name: String,
        width: u32,
        height: u32,
    },

    /// A resolution spec is not of the form `WIDTHxHEIGHT`.
    #[error("malformed resolution {0:?}, expected WIDTHxHEIGHT")]
    Malformed(String),

    /// Two resolutions share a name.
    #[error("duplicate resolution {0}")]
    DuplicateResolution(String),

    /// The latest alias names a resolution outside the set.
    #[error("latest alias {0} is not a configured resolution")]
    UnknownLatest(String),

    /// PNG encoding failed.
    #[error("failed to encode {name}: {reason}")]
    Encode { name: String, reason: String },
}

/// Failures raised while publishing an image set.
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    /// The latest alias points at a resolution missing from the set.
    #[error("image set has no {0:?} entry to alias as latest")]
    MissingAlias(String),

    /// Mirroring to the wallpaper directory failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
