#![doc = include_str!("../README.md")]

pub mod allocator;
mod digits;
mod error;
pub mod publish;
pub mod render;
pub mod service;
mod time;
pub mod timeline;

pub use crate::allocator::{
    Allocator, Assignment, AssignmentStore, Claim, Claimant, FileStore, GlobalCounter, MemoryStore,
};
pub use crate::digits::*;
pub use crate::error::*;
pub use crate::publish::{ImageStore, WallpaperUrls};
pub use crate::render::{ImageSet, Renderer, Resolution, ResolutionSet, render};
pub use crate::service::{
    AssignmentView, ChordService, RenderObserver, RenderReport, SequenceState,
};
pub use crate::time::*;
pub use crate::timeline::TimelineEntry;
