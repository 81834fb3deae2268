//! The service object shared by every request handler.
//!
//! [`ChordService`] owns the allocator, the incremental renderer and the
//! image store, and sequences the "assign, then re-render" flow. It is
//! constructed once at startup and shared behind an `Arc`.

use crate::{
    allocator::{Allocator, Assignment, AssignmentStore, Claim, Claimant},
    digits::DigitSequence,
    error::Result,
    publish::{ImageStore, WallpaperUrls},
    render::{Renderer, ResolutionSet},
    time::{SystemClock, TimeSource},
    timeline::{self, TimelineEntry},
    Error,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Public snapshot of the sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceState {
    pub total_assigned: u64,
    /// Highest position handed out so far, `0` when empty.
    pub current_position: u64,
    pub last_rendered_at: Option<DateTime<Utc>>,
}

/// An assignment as returned to its owner, with the chord it contributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub position: u64,
    pub digit_at_position: u8,
    /// Digit of the preceding position; `None` for position 1.
    pub from_digit: Option<u8>,
    pub to_digit: u8,
    pub assigned_at: DateTime<Utc>,
}

impl AssignmentView {
    pub fn new(assignment: &Assignment, digits: &DigitSequence) -> Self {
        Self {
            position: assignment.position,
            digit_at_position: assignment.digit_at_position,
            from_digit: assignment.from_digit(digits),
            to_digit: assignment.digit_at_position,
            assigned_at: assignment.assigned_at,
        }
    }
}

/// Summary of one completed render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderReport {
    pub assigned_count: u64,
    pub elapsed: Duration,
}

/// Receives the outcome of every render pass.
///
/// The server uses this to feed metrics; the default methods do nothing.
pub trait RenderObserver: Send + Sync {
    fn rendered(&self, _report: &RenderReport) {}
    fn failed(&self, _error: &Error) {}
}

impl RenderObserver for () {}

pub struct ChordService<S, C = SystemClock> {
    allocator: Allocator<S, C>,
    images: ImageStore<C>,
    /// Also serves as the render lock: one pass at a time.
    renderer: Mutex<Renderer>,
    observer: Box<dyn RenderObserver>,
}

impl<S: AssignmentStore> ChordService<S> {
    pub fn new(
        store: S,
        digits: DigitSequence,
        resolutions: ResolutionSet,
        images: ImageStore,
    ) -> Self {
        Self::with_clock(store, digits, resolutions, images, SystemClock)
    }
}

impl<S, C> ChordService<S, C>
where
    S: AssignmentStore,
    C: TimeSource,
{
    /// Builds a service whose assignments and render timestamps use `clock`.
    /// `images` should share the same clock for its cache-busting tokens.
    pub fn with_clock(
        store: S,
        digits: DigitSequence,
        resolutions: ResolutionSet,
        images: ImageStore<C>,
        clock: C,
    ) -> Self {
        Self {
            allocator: Allocator::with_clock(store, digits, clock),
            images,
            renderer: Mutex::new(Renderer::new(resolutions)),
            observer: Box::new(()),
        }
    }

    pub fn with_observer(mut self, observer: impl RenderObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Returns the participant's assignment, allocating one on first call.
    ///
    /// A newly created assignment triggers a synchronous re-render so the
    /// caller's chord is visible in the next image fetch, unless a pass that
    /// already includes it finished while this call waited for the render
    /// lock. Render or publish failures are logged and do not fail the
    /// assignment.
    pub fn assign(&self, participant_id: &str) -> Result<Claim> {
        let claim = self.allocator.assign(participant_id)?;
        if claim.is_created() {
            if let Err(err) = self.catch_up() {
                tracing::error!(
                    position = claim.assignment().position,
                    error = %err,
                    "Re-render after assignment failed"
                );
            }
        }
        Ok(claim)
    }

    pub fn assignment(&self, participant_id: &str) -> Result<Option<Assignment>> {
        Ok(self.allocator.assignment(participant_id)?)
    }

    /// Wraps `assignment` with its chord endpoints.
    pub fn view(&self, assignment: &Assignment) -> AssignmentView {
        AssignmentView::new(assignment, self.allocator.digits())
    }

    /// Upserts the public profile of a participant.
    pub fn remember(&self, participant_id: &str, claimant: Claimant) -> Result<()> {
        Ok(self.allocator.store().remember(participant_id, claimant)?)
    }

    pub fn state(&self) -> Result<SequenceState> {
        let counter = self.allocator.store().counter()?;
        Ok(SequenceState {
            total_assigned: counter.assigned_count,
            current_position: counter.assigned_count,
            last_rendered_at: counter.last_rendered_at,
        })
    }

    pub fn timeline(&self) -> Result<Vec<TimelineEntry>> {
        let store = self.allocator.store();
        let assignments = store.list()?;
        let claimants = store.claimants()?;
        Ok(timeline::project(
            self.allocator.digits(),
            &assignments,
            &claimants,
        ))
    }

    pub fn wallpaper_urls(&self) -> WallpaperUrls {
        self.images.urls()
    }

    /// Returns published PNG bytes for a resolution name or `latest`.
    pub fn image(&self, name: &str) -> Option<Bytes> {
        self.images.get(name)
    }

    pub fn has_published(&self) -> bool {
        !self.images.is_empty()
    }

    /// Renders every resolution for the current count and publishes the set,
    /// even if the published set already shows that count.
    ///
    /// Passes are serialized, and the count is read once the pass holds the
    /// lock, so the last pass to finish always reflects the newest count.
    pub fn rerender(&self) -> Result<RenderReport> {
        let mut renderer = self.renderer.lock();
        let result = self.render_locked(&mut renderer);
        self.observe(result)
    }

    /// Like [`rerender`](Self::rerender), but returns `Ok(None)` without
    /// drawing when the published set already shows the current count.
    ///
    /// A burst of first-time assignments queued on the lock is thereby
    /// served by the first pass that sees all of them.
    fn catch_up(&self) -> Result<Option<RenderReport>> {
        let mut renderer = self.renderer.lock();
        let assigned_count = self.allocator.store().counter()?.assigned_count;
        let published = self.images.current().map(|set| set.assigned_count);
        if published == Some(assigned_count) {
            tracing::debug!(assigned_count, "Published set already current");
            return Ok(None);
        }
        let result = self.render_locked(&mut renderer);
        self.observe(result).map(Some)
    }

    fn observe(&self, result: Result<RenderReport>) -> Result<RenderReport> {
        match &result {
            Ok(report) => self.observer.rendered(report),
            Err(err) => self.observer.failed(err),
        }
        result
    }

    fn render_locked(&self, renderer: &mut Renderer) -> Result<RenderReport> {
        let started = Instant::now();
        let assigned_count = self.allocator.store().counter()?.assigned_count;
        let images = renderer.render(assigned_count, self.allocator.digits())?;
        self.images.publish(images)?;
        self.allocator
            .store()
            .mark_rendered(self.allocator.clock().now())?;

        let report = RenderReport {
            assigned_count,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            assigned_count,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Rendered image set"
        );
        Ok(report)
    }

    /// Renders once if nothing has been published yet.
    pub fn ensure_rendered(&self) -> Result<Option<RenderReport>> {
        if self.has_published() {
            return Ok(None);
        }
        self.rerender().map(Some)
    }

    /// Clears every assignment, profile and published image, then renders
    /// the empty diagram. The whole sequence runs under the render lock.
    pub fn reset(&self) -> Result<RenderReport> {
        let mut renderer = self.renderer.lock();
        self.allocator.store().reset()?;
        self.images.clear();
        renderer.clear();
        tracing::warn!("Sequence reset");

        let result = self.render_locked(&mut renderer);
        self.observe(result)
    }
}
