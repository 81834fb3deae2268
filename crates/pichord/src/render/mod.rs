//! Deterministic chord-diagram rendering.
//!
//! [`render`] is a pure function of an assigned count and a digit sequence:
//! the same inputs yield byte-identical PNGs on every call, in every
//! process. Each [`Resolution`] is drawn independently:
//!
//! 1. a solid background,
//! 2. a ring of ten colored segments, one per digit, clockwise from 12
//!    o'clock,
//! 3. one translucent gradient chord per consecutive pair of positions,
//! 4. a dot outside the ring for every run of two or more equal digits.
//!
//! Where a position lands inside its digit's segment comes from the
//! golden-ratio scatter in [`geometry`], never from an RNG.
//!
//! Chords only accumulate as the count grows, so [`Renderer`] keeps the
//! chord layer of each resolution between passes and strokes only the new
//! chords; [`render`] is the from-scratch equivalent.

mod canvas;
pub mod geometry;
pub mod palette;

use crate::{digits::DigitSequence, error::RenderError};
use bytes::Bytes;
use canvas::ChordLayer;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Largest accepted canvas side.
pub const MAX_DIMENSION: u32 = 8192;

/// A named output size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution named `WIDTHxHEIGHT`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            name: format!("{width}x{height}"),
            width,
            height,
        }
    }

    fn validate(&self) -> Result<(), RenderError> {
        let in_range = |side: u32| (1..=MAX_DIMENSION).contains(&side);
        if in_range(self.width) && in_range(self.height) {
            Ok(())
        } else {
            Err(RenderError::InvalidResolution {
                name: self.name.clone(),
                width: self.width,
                height: self.height,
            })
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Resolution {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RenderError::Malformed(s.to_owned());
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(malformed)?;
        let width = w.trim().parse().map_err(|_| malformed())?;
        let height = h.trim().parse().map_err(|_| malformed())?;
        Ok(Self::new(width, height))
    }
}

/// The validated set of sizes rendered on every pass, plus the name aliased
/// as `latest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionSet {
    resolutions: Vec<Resolution>,
    latest: String,
}

impl ResolutionSet {
    /// Validates `resolutions` and the `latest` alias.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidResolution`] for a zero or oversized side.
    /// - [`RenderError::DuplicateResolution`] if two entries share a name.
    /// - [`RenderError::UnknownLatest`] if `latest` names no entry.
    pub fn new(resolutions: Vec<Resolution>, latest: impl Into<String>) -> Result<Self, RenderError> {
        let latest = latest.into();
        let mut names = std::collections::HashSet::with_capacity(resolutions.len());
        for resolution in &resolutions {
            resolution.validate()?;
            if !names.insert(resolution.name.as_str()) {
                return Err(RenderError::DuplicateResolution(resolution.name.clone()));
            }
        }
        if !names.contains(latest.as_str()) {
            return Err(RenderError::UnknownLatest(latest));
        }
        Ok(Self {
            resolutions,
            latest,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions.iter()
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    /// Name of the resolution served as `latest`.
    pub fn latest(&self) -> &str {
        &self.latest
    }
}

impl Default for ResolutionSet {
    /// Common phone wallpaper sizes, with `1170x2532` as `latest`.
    fn default() -> Self {
        Self {
            resolutions: vec![
                Resolution::new(1170, 2532),
                Resolution::new(1290, 2796),
                Resolution::new(1125, 2436),
                Resolution::new(750, 1334),
            ],
            latest: "1170x2532".to_owned(),
        }
    }
}

/// A complete rendered set: one PNG per resolution name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageSet {
    /// Count the set was rendered for.
    pub assigned_count: u64,
    pub images: BTreeMap<String, Bytes>,
}

impl ImageSet {
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.images.get(name)
    }
}

/// Renders every resolution in `resolutions` for the first `assigned_count`
/// positions, from scratch.
///
/// Either every image succeeds or the first error is returned; a partial set
/// is never produced. [`Renderer`] produces the same bytes incrementally.
#[tracing::instrument(level = "debug", skip(digits, resolutions), fields(resolutions = resolutions.len()))]
pub fn render(
    assigned_count: u64,
    digits: &DigitSequence,
    resolutions: &ResolutionSet,
) -> Result<ImageSet, RenderError> {
    Renderer::new(resolutions.clone()).render(assigned_count, digits)
}

/// Renders a single resolution from scratch.
pub fn render_one(
    resolution: &Resolution,
    assigned_count: u64,
    digits: &DigitSequence,
) -> Result<Bytes, RenderError> {
    resolution.validate()?;
    canvas::draw(resolution, assigned_count, digits).map(Bytes::from)
}

/// Incremental renderer over a fixed [`ResolutionSet`].
///
/// Keeps one chord layer per resolution between passes. A pass for a count
/// at or above the cached one only strokes the new chords before drawing
/// markers and encoding; a smaller count (after a reset) or a missing layer
/// starts over from an empty canvas. Output is byte-identical to [`render`]
/// for the same count and digits.
///
/// The cached layers hold one uncompressed RGBA canvas per resolution.
pub struct Renderer {
    resolutions: ResolutionSet,
    layers: Vec<Option<ChordLayer>>,
}

impl Renderer {
    pub fn new(resolutions: ResolutionSet) -> Self {
        let layers = resolutions.iter().map(|_| None).collect();
        Self {
            resolutions,
            layers,
        }
    }

    /// Renders every resolution for the first `assigned_count` positions.
    ///
    /// Resolutions are drawn on scoped threads.
    pub fn render(
        &mut self,
        assigned_count: u64,
        digits: &DigitSequence,
    ) -> Result<ImageSet, RenderError> {
        let Self {
            resolutions,
            layers,
        } = self;
        let resolutions = &*resolutions;

        let rendered: Vec<Result<(String, Bytes), RenderError>> = std::thread::scope(|s| {
            let handles: Vec<_> = resolutions
                .iter()
                .zip(layers.iter_mut())
                .map(|(resolution, slot)| {
                    s.spawn(move || {
                        render_cached(slot, resolution, assigned_count, digits)
                            .map(|png| (resolution.name.clone(), png))
                    })
                })
                .collect();
            handles
                .into_iter()
                .zip(resolutions.iter())
                .map(|(handle, resolution)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(RenderError::Encode {
                            name: resolution.name.clone(),
                            reason: "render thread panicked".to_owned(),
                        })
                    })
                })
                .collect()
        });

        let images = rendered.into_iter().collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(ImageSet {
            assigned_count,
            images,
        })
    }

    /// Drops every cached layer; the next pass redraws from scratch.
    pub fn clear(&mut self) {
        self.layers.iter_mut().for_each(|slot| *slot = None);
    }

    /// Count each resolution's cached layer was drawn for.
    pub fn cached_counts(&self) -> Vec<Option<u64>> {
        self.layers
            .iter()
            .map(|slot| slot.as_ref().map(ChordLayer::count))
            .collect()
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("resolutions", &self.resolutions)
            .field("cached_counts", &self.cached_counts())
            .finish()
    }
}

/// Advances (or rebuilds) one resolution's layer and encodes it.
///
/// The layer is taken out of its slot while being drawn, so a panic leaves
/// the slot empty instead of holding a half-drawn canvas.
fn render_cached(
    slot: &mut Option<ChordLayer>,
    resolution: &Resolution,
    assigned_count: u64,
    digits: &DigitSequence,
) -> Result<Bytes, RenderError> {
    let mut layer = match slot.take() {
        Some(layer) if layer.count() <= assigned_count => layer,
        _ => ChordLayer::new(resolution)?,
    };
    layer.advance(assigned_count, digits);
    let png = layer.encode(&resolution.name, digits);
    *slot = Some(layer);
    png.map(Bytes::from)
}
