use super::{
    geometry::{anchor_angle, bisector, clusters, segment_arc, SEGMENTS},
    palette::{background, digit_color, CHORD_ALPHA, MARKER_ALPHA},
    Resolution,
};
use crate::{digits::DigitSequence, error::RenderError};
use tiny_skia::{
    FillRule, GradientStop, LineCap, LinearGradient, Paint, PathBuilder, Pixmap, Point, Shader,
    SpreadMode, Stroke, Transform,
};

/// Ring radius as a fraction of the shorter canvas side.
const RADIUS_FRACTION: f64 = 0.42;

/// Ring stroke width as a fraction of the ring radius.
const RING_WIDTH: f64 = 0.03;

/// Line segments used to approximate one ring segment.
const ARC_STEPS: u32 = 48;

/// How far a chord's control point sits from the center, as a fraction of
/// the radius.
const CHORD_BOW: f64 = 0.3;

/// Chord stroke width as a fraction of the ring radius.
const CHORD_WIDTH: f64 = 0.0035;

/// Marker radius per size tier, as a fraction of the ring radius.
const MARKER_TIERS: [f64; 4] = [0.006, 0.009, 0.013, 0.018];

#[derive(Clone, Copy, Debug)]
struct Layout {
    cx: f64,
    cy: f64,
    radius: f64,
}

impl Layout {
    fn new(width: u32, height: u32) -> Self {
        Self {
            cx: f64::from(width) / 2.0,
            cy: f64::from(height) / 2.0,
            radius: RADIUS_FRACTION * f64::from(width.min(height)),
        }
    }

    fn ring_width(&self) -> f64 {
        self.radius * RING_WIDTH
    }

    fn point(&self, angle: f64, radius: f64) -> (f32, f32) {
        (
            (self.cx + radius * angle.cos()) as f32,
            (self.cy + radius * angle.sin()) as f32,
        )
    }
}

/// Background, ring and every chord up to `count`, without markers.
///
/// Chords only ever accumulate, so a layer for count `k` can be advanced to
/// any `n >= k` by stroking chords `k + 1..=n` on top. The pixels match a
/// layer drawn for `n` in one go because every stroke sees the same canvas
/// it would have seen in a single pass. Markers depend on the run lengths of
/// the whole prefix and are drawn on a copy when encoding.
pub(super) struct ChordLayer {
    pixmap: Pixmap,
    layout: Layout,
    count: u64,
}

impl ChordLayer {
    /// Creates an empty layer with the background and the ring drawn.
    pub(super) fn new(resolution: &Resolution) -> Result<Self, RenderError> {
        let mut pixmap = Pixmap::new(resolution.width, resolution.height).ok_or_else(|| {
            RenderError::InvalidResolution {
                name: resolution.name.clone(),
                width: resolution.width,
                height: resolution.height,
            }
        })?;
        pixmap.fill(background());

        let layout = Layout::new(resolution.width, resolution.height);
        draw_ring(&mut pixmap, &layout);
        Ok(Self {
            pixmap,
            layout,
            count: 0,
        })
    }

    /// Number of positions whose chords are on the layer.
    pub(super) fn count(&self) -> u64 {
        self.count
    }

    /// Strokes the chords of positions `self.count() + 1..=count`. A count
    /// at or below the current one draws nothing.
    pub(super) fn advance(&mut self, count: u64, digits: &DigitSequence) {
        if count <= self.count {
            return;
        }
        draw_chords(&mut self.pixmap, &self.layout, self.count + 1, count, digits);
        self.count = count;
    }

    /// Draws the run markers on a copy of the layer and encodes it as PNG.
    pub(super) fn encode(
        &self,
        name: &str,
        digits: &DigitSequence,
    ) -> Result<Vec<u8>, RenderError> {
        let mut pixmap = self.pixmap.clone();
        draw_markers(&mut pixmap, &self.layout, self.count, digits);
        pixmap.encode_png().map_err(|e| RenderError::Encode {
            name: name.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// Draws the diagram for the first `assigned_count` positions from scratch
/// and encodes it as PNG.
pub(super) fn draw(
    resolution: &Resolution,
    assigned_count: u64,
    digits: &DigitSequence,
) -> Result<Vec<u8>, RenderError> {
    let mut layer = ChordLayer::new(resolution)?;
    layer.advance(assigned_count, digits);
    layer.encode(&resolution.name, digits)
}

fn draw_ring(pixmap: &mut Pixmap, layout: &Layout) {
    let stroke = Stroke {
        width: layout.ring_width() as f32,
        line_cap: LineCap::Butt,
        ..Stroke::default()
    };

    for digit in 0..SEGMENTS {
        let (start, end) = segment_arc(digit);
        let mut pb = PathBuilder::new();
        let (x, y) = layout.point(start, layout.radius);
        pb.move_to(x, y);
        for step in 1..=ARC_STEPS {
            let angle = start + (end - start) * f64::from(step) / f64::from(ARC_STEPS);
            let (x, y) = layout.point(angle, layout.radius);
            pb.line_to(x, y);
        }
        let Some(path) = pb.finish() else {
            continue;
        };

        let mut paint = Paint::default();
        paint.set_color(digit_color(digit, 0xFF));
        paint.anti_alias = true;
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

/// Strokes the chord ending at each position in `first..=last`. Position `p`
/// links the anchor of `p - 1` to the anchor of `p`; position 1 has none.
fn draw_chords(
    pixmap: &mut Pixmap,
    layout: &Layout,
    first: u64,
    last: u64,
    digits: &DigitSequence,
) {
    let first = first.max(2);
    if first > last {
        return;
    }

    let inner = layout.radius - layout.ring_width();
    let stroke = Stroke {
        width: (layout.radius * CHORD_WIDTH).max(1.0) as f32,
        line_cap: LineCap::Round,
        ..Stroke::default()
    };

    let mut prev = digits.digit_at_position(first - 1);
    for position in first..=last {
        let next = digits.digit_at_position(position);
        let a = anchor_angle(prev, position - 1);
        let b = anchor_angle(next, position);

        let (x0, y0) = layout.point(a, inner);
        let (x1, y1) = layout.point(b, inner);
        let (qx, qy) = match bisector(a, b) {
            Some((dx, dy)) => (
                (layout.cx + dx * layout.radius * CHORD_BOW) as f32,
                (layout.cy + dy * layout.radius * CHORD_BOW) as f32,
            ),
            None => (layout.cx as f32, layout.cy as f32),
        };

        let mut pb = PathBuilder::new();
        pb.move_to(x0, y0);
        pb.quad_to(qx, qy, x1, y1);
        if let Some(path) = pb.finish() {
            let from = digit_color(prev, CHORD_ALPHA);
            let to = digit_color(next, CHORD_ALPHA);
            let shader = LinearGradient::new(
                Point::from_xy(x0, y0),
                Point::from_xy(x1, y1),
                vec![GradientStop::new(0.0, from), GradientStop::new(1.0, to)],
                SpreadMode::Pad,
                Transform::identity(),
            )
            .unwrap_or(Shader::SolidColor(from));

            let paint = Paint {
                shader,
                anti_alias: true,
                ..Paint::default()
            };
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }

        prev = next;
    }
}

fn draw_markers(pixmap: &mut Pixmap, layout: &Layout, assigned_count: u64, digits: &DigitSequence) {
    let ring = layout.ring_width();
    for run in clusters(assigned_count, digits) {
        let Some(tier) = run.tier() else {
            continue;
        };
        let size = layout.radius * MARKER_TIERS[tier];
        let angle = anchor_angle(run.digit, run.start);
        let (x, y) = layout.point(angle, layout.radius + 1.5 * ring + size);

        let Some(path) = PathBuilder::from_circle(x, y, size.max(1.0) as f32) else {
            continue;
        };
        let mut paint = Paint::default();
        paint.set_color(digit_color(run.digit, MARKER_ALPHA));
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_uses_shorter_side() {
        let layout = Layout::new(1000, 2000);
        assert_eq!(layout.cx, 500.0);
        assert_eq!(layout.cy, 1000.0);
        assert!((layout.radius - 420.0).abs() < 1e-9);
    }

    #[test]
    fn advancing_a_layer_matches_drawing_at_once() {
        let digits = DigitSequence::from_text("3.14159265358979323846264338327950288");
        let resolution = Resolution::new(90, 120);

        let mut stepped = ChordLayer::new(&resolution).unwrap();
        for count in [1, 2, 7, 7, 20, 33] {
            stepped.advance(count, &digits);
        }
        let mut direct = ChordLayer::new(&resolution).unwrap();
        direct.advance(33, &digits);

        assert_eq!(stepped.count(), 33);
        assert!(stepped.pixmap == direct.pixmap);
        assert_eq!(
            stepped.encode("90x120", &digits).unwrap(),
            draw(&resolution, 33, &digits).unwrap()
        );
    }

    #[test]
    fn advancing_backwards_draws_nothing() {
        let digits = DigitSequence::from_text("3.14159265358979");
        let mut layer = ChordLayer::new(&Resolution::new(40, 40)).unwrap();
        layer.advance(10, &digits);
        let before = layer.pixmap.clone();
        layer.advance(4, &digits);
        assert_eq!(layer.count(), 10);
        assert!(layer.pixmap == before);
    }

    #[test]
    fn twelve_o_clock_is_above_center() {
        let layout = Layout::new(100, 100);
        let (x, y) = layout.point(-core::f64::consts::FRAC_PI_2, 10.0);
        assert!((x - 50.0).abs() < 1e-4);
        assert!((y - 40.0).abs() < 1e-4);
    }
}
