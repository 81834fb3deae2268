use tiny_skia::Color;

/// Canvas background.
pub const BACKGROUND: [u8; 3] = [0x00, 0x00, 0x00];

/// One color per digit value, indexed by the digit.
pub const PALETTE: [[u8; 3]; 10] = [
    [0xFF, 0x00, 0x00],
    [0xFF, 0x7F, 0x00],
    [0xFF, 0xFF, 0x00],
    [0x7F, 0xFF, 0x00],
    [0x00, 0xFF, 0x00],
    [0x00, 0xFF, 0x7F],
    [0x00, 0xFF, 0xFF],
    [0x00, 0x7F, 0xFF],
    [0x00, 0x00, 0xFF],
    [0x7F, 0x00, 0xFF],
];

/// Chord stroke alpha; low so overlapping chords build up density.
pub const CHORD_ALPHA: u8 = 48;

/// Cluster marker alpha.
pub const MARKER_ALPHA: u8 = 230;

pub fn digit_color(digit: u8, alpha: u8) -> Color {
    let [r, g, b] = PALETTE[usize::from(digit % 10)];
    Color::from_rgba8(r, g, b, alpha)
}

pub fn background() -> Color {
    let [r, g, b] = BACKGROUND;
    Color::from_rgba8(r, g, b, 0xFF)
}
