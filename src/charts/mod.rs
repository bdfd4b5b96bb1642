//! Charts module - Chart rendering

mod plotter;
mod renderer;

pub use plotter::ChartPlotter;
pub use renderer::StaticChartRenderer;

/// Bar fill for revenue by category.
pub const BAR_COLOR: [u8; 3] = [135, 206, 235];

/// Slice colors, cycled.
pub const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

/// Cell color for undefined coefficients.
pub const UNDEFINED_COLOR: [u8; 3] = [200, 200, 200];

pub fn palette_color(index: usize) -> [u8; 3] {
    PALETTE[index % PALETTE.len()]
}

/// Diverging blue-white-red map for a coefficient in [-1, 1].
pub fn coolwarm(r: f64) -> [u8; 3] {
    const COLD: [f64; 3] = [59.0, 76.0, 192.0];
    const MID: [f64; 3] = [221.0, 221.0, 221.0];
    const WARM: [f64; 3] = [180.0, 4.0, 38.0];

    if r.is_nan() {
        return UNDEFINED_COLOR;
    }
    let r = r.clamp(-1.0, 1.0);
    let (from, to, t) = if r < 0.0 {
        (COLD, MID, r + 1.0)
    } else {
        (MID, WARM, r)
    };
    let mix = |i: usize| (from[i] + (to[i] - from[i]) * t).round() as u8;
    [mix(0), mix(1), mix(2)]
}
