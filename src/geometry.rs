//! Pixel layout of the fretboard.
//!
//! Everything here is a pure function of canvas width/height and the fret and
//! string counts, and every length scales linearly with the canvas.

/// Gap between neighbouring fret circles, as a fraction of the fret spacing.
const FRET_GAP: f64 = 0.03;
/// Width of a fret divider line, as a fraction of the fret spacing.
const FRET_LINE: f64 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub width: f64,
    pub height: f64,
    pub fret_count: usize,
    pub string_count: usize,
    /// Horizontal distance between fret centers.
    pub fret_spacing: f64,
    /// Height of one string's row.
    pub row_height: f64,
    /// Resting y of fret centers within a row.
    pub center_line: f64,
    pub fret_radius: f64,
    /// Peak vertical displacement of a wiggling fret.
    pub wiggle_amplitude: f64,
    pub mark_radius: f64,
    /// Label font size.
    pub text_height: f64,
    pub fret_line_width: f64,
}

impl Geometry {
    /// Derive the layout. Counts below 2 are raised to 2 and non-positive
    /// sizes collapse to zero so the function stays total.
    pub fn compute(width: f64, height: f64, fret_count: usize, string_count: usize) -> Self {
        let width = width.max(0.0);
        let height = height.max(0.0);
        let fret_count = fret_count.max(2);
        let string_count = string_count.max(2);

        let fret_spacing = width / fret_count as f64;
        let row_height = height / string_count as f64;
        let center_line = row_height / 2.0;
        let fret_radius = fret_spacing * (0.5 - FRET_GAP);
        let wiggle_amplitude = 3.0 * row_height / 20.0;
        let mark_radius = (center_line - (wiggle_amplitude + fret_radius)).max(0.0);

        Self {
            width,
            height,
            fret_count,
            string_count,
            fret_spacing,
            row_height,
            center_line,
            fret_radius,
            wiggle_amplitude,
            mark_radius,
            text_height: row_height / 5.0,
            fret_line_width: fret_spacing * FRET_LINE,
        }
    }

    /// Highest fret offset; drawn but never playable.
    pub fn dead_fret(&self) -> usize {
        self.fret_count - 1
    }

    /// Offsets of every drawn circle, dead end-cap included.
    pub fn circle_offsets(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.dead_fret()
    }

    pub fn fret_center_x(&self, offset: usize) -> f64 {
        (offset as f64 + 0.5) * self.fret_spacing
    }

    /// Left edge of the divider between fret `index - 1` and fret `index`.
    pub fn fret_line_x(&self, index: usize) -> f64 {
        index as f64 * self.fret_spacing - self.fret_line_width / 2.0
    }

    pub fn label_x(&self, offset: usize) -> f64 {
        self.fret_radius / 3.0 + offset as f64 * self.fret_spacing
    }

    /// Top of string row `index` within the base canvas.
    pub fn string_y(&self, index: usize) -> f64 {
        index as f64 * self.row_height
    }

    /// Top-left corner and side length of the open-string square.
    pub fn open_rect(&self) -> (f64, f64, f64) {
        (0.0, self.center_line / 2.0, 2.0 * self.fret_radius)
    }

    pub fn single_mark_y(&self) -> f64 {
        self.height / 2.0
    }

    pub fn double_mark_ys(&self) -> [f64; 2] {
        [self.height / 3.0, 2.0 * self.height / 3.0]
    }

    /// Vertical offset of a wiggling fret at `elapsed_ms`.
    pub fn wiggle(&self, offset: usize, elapsed_ms: f64) -> f64 {
        self.wiggle_amplitude * (offset as f64 / 2.0 + elapsed_ms / 125.0).sin()
    }

    /// Same layout on a canvas scaled by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::compute(
            self.width * factor,
            self.height * factor,
            self.fret_count,
            self.string_count,
        )
    }

    #[cfg(test)]
    fn pixel_values(&self) -> [f64; 9] {
        [
            self.width,
            self.height,
            self.fret_spacing,
            self.row_height,
            self.center_line,
            self.fret_radius,
            self.wiggle_amplitude,
            self.mark_radius,
            self.text_height,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

    fn default_geometry() -> Geometry {
        Geometry::compute(DEFAULT_WIDTH, DEFAULT_HEIGHT, 22, 6)
    }

    #[test]
    fn test_reference_layout() {
        let g = default_geometry();
        assert!((g.fret_spacing - 740.0 / 22.0).abs() < 1e-9);
        assert!((g.row_height - 69.375).abs() < 1e-9);
        assert!((g.center_line - 34.6875).abs() < 1e-9);
        // Within a tenth of a pixel of spacing/2 - 1.
        assert!((g.fret_radius - (g.fret_spacing / 2.0 - 1.0)).abs() < 0.1);
        assert!((g.wiggle_amplitude - 10.40625).abs() < 1e-9);
        assert!(g.mark_radius > 0.0);
        assert!((g.text_height - 13.875).abs() < 1e-9);
        assert_eq!(g.dead_fret(), 21);
        assert_eq!(g.circle_offsets().count(), 21);
    }

    #[test]
    fn test_pure() {
        assert_eq!(default_geometry(), default_geometry());
    }

    #[test]
    fn test_scales_linearly() {
        let g = default_geometry();
        let big = g.scaled(2.5);
        for (a, b) in g.pixel_values().iter().zip(big.pixel_values().iter()) {
            assert!((a * 2.5 - b).abs() < 1e-9, "{a} * 2.5 != {b}");
        }
        assert!((g.fret_center_x(7) * 2.5 - big.fret_center_x(7)).abs() < 1e-9);
        assert!((g.fret_line_x(12) * 2.5 - big.fret_line_x(12)).abs() < 1e-9);
        assert!((g.label_x(3) * 2.5 - big.label_x(3)).abs() < 1e-9);
    }

    #[test]
    fn test_total_for_small_inputs() {
        let g = Geometry::compute(10.0, 4.0, 2, 2);
        assert_eq!(g.mark_radius, 0.0);
        assert!(g.fret_radius > 0.0);
        let degenerate = Geometry::compute(-5.0, 0.0, 0, 1);
        assert_eq!(degenerate.fret_count, 2);
        assert_eq!(degenerate.width, 0.0);
        assert!(degenerate.pixel_values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fret_positions() {
        let g = default_geometry();
        assert!((g.fret_center_x(0) - g.fret_spacing / 2.0).abs() < 1e-9);
        assert!((g.string_y(3) - 3.0 * g.row_height).abs() < 1e-9);
        let (x, y, side) = g.open_rect();
        assert_eq!(x, 0.0);
        assert!((y - g.center_line / 2.0).abs() < 1e-9);
        assert!((side - 2.0 * g.fret_radius).abs() < 1e-9);
    }

    #[test]
    fn test_wiggle_bounded() {
        let g = default_geometry();
        for t in 0..200 {
            let dy = g.wiggle(5, t as f64 * 7.0);
            assert!(dy.abs() <= g.wiggle_amplitude + 1e-9);
        }
        assert!((g.wiggle(0, 0.0)).abs() < 1e-12);
    }
}
