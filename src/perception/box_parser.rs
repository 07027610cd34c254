//! Bounding-box notation → screen coordinates.
//!
//! Box strings carry one or two points in normalised (0..1) space, e.g.
//! `[x1,y1,x2,y2]` or `[x,y]`. A single point is treated as a degenerate box
//! whose corners coincide.
use serde::{Deserialize, Serialize};

/// Per-axis rounding factors applied when the model has no better hint.
pub const DEFAULT_FACTORS: [f64; 2] = [1000.0, 1000.0];

/// Screen-space point; both fields are `None` when the action has no spatial
/// target (e.g. `finished`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenCoords {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl ScreenCoords {
    pub fn point(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

/// Midpoint of the box scaled to `screen_width` × `screen_height`, rounded
/// to a precision of `1 / factor` on each axis.
///
/// No clamping is applied: coordinates outside 0..1 map outside the screen.
pub fn parse_box_to_screen_coords(
    box_str: Option<&str>,
    screen_width: f64,
    screen_height: f64,
    factors: [f64; 2],
) -> ScreenCoords {
    let Some(raw) = box_str.map(str::trim).filter(|s| !s.is_empty()) else {
        return ScreenCoords::default();
    };

    let parsed: Result<Vec<f64>, _> = raw
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')'])
        .split(',')
        .map(|n| n.trim().parse::<f64>())
        .collect();
    let Ok(coords) = parsed else {
        tracing::debug!(box_str = raw, "non-numeric box coordinate");
        return ScreenCoords::default();
    };

    // Missing trailing corner values repeat the first corner.
    let (x1, y1, x2, y2) = match coords.as_slice() {
        [x, y] => (*x, *y, *x, *y),
        [x1, y1, x2] => (*x1, *y1, *x2, *y1),
        [x1, y1, x2, y2, ..] => (*x1, *y1, *x2, *y2),
        _ => {
            tracing::debug!(box_str = raw, "unrecognised box notation");
            return ScreenCoords::default();
        }
    };

    let [width_factor, height_factor] = factors;
    let x = (((x1 + x2) / 2.0) * screen_width * width_factor).round() / width_factor;
    let y = (((y1 + y2) / 2.0) * screen_height * height_factor).round() / height_factor;
    ScreenCoords { x: Some(x), y: Some(y) }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_degenerate_box_maps_to_scaled_point() {
        let actual = parse_box_to_screen_coords(Some("[0.1,0.1,0.1,0.1]"), 1000.0, 800.0, [1.0, 1.0]);
        let expected = ScreenCoords { x: Some(100.0), y: Some(80.0) };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_box_midpoint() {
        let actual = parse_box_to_screen_coords(Some("[0.2, 0.4, 0.4, 0.6]"), 1000.0, 1000.0, [1.0, 1.0]);
        let expected = ScreenCoords { x: Some(300.0), y: Some(500.0) };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_single_point_is_duplicated() {
        let actual = parse_box_to_screen_coords(Some("[0.5,0.25]"), 1920.0, 1080.0, [1.0, 1.0]);
        let expected = ScreenCoords { x: Some(960.0), y: Some(270.0) };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_factor_controls_precision() {
        let actual = parse_box_to_screen_coords(Some("[0.12345,0.5]"), 1000.0, 1000.0, DEFAULT_FACTORS);
        let expected = ScreenCoords { x: Some(123.45), y: Some(500.0) };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_empty_and_missing_input_yield_no_target() {
        assert_eq!(parse_box_to_screen_coords(None, 1000.0, 800.0, [1.0, 1.0]), ScreenCoords::default());
        assert_eq!(parse_box_to_screen_coords(Some(""), 1000.0, 800.0, [1.0, 1.0]), ScreenCoords::default());
        assert_eq!(parse_box_to_screen_coords(Some("  "), 1000.0, 800.0, [1.0, 1.0]).point(), None);
    }

    #[test]
    fn test_non_numeric_coordinate_yields_no_target() {
        let actual = parse_box_to_screen_coords(Some("[abc,0.2,0.3]"), 1000.0, 800.0, [1.0, 1.0]);

        assert_eq!(actual, ScreenCoords::default());
    }

    #[test]
    fn test_missing_y2_repeats_y1() {
        let actual = parse_box_to_screen_coords(Some("[0.2,0.5,0.4]"), 1000.0, 800.0, [1.0, 1.0]);
        let expected = ScreenCoords { x: Some(300.0), y: Some(400.0) };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_out_of_range_is_not_clamped() {
        let actual = parse_box_to_screen_coords(Some("[1.5,-0.25]"), 1000.0, 800.0, [1.0, 1.0]);
        let expected = ScreenCoords { x: Some(1500.0), y: Some(-200.0) };
        assert_eq!(actual, expected);
    }
}
