use serde::{Deserialize, Serialize};

/// Patch edge used by UI-TARS style vision encoders; resized images are
/// multiples of this on both axes.
pub const IMAGE_FACTOR: u32 = 28;
pub const MIN_PIXELS: u32 = 100 * IMAGE_FACTOR * IMAGE_FACTOR;
pub const MAX_PIXELS_V1_0: u32 = 1350 * IMAGE_FACTOR * IMAGE_FACTOR;
pub const MAX_PIXELS_V1_5: u32 = 16384 * IMAGE_FACTOR * IMAGE_FACTOR;
pub const MAX_PIXELS_DOUBAO: u32 = 5120 * IMAGE_FACTOR * IMAGE_FACTOR;

/// Logical size of the screen the screenshot was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenContext {
    pub width: u32,
    pub height: u32,
}

impl ScreenContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Physical pixel size for the given DPI scale factor.
    pub fn physical(&self, scale_factor: f64) -> (u32, u32) {
        let w = (self.width as f64 * scale_factor).round() as u32;
        let h = (self.height as f64 * scale_factor).round() as u32;
        (w, h)
    }
}

fn round_by_factor(value: f64, factor: u32) -> u32 {
    ((value / factor as f64).round() as u32) * factor
}

fn floor_by_factor(value: f64, factor: u32) -> u32 {
    ((value / factor as f64).floor() as u32) * factor
}

fn ceil_by_factor(value: f64, factor: u32) -> u32 {
    ((value / factor as f64).ceil() as u32) * factor
}

/// Rescale `(width, height)` so both edges are multiples of `factor` and the
/// pixel count lands inside `[min_pixels, max_pixels]`, keeping aspect ratio
/// as close as possible. Returns `(width, height)`.
pub fn smart_resize(width: u32, height: u32, factor: u32, min_pixels: u32, max_pixels: u32) -> (u32, u32) {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let mut w_bar = round_by_factor(w, factor).max(factor);
    let mut h_bar = round_by_factor(h, factor).max(factor);

    if (w_bar as u64) * (h_bar as u64) > max_pixels as u64 {
        let beta = (w * h / max_pixels as f64).sqrt();
        w_bar = floor_by_factor(w / beta, factor).max(factor);
        h_bar = floor_by_factor(h / beta, factor).max(factor);
    } else if (w_bar as u64) * (h_bar as u64) < min_pixels as u64 {
        let beta = (min_pixels as f64 / (w * h)).sqrt();
        w_bar = ceil_by_factor(w * beta, factor);
        h_bar = ceil_by_factor(h * beta, factor);
    }
    (w_bar, h_bar)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_smart_resize_rounds_to_factor() {
        let actual = smart_resize(1920, 1080, IMAGE_FACTOR, MIN_PIXELS, MAX_PIXELS_V1_5);
        let expected = (1932, 1092);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_smart_resize_shrinks_above_max() {
        let (w, h) = smart_resize(3840, 2160, IMAGE_FACTOR, MIN_PIXELS, MAX_PIXELS_V1_0);

        assert!(w * h <= MAX_PIXELS_V1_0);
        assert_eq!(w % IMAGE_FACTOR, 0);
        assert_eq!(h % IMAGE_FACTOR, 0);
    }

    #[test]
    fn test_smart_resize_grows_below_min() {
        let (w, h) = smart_resize(100, 100, IMAGE_FACTOR, MIN_PIXELS, MAX_PIXELS_V1_5);

        assert!(w * h >= MIN_PIXELS);
    }

    #[test]
    fn test_screen_context_physical() {
        let fixture = ScreenContext::new(1440, 900);

        let actual = fixture.physical(2.0);

        assert_eq!(actual, (2880, 1800));
    }
}
