//! Frame renderers
//!
//! A renderer draws one RGBA frame at a time into a caller-owned buffer.
//! Anything that implements [`FrameRenderer`] can be captured.

use serde::{Deserialize, Serialize};

/// Size in bytes of one RGBA frame, if it fits in memory
pub fn frame_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
}

/// Draws frames for a capture surface
pub trait FrameRenderer: Send + 'static {
    /// Render frame `index` into `rgba` (`width * height * 4` bytes)
    fn render(&mut self, index: u64, width: u32, height: u32, rgba: &mut [u8]);
}

/// Animated diagonal bands over a solid background
///
/// Its fields double as the settings stored in presets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestPattern {
    /// Band color
    pub color: [u8; 3],
    /// Background color
    pub background: [u8; 3],
    /// Band width in pixels
    pub band_width: u32,
    /// Pixels the bands move per frame
    pub speed: u32,
}

impl Default for TestPattern {
    fn default() -> Self {
        Self {
            color: [255, 255, 255],
            background: [17, 17, 17],
            band_width: 24,
            speed: 4,
        }
    }
}

impl FrameRenderer for TestPattern {
    fn render(&mut self, index: u64, width: u32, height: u32, rgba: &mut [u8]) {
        let period = u64::from(self.band_width.max(1)) * 2;
        let offset = index.wrapping_mul(u64::from(self.speed));

        for y in 0..height {
            for x in 0..width {
                let idx = (y as usize * width as usize + x as usize) * 4;
                if idx + 3 >= rgba.len() {
                    return;
                }

                let phase = (u64::from(x) + u64::from(y) + offset) % period;
                let [r, g, b] = if phase < period / 2 {
                    self.color
                } else {
                    self.background
                };

                rgba[idx] = r;
                rgba[idx + 1] = g;
                rgba[idx + 2] = b;
                rgba[idx + 3] = 255;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len_is_computed_without_u32_overflow() {
        assert_eq!(frame_len(320, 240), Some(320 * 240 * 4));
        #[cfg(target_pointer_width = "64")]
        {
            assert_eq!(frame_len(40_000, 30_000), Some(4_800_000_000));
            assert_eq!(frame_len(u32::MAX, u32::MAX), None);
        }
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let pattern: TestPattern = serde_json::from_str(r#"{ "bandWidth": 8 }"#).unwrap();
        assert_eq!(pattern.band_width, 8);
        assert_eq!(pattern.color, TestPattern::default().color);
    }

    #[test]
    fn test_pattern_fills_opaque_pixels() {
        let mut pattern = TestPattern::default();
        let mut buf = vec![0u8; 8 * 4 * 4];
        pattern.render(0, 8, 4, &mut buf);

        assert!(buf.chunks(4).all(|px| px[3] == 255));
        // First pixel sits at phase 0, inside a band
        assert_eq!(&buf[..3], &pattern.color);
    }

    #[test]
    fn test_pattern_moves_between_frames() {
        let mut pattern = TestPattern::default();
        let mut first = vec![0u8; 64 * 4];
        let mut later = vec![0u8; 64 * 4];
        pattern.render(0, 64, 1, &mut first);
        pattern.render(3, 64, 1, &mut later);

        assert_ne!(first, later);
    }

    #[test]
    fn test_pattern_tolerates_short_buffer() {
        let mut pattern = TestPattern::default();
        let mut buf = vec![0u8; 10];
        pattern.render(0, 8, 8, &mut buf);
    }
}
