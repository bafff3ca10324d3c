//! Color interpolation for transitions.
//!
//! Brightness ramps are plain numeric lerps; color ramps go through one of
//! three interpolation modes. The perceptual modes travel the hue wheel
//! (short or long way around) with saturation and value blended linearly,
//! which keeps mid-ramp colors vivid instead of washing through gray.

use prism_lights::Rgb;
use serde::{Deserialize, Serialize};

/// How a color ramp travels between its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Shortest way around the hue wheel.
    #[default]
    PerceptualShort,
    /// Longest way around the hue wheel.
    PerceptualLong,
    /// Straight component-wise RGB blend.
    LinearRgb,
}

/// Blend `from` towards `to` by `t` (clamped to `0..=1`).
pub fn interpolate(from: Rgb, to: Rgb, t: f32, mode: ColorMode) -> Rgb {
    let t = t.clamp(0.0, 1.0);

    match mode {
        ColorMode::LinearRgb => from.lerp(&to, t),
        ColorMode::PerceptualShort | ColorMode::PerceptualLong => {
            let (h1, s1, v1) = rgb_to_hsv(from);
            let (h2, s2, v2) = rgb_to_hsv(to);

            let mut delta = shortest_hue_delta(h1, h2);
            if mode == ColorMode::PerceptualLong {
                delta = if delta >= 0.0 { delta - 360.0 } else { delta + 360.0 };
            }

            hsv_to_rgb(h1 + delta * t, s1 + (s2 - s1) * t, v1 + (v2 - v1) * t)
        }
    }
}

/// Signed hue distance in `(-180, 180]`.
fn shortest_hue_delta(from: f32, to: f32) -> f32 {
    let delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

fn rgb_to_hsv(color: Rgb) -> (f32, f32, f32) {
    let r = color.r as f32 / 255.0;
    let g = color.g as f32 / 255.0;
    let b = color.b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue.rem_euclid(360.0), saturation, max)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgb {
    let hue = hue.rem_euclid(360.0);
    let saturation = saturation.clamp(0.0, 1.0);
    let value = value.clamp(0.0, 1.0);

    let chroma = value * saturation;
    let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = value - chroma;

    let (r, g, b) = match (hue / 60.0) as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    Rgb::new(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    #[test]
    fn test_endpoints_are_exact_in_every_mode() {
        for mode in [
            ColorMode::PerceptualShort,
            ColorMode::PerceptualLong,
            ColorMode::LinearRgb,
        ] {
            assert_eq!(interpolate(RED, BLUE, 0.0, mode), RED);
            assert_eq!(interpolate(RED, BLUE, 1.0, mode), BLUE);
        }
    }

    #[test]
    fn test_linear_midpoint() {
        let mid = interpolate(RED, BLUE, 0.5, ColorMode::LinearRgb);
        assert_eq!(mid, Rgb::new(128, 0, 128));
    }

    #[test]
    fn test_short_path_red_to_blue_passes_magenta() {
        let mid = interpolate(RED, BLUE, 0.5, ColorMode::PerceptualShort);
        assert_eq!(mid, Rgb::new(255, 0, 255));
    }

    #[test]
    fn test_long_path_red_to_blue_passes_green() {
        let mid = interpolate(RED, BLUE, 0.5, ColorMode::PerceptualLong);
        assert_eq!(mid, Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_hsv_roundtrip() {
        for color in [
            Rgb::new(12, 200, 97),
            Rgb::new(255, 255, 255),
            Rgb::new(0, 0, 0),
            Rgb::new(30, 30, 31),
        ] {
            let (h, s, v) = rgb_to_hsv(color);
            let back = hsv_to_rgb(h, s, v);
            assert!((back.r as i32 - color.r as i32).abs() <= 1);
            assert!((back.g as i32 - color.g as i32).abs() <= 1);
            assert!((back.b as i32 - color.b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_out_of_range_t_clamps() {
        assert_eq!(interpolate(RED, BLUE, -0.5, ColorMode::PerceptualShort), RED);
        assert_eq!(interpolate(RED, BLUE, 1.5, ColorMode::PerceptualShort), BLUE);
    }
}
