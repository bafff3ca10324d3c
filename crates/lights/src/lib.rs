//! Light abstractions for Prism.
//!
//! Defines the capability interface the transition engine drives, the RGB
//! color type shared across the workspace, and a console-backed driver used
//! for demos and tests. Real drivers (BLE, WLED, ...) live in their own
//! crates and only need to implement [`Light`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// RGB color as sent to a light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Parse a `#rrggbb` hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 7 || !hex.starts_with('#') {
            return None;
        }

        let r = u8::from_str_radix(&hex[1..3], 16).ok()?;
        let g = u8::from_str_radix(&hex[3..5], 16).ok()?;
        let b = u8::from_str_radix(&hex[5..7], 16).ok()?;

        Some(Rgb { r, g, b })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Linear component-wise blend towards `target`.
    pub fn lerp(&self, target: &Rgb, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: lerp_component(self.r, target.r, t),
            g: lerp_component(self.g, target.g, t),
            b: lerp_component(self.b, target.b, t),
        }
    }
}

fn lerp_component(start: u8, end: u8, t: f32) -> u8 {
    (start as f32 + (end as f32 - start as f32) * t).round() as u8
}

/// Errors surfaced by light drivers.
///
/// Drivers own their connection lifecycle (discovery, pairing, reconnect);
/// callers treat every write as best-effort and never retry individual
/// commands.
#[derive(Debug, thiserror::Error)]
pub enum LightError {
    #[error("light is not connected")]
    Disconnected,
    #[error("write failed: {0}")]
    Write(String),
}

/// Capability interface for a single addressable light.
///
/// Each method is a fire-and-forget network write: it should return quickly
/// and report failure without retrying.
#[async_trait]
pub trait Light: Send + Sync {
    /// Stable identifier, unique within the light set.
    fn id(&self) -> &str;

    async fn set_power(&self, on: bool) -> Result<(), LightError>;

    /// Brightness in percent. Callers guarantee `0..=100`.
    async fn set_brightness(&self, percent: u8) -> Result<(), LightError>;

    async fn set_color(&self, color: Rgb) -> Result<(), LightError>;
}

/// Driver that writes every command to the log instead of a network.
///
/// Stands in for real hardware in demos and integration tests.
pub struct ConsoleLight {
    id: String,
}

impl ConsoleLight {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Light for ConsoleLight {
    fn id(&self) -> &str {
        &self.id
    }

    async fn set_power(&self, on: bool) -> Result<(), LightError> {
        log::info!("[{}] power {}", self.id, if on { "on" } else { "off" });
        Ok(())
    }

    async fn set_brightness(&self, percent: u8) -> Result<(), LightError> {
        log::debug!("[{}] brightness {}%", self.id, percent);
        Ok(())
    }

    async fn set_color(&self, color: Rgb) -> Result<(), LightError> {
        log::debug!("[{}] color {}", self.id, color.to_hex());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_roundtrip() {
        let color = Rgb::from_hex("#1db954").unwrap();
        assert_eq!(color, Rgb::new(0x1d, 0xb9, 0x54));
        assert_eq!(color.to_hex(), "#1db954");
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert!(Rgb::from_hex("1db954").is_none());
        assert!(Rgb::from_hex("#1db95").is_none());
        assert!(Rgb::from_hex("#gggggg").is_none());
    }

    #[test]
    fn test_lerp_endpoints() {
        let black = Rgb::new(0, 0, 0);
        let white = Rgb::new(255, 255, 255);
        assert_eq!(black.lerp(&white, 0.0), black);
        assert_eq!(black.lerp(&white, 1.0), white);
        assert_eq!(black.lerp(&white, 0.5), Rgb::new(128, 128, 128));
    }

    #[test]
    fn test_lerp_clamps_t() {
        let a = Rgb::new(10, 20, 30);
        let b = Rgb::new(200, 100, 50);
        assert_eq!(a.lerp(&b, -1.0), a);
        assert_eq!(a.lerp(&b, 2.0), b);
    }
}
