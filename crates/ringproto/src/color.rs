//! Track and clip color normalization.
//!
//! The DAW reports colors as either a packed `0x00RRGGBB` integer or a
//! structured `{r, g, b}` map depending on host version. Both normalize to
//! an RGB triple here; any other shape is rejected and the caller keeps its
//! previous color.

use serde::{Deserialize, Serialize};

use crate::value::RemoteValue;

/// RGB triple, one byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Normalize a remote color value. Returns `None` for shapes we do not
    /// recognize; a third wire shape requires a new branch here.
    pub fn from_remote(value: &RemoteValue) -> Option<Color> {
        match value {
            RemoteValue::Int(packed) => {
                let packed = *packed;
                if !(0..=0x00FF_FFFF).contains(&packed) {
                    return None;
                }
                Some(Color {
                    r: ((packed >> 16) & 0xFF) as u8,
                    g: ((packed >> 8) & 0xFF) as u8,
                    b: (packed & 0xFF) as u8,
                })
            }
            RemoteValue::Map(m) => {
                let channel = |key: &str| m.get(key).and_then(|v| v.as_i64());
                match (channel("r"), channel("g"), channel("b")) {
                    (Some(r), Some(g), Some(b))
                        if (0..=255).contains(&r)
                            && (0..=255).contains(&g)
                            && (0..=255).contains(&b) =>
                    {
                        Some(Color::new(r as u8, g as u8, b as u8))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Packed `0x00RRGGBB` form, the shape we write back to the DAW.
    pub fn to_packed(&self) -> i64 {
        ((self.r as i64) << 16) | ((self.g as i64) << 8) | (self.b as i64)
    }
}
