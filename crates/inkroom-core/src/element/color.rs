//! Hex color values as stored in documents.

use peniko::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An 8-bit RGBA color that persists as a CSS-style hex string.
///
/// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa` and the keywords `white`, `black`
/// and `transparent`. Anything else deserializes to black so that a single
/// malformed color never makes a whole document unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl HexColor {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parse a color string, returning `None` when it is not understood.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        match input.to_ascii_lowercase().as_str() {
            "white" => return Some(Self::WHITE),
            "black" => return Some(Self::BLACK),
            "transparent" => return Some(Self::TRANSPARENT),
            _ => {}
        }

        let hex = input.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        match hex.len() {
            3 => {
                let r = channel(0..1)?;
                let g = channel(1..2)?;
                let b = channel(2..3)?;
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Some(Self::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => None,
        }
    }

    /// Parse a color string, falling back to black.
    pub fn parse_or_black(input: &str) -> Self {
        Self::parse(input).unwrap_or(Self::BLACK)
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for HexColor {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidColor(s.to_string()))
    }
}

/// Returned by [`HexColor::from_str`] for unrecognized input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color: {0:?}")]
pub struct InvalidColor(pub String);

impl From<Color> for HexColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<HexColor> for Color {
    fn from(color: HexColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_or_black(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(HexColor::parse("#fff"), Some(HexColor::WHITE));
        assert_eq!(HexColor::parse("#EF4444"), Some(HexColor::rgb(0xef, 0x44, 0x44)));
        assert_eq!(
            HexColor::parse("#00000080"),
            Some(HexColor::new(0, 0, 0, 0x80))
        );
        assert_eq!(HexColor::parse("transparent"), Some(HexColor::TRANSPARENT));
        assert_eq!(HexColor::parse("White"), Some(HexColor::WHITE));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(HexColor::parse("#12"), None);
        assert_eq!(HexColor::parse("#zzzzzz"), None);
        assert_eq!(HexColor::parse("rgb(1,2,3)"), None);
        assert_eq!(HexColor::parse("#ééé"), None);
        assert_eq!(HexColor::parse_or_black("nope"), HexColor::BLACK);
    }

    #[test]
    fn test_hex_output() {
        assert_eq!(HexColor::rgb(0xfe, 0xf0, 0x8a).to_hex(), "#fef08a");
        assert_eq!(HexColor::new(1, 2, 3, 4).to_string(), "#01020304");
    }

    #[test]
    fn test_serde_is_lenient() {
        let color: HexColor = serde_json::from_str("\"#3B82F6\"").unwrap();
        assert_eq!(color, HexColor::rgb(0x3b, 0x82, 0xf6));
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#3b82f6\"");

        let broken: HexColor = serde_json::from_str("\"hotpink-ish\"").unwrap();
        assert_eq!(broken, HexColor::BLACK);
    }

    #[test]
    fn test_peniko_conversion() {
        let color = HexColor::rgb(16, 185, 129);
        let peniko: Color = color.into();
        assert_eq!(HexColor::from(peniko), color);
    }
}
