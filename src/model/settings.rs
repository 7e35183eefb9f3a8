use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// ARGB color. Serializes as the 4-tuple string `"A,R,G,B"` the project
/// document format uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::argb(255, r, g, b)
    }

    pub const WHITE: Color = Color::opaque(255, 255, 255);
    pub const BLACK: Color = Color::opaque(0, 0, 0);
    pub const TRANSPARENT: Color = Color::argb(0, 0, 0, 0);
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.a, self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected \"A,R,G,B\", got {s:?}"));
        }
        let mut channels = [0u8; 4];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid color channel {part:?} in {s:?}"))?;
        }
        Ok(Color::argb(channels[0], channels[1], channels[2], channels[3]))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Settings handed to the external text-rendering collaborator for script
/// overlays. Serialized with the project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRenderSettings {
    pub font_family: String,
    pub font_size: f32,
    pub font_color: Color,
    pub shadow: bool,
    pub shadow_color: Color,
    /// Right-to-left primary text.
    pub rtl: bool,
    /// Primary text contains non-ASCII glyphs the renderer must shape.
    pub non_ascii: bool,
    pub background: Color,
    /// Layout margins in pixels: left, top, right, bottom.
    pub margins: [u32; 4],
}

impl Default for ScriptRenderSettings {
    fn default() -> Self {
        Self {
            font_family: "Noto Sans".to_string(),
            font_size: 42.0,
            font_color: Color::WHITE,
            shadow: true,
            shadow_color: Color::argb(180, 0, 0, 0),
            rtl: false,
            non_ascii: false,
            background: Color::TRANSPARENT,
            margins: [64, 0, 64, 48],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_round_trips_as_tuple_string() {
        let color = Color::argb(180, 12, 200, 9);
        let json = serde_json::to_string(&color).unwrap();
        assert_eq!(json, "\"180,12,200,9\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, color);
    }

    #[test]
    fn color_parse_tolerates_spaces() {
        let color: Color = "255, 10, 20, 30".parse().unwrap();
        assert_eq!(color, Color::argb(255, 10, 20, 30));
    }

    #[test]
    fn color_parse_rejects_bad_shapes() {
        assert!("1,2,3".parse::<Color>().is_err());
        assert!("a,b,c,d".parse::<Color>().is_err());
        assert!("300,0,0,0".parse::<Color>().is_err());
    }

    #[test]
    fn settings_serde_round_trip() {
        let settings = ScriptRenderSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: ScriptRenderSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
