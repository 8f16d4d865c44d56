// SPDX-License-Identifier: GPL-3.0-only

//! RGBA8 color sample
//!
//! The pixel type of the color buffer. `#[repr(C)]` + `Pod` so a whole
//! buffer can be handed to image encoders as raw bytes without copying.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One 4-channel, 8-bit color sample
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Rgba8 = Rgba8::new(0, 0, 0, 255);
    pub const TRANSPARENT: Rgba8 = Rgba8::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_array(c: [u8; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

impl From<[u8; 4]> for Rgba8 {
    fn from(c: [u8; 4]) -> Self {
        Self::from_array(c)
    }
}

/// Error returned when a color string is not `#RRGGBB` or `#RRGGBBAA`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected #RRGGBB or #RRGGBBAA, got '{}'", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Rgba8 {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) || !(hex.len() == 6 || hex.len() == 8) {
            return Err(err());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Rgba8::new(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl fmt::Display for Rgba8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

// Stored as hex strings in the config file
impl Serialize for Rgba8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba8 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#ff0000".parse::<Rgba8>(), Ok(Rgba8::new(255, 0, 0, 255)));
        assert_eq!("#00FF0080".parse::<Rgba8>(), Ok(Rgba8::new(0, 255, 0, 128)));
        assert!("ff0000".parse::<Rgba8>().is_err());
        assert!("#ff00".parse::<Rgba8>().is_err());
        assert!("#gg0000".parse::<Rgba8>().is_err());
    }

    #[test]
    fn test_parse_rejects_signed_channels() {
        assert!("#+f+f+f".parse::<Rgba8>().is_err());
        assert!("#ff00+f".parse::<Rgba8>().is_err());
        assert!("#-10000".parse::<Rgba8>().is_err());
        assert!("n:10:20:#+f+f+f".parse::<crate::pipelines::depth::RoiBand>().is_err());
    }

    #[test]
    fn test_display_omits_opaque_alpha() {
        assert_eq!(Rgba8::new(255, 0, 0, 255).to_string(), "#ff0000");
        assert_eq!(Rgba8::new(1, 2, 3, 4).to_string(), "#01020304");
    }

    #[test]
    fn test_pod_layout() {
        let pixels = [Rgba8::new(1, 2, 3, 4), Rgba8::BLACK];
        let bytes: &[u8] = bytemuck::cast_slice(&pixels);
        assert_eq!(bytes, &[1, 2, 3, 4, 0, 0, 0, 255]);
    }
}
