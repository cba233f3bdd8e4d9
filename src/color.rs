use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Preset layer colours, handed out in order as layers are loaded.
pub const PALETTE: [Rgb; 8] = [
    Rgb(0xe6, 0x19, 0x4b),
    Rgb(0x43, 0x63, 0xd8),
    Rgb(0x3c, 0xb4, 0x4b),
    Rgb(0xf5, 0x82, 0x31),
    Rgb(0x91, 0x1e, 0xb4),
    Rgb(0x42, 0xd4, 0xf4),
    Rgb(0xf0, 0x32, 0xe6),
    Rgb(0x80, 0x80, 0x00),
];

/// An sRGB colour. Always serialised as lowercase `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn palette(index: usize) -> Rgb {
        PALETTE[index % PALETTE.len()]
    }
}

impl FromStr for Rgb {
    type Err = ExportError;

    /// Accepts `#rrggbb`, `rrggbb`, `#rgb` and `rgb` in either case.
    /// Anything else is rejected rather than coerced.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let invalid = || ExportError::Input(format!("'{}' is not a hex colour", s));

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());

        match hex.len() {
            6 => Ok(Rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                // #abc is shorthand for #aabbcc
                let r = channel(&hex[0..1])?;
                let g = channel(&hex[1..2])?;
                let b = channel(&hex[2..3])?;
                Ok(Rgb(r * 17, g * 17, b * 17))
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(rgb: Rgb) -> Self {
        rgb.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_forms() {
        assert_eq!("#FF8000".parse::<Rgb>().unwrap(), Rgb(255, 128, 0));
        assert_eq!("ff8000".parse::<Rgb>().unwrap(), Rgb(255, 128, 0));
        assert_eq!("#f80".parse::<Rgb>().unwrap(), Rgb(255, 136, 0));
        assert_eq!("  #000000 ".parse::<Rgb>().unwrap(), Rgb(0, 0, 0));
    }

    #[test]
    fn rejects_malformed_hex() {
        for bad in ["", "#", "red", "#12345", "#1234567", "#gg0000", "#+1+2+3"] {
            assert!(
                matches!(bad.parse::<Rgb>(), Err(ExportError::Input(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn displays_canonical_lowercase() {
        assert_eq!(Rgb(0xAB, 0x0C, 0xFF).to_string(), "#ab0cff");
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: Rgb = serde_json::from_str("\"#00ff00\"").unwrap();
        assert_eq!(ok, Rgb(0, 255, 0));
        assert!(serde_json::from_str::<Rgb>("\"green\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"#00ff00\"");
    }

    #[test]
    fn palette_wraps_around() {
        assert_eq!(Rgb::palette(0), Rgb::palette(PALETTE.len()));
    }
}
