use core::fmt;
use serde::{Deserialize, Serialize};

/// Authored cell color, kept verbatim as the `#rrggbb` string the editor wrote.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

/// Grid cell, `None` is an empty (transparent) cell.
pub type Cell = Option<Color>;

impl Color {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(format!("#{r:02x}{g:02x}{b:02x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Channels of a `#rrggbb` color, `None` for anything else.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.0.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: core::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Perceived brightness, `round(0.299R + 0.587G + 0.114B)`.
    pub fn luminance(&self) -> Option<u8> {
        let (r, g, b) = self.rgb()?;
        let gray = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
        Some(gray.round().clamp(0.0, 255.0) as u8)
    }

    /// Gray equivalent with all three channels set to the luminance.
    ///
    /// Colors that are not `#rrggbb` pass through unchanged.
    pub fn to_grayscale(&self) -> Self {
        match self.luminance() {
            Some(gray) => Self::from_rgb(gray, gray, gray),
            None => {
                log::debug!("Not converting unparseable color {:?}", self.0);
                self.clone()
            }
        }
    }

    pub fn is_gray(&self) -> bool {
        self.rgb().is_some_and(|(r, g, b)| r == g && g == b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(hex: &str) -> Self {
        Self::new(hex)
    }
}

/// Reads a raw serialized cell, both `""` and `null` are empty.
pub(crate) fn cell_from_raw(raw: Option<String>) -> Cell {
    raw.filter(|hex| !hex.is_empty()).map(Color)
}
