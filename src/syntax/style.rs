//! Style types for text rendering
//!
//! This module provides the visual side of highlighting: colors, partial
//! styles that can be layered on top of each other, and the spans and
//! elements a highlighted line is reported as.

use std::fmt;

use super::attributes::AttributeId;

/// An RGB color as written in definitions (`#rrggbb`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or the short `#rgb` form
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::rgb(r, g, b))
            }
            3 => {
                let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
                Some(Self::rgb(digit(0)?, digit(1)?, digit(2)?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Text style attributes
///
/// Every field is optional: an unset field falls back to whatever style
/// this one is layered on (see [`Style::overlay`]), or to no styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    /// Foreground color
    pub fg: Option<Color>,
    /// Background color
    pub bg: Option<Color>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikeout: Option<bool>,
}

impl Style {
    /// Create a style with just foreground color
    pub fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Default::default()
        }
    }

    /// Builder: set background color
    pub fn with_bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    /// Builder: set bold
    pub fn with_bold(mut self) -> Self {
        self.bold = Some(true);
        self
    }

    /// Builder: set italic
    pub fn with_italic(mut self) -> Self {
        self.italic = Some(true);
        self
    }

    /// Builder: set underline
    pub fn with_underline(mut self) -> Self {
        self.underline = Some(true);
        self
    }

    /// Layer `top` over this style: fields set in `top` win
    pub fn overlay(&self, top: &Style) -> Style {
        Style {
            fg: top.fg.or(self.fg),
            bg: top.bg.or(self.bg),
            bold: top.bold.or(self.bold),
            italic: top.italic.or(self.italic),
            underline: top.underline.or(self.underline),
            strikeout: top.strikeout.or(self.strikeout),
        }
    }

    pub fn is_bold(&self) -> bool {
        self.bold.unwrap_or(false)
    }

    pub fn is_italic(&self) -> bool {
        self.italic.unwrap_or(false)
    }

    pub fn is_underline(&self) -> bool {
        self.underline.unwrap_or(false)
    }

    pub fn is_strikeout(&self) -> bool {
        self.strikeout.unwrap_or(false)
    }

    /// Check if this is the default (no styling)
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// A styled span of text within a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset where this span starts (inclusive)
    pub start: usize,
    /// Byte offset where this span ends (exclusive)
    pub end: usize,
    /// Attribute applied to the span
    pub attribute: AttributeId,
    /// Basic attribute the span's attribute is linked to
    pub basic: Option<AttributeId>,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, attribute: AttributeId, basic: Option<AttributeId>) -> Self {
        Self {
            start,
            end,
            attribute,
            basic,
        }
    }

    /// Check if this span contains a byte position
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Get the length of this span in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Per-line metadata kept for consumers such as bracket matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    /// Byte offset of the element
    pub start: usize,
    /// Length in bytes
    pub len: usize,
    /// Basic attribute of the element's attribute
    pub basic: Option<AttributeId>,
}

impl Element {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end()
    }
}
