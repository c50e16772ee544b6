//! Basic attributes for syntax highlighting
//!
//! Definitions link each of their item datas to one of these default
//! styles (`defStyleNum`). They carry the fallback visual style and tell
//! consumers what kind of text a span is (e.g. bracket matching skips
//! strings and comments).

use super::style::{Color, Style};

/// Kate's default styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultStyle {
    /// Plain text
    Normal,
    /// Language keywords
    Keyword,
    /// Type names
    DataType,
    /// Decimal values
    DecVal,
    /// Numbers in other bases (hex, octal)
    BaseN,
    /// Floating point numbers
    Float,
    /// Character literals
    Char,
    /// String literals
    String,
    /// Comments
    Comment,
    /// Anything else worth marking
    Others,
    /// Alerts (TODO, FIXME inside comments)
    Alert,
    /// Function names
    Function,
    /// Folding region markers
    RegionMarker,
    /// Syntax errors
    Error,
}

impl DefaultStyle {
    /// All default styles in id order
    pub const ALL: [DefaultStyle; 14] = [
        DefaultStyle::Normal,
        DefaultStyle::Keyword,
        DefaultStyle::DataType,
        DefaultStyle::DecVal,
        DefaultStyle::BaseN,
        DefaultStyle::Float,
        DefaultStyle::Char,
        DefaultStyle::String,
        DefaultStyle::Comment,
        DefaultStyle::Others,
        DefaultStyle::Alert,
        DefaultStyle::Function,
        DefaultStyle::RegionMarker,
        DefaultStyle::Error,
    ];

    /// Get the default style for this basic attribute
    pub fn default_style(&self) -> Style {
        match self {
            DefaultStyle::Normal => Style::default(),
            DefaultStyle::Keyword => Style::default().with_bold(),
            DefaultStyle::DataType => Style::fg(Color::rgb(0x00, 0x57, 0xae)),
            DefaultStyle::DecVal => Style::fg(Color::rgb(0xb0, 0x80, 0x00)),
            DefaultStyle::BaseN => Style::fg(Color::rgb(0xb0, 0x80, 0x00)),
            DefaultStyle::Float => Style::fg(Color::rgb(0xb0, 0x80, 0x00)),
            DefaultStyle::Char => Style::fg(Color::rgb(0x92, 0x4c, 0x9d)),
            DefaultStyle::String => Style::fg(Color::rgb(0xbf, 0x03, 0x03)),
            DefaultStyle::Comment => Style::fg(Color::rgb(0x88, 0x87, 0x86)).with_italic(),
            DefaultStyle::Others => Style::fg(Color::rgb(0x00, 0x6e, 0x28)),
            DefaultStyle::Alert => Style::fg(Color::rgb(0xbf, 0x03, 0x03))
                .with_bg(Color::rgb(0xf7, 0xe6, 0xe6))
                .with_bold(),
            DefaultStyle::Function => Style::fg(Color::rgb(0x64, 0x4a, 0x9b)),
            DefaultStyle::RegionMarker => {
                Style::fg(Color::rgb(0x00, 0x57, 0xae)).with_bg(Color::rgb(0xe0, 0xe9, 0xf8))
            }
            DefaultStyle::Error => Style::fg(Color::rgb(0xbf, 0x03, 0x03)).with_underline(),
        }
    }

    /// The definition-file name (`defStyleNum` value)
    pub fn name(&self) -> &'static str {
        match self {
            DefaultStyle::Normal => "dsNormal",
            DefaultStyle::Keyword => "dsKeyword",
            DefaultStyle::DataType => "dsDataType",
            DefaultStyle::DecVal => "dsDecVal",
            DefaultStyle::BaseN => "dsBaseN",
            DefaultStyle::Float => "dsFloat",
            DefaultStyle::Char => "dsChar",
            DefaultStyle::String => "dsString",
            DefaultStyle::Comment => "dsComment",
            DefaultStyle::Others => "dsOthers",
            DefaultStyle::Alert => "dsAlert",
            DefaultStyle::Function => "dsFunction",
            DefaultStyle::RegionMarker => "dsRegionMarker",
            DefaultStyle::Error => "dsError",
        }
    }

    /// Parse a default style from its definition-file name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ds| ds.name() == name)
    }

    /// Position in [`DefaultStyle::ALL`], which is also the basic attribute id
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether brackets inside text of this kind are literal content
    pub fn is_quoted(&self) -> bool {
        matches!(self, DefaultStyle::String | DefaultStyle::Char | DefaultStyle::Comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_styles_not_empty() {
        assert!(!DefaultStyle::Comment.default_style().is_default());
        assert!(!DefaultStyle::String.default_style().is_default());
        assert!(!DefaultStyle::Keyword.default_style().is_default());
        assert!(DefaultStyle::Normal.default_style().is_default());
    }

    #[test]
    fn test_index_matches_order() {
        for (i, ds) in DefaultStyle::ALL.iter().enumerate() {
            assert_eq!(ds.index(), i);
            assert_eq!(DefaultStyle::from_index(i), Some(*ds));
        }
        assert_eq!(DefaultStyle::from_index(DefaultStyle::ALL.len()), None);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(DefaultStyle::from_name("dsString"), Some(DefaultStyle::String));
        assert_eq!(DefaultStyle::from_name("dsError"), Some(DefaultStyle::Error));
        assert_eq!(DefaultStyle::from_name("String"), None);
        assert_eq!(DefaultStyle::from_name(""), None);
    }
}
