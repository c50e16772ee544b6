//! Attribute tables
//!
//! An attribute is a named visual style. Ids are handed out on first
//! reference and stay stable for the lifetime of the table. A language's
//! table links its attributes to the basic table (one entry per
//! [`DefaultStyle`]) which supplies the fallback style.
//!
//! User customizations are kept apart from the definition's own styles so
//! they can be persisted as a flat override string:
//!
//! ```text
//! dsKeyword=(bold:false,color:#0000ff) "Normal Text"=(italic:true)
//! ```

use std::collections::HashMap;

use super::default_style::DefaultStyle;
use super::style::{Color, Style};
use crate::error::{HighlightError, Result};

/// Index of an attribute within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(pub usize);

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    basic: Option<AttributeId>,
    style: Style,
    overrides: Style,
}

/// A mapping from symbolic style names to attribute ids and styles
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    entries: Vec<Entry>,
    ids: HashMap<String, AttributeId>,
}

impl AttributeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the table of basic attributes
    ///
    /// Attribute ids equal [`DefaultStyle::index`].
    pub fn basic() -> Self {
        let mut table = Self::new();
        for ds in DefaultStyle::ALL {
            let id = table.id(ds.name());
            table.set_style(id, ds.default_style());
        }
        table
    }

    /// Get the id for a name, assigning a new one on first reference
    pub fn id(&mut self, name: &str) -> AttributeId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = AttributeId(self.entries.len());
        self.entries.push(Entry {
            name: name.to_string(),
            basic: None,
            style: Style::default(),
            overrides: Style::default(),
        });
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Look up a name without assigning an id
    pub fn lookup(&self, name: &str) -> Option<AttributeId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: AttributeId) -> Option<&str> {
        self.entries.get(id.0).map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all attributes in id order
    pub fn iter(&self) -> impl Iterator<Item = (AttributeId, &str)> {
        self.entries.iter().enumerate().map(|(i, e)| (AttributeId(i), e.name.as_str()))
    }

    /// Link an attribute to a basic attribute
    pub fn set_basic(&mut self, id: AttributeId, basic: Option<AttributeId>) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.basic = basic;
        }
    }

    /// The basic attribute linked to `id`, if any
    pub fn basic_id(&self, id: AttributeId) -> Option<AttributeId> {
        self.entries.get(id.0).and_then(|e| e.basic)
    }

    /// The default style kind behind an attribute
    pub fn default_style(&self, id: AttributeId) -> Option<DefaultStyle> {
        self.basic_id(id).and_then(|b| DefaultStyle::from_index(b.0))
    }

    /// Set the definition's own style for an attribute
    pub fn set_style(&mut self, id: AttributeId, style: Style) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.style = style;
        }
    }

    /// The attribute's style including user overrides, without the basic fallback
    pub fn style(&self, id: AttributeId) -> Style {
        self.entries
            .get(id.0)
            .map(|e| e.style.overlay(&e.overrides))
            .unwrap_or_default()
    }

    /// The style to render with: the basic attribute's style with this
    /// attribute's set fields layered on top
    pub fn effective_style(&self, id: AttributeId, basic: &AttributeTable) -> Style {
        let own = self.style(id);
        match self.basic_id(id) {
            Some(basic_id) => basic.style(basic_id).overlay(&own),
            None => own,
        }
    }

    /// Drop all user overrides
    pub fn clear_overrides(&mut self) {
        for entry in &mut self.entries {
            entry.overrides = Style::default();
        }
    }

    /// Serialize the user overrides
    pub fn to_overrides_string(&self) -> String {
        let mut parts = Vec::new();
        for entry in &self.entries {
            if entry.overrides.is_default() {
                continue;
            }
            let o = &entry.overrides;
            let mut props = Vec::new();
            if let Some(v) = o.bold {
                props.push(format!("bold:{}", v));
            }
            if let Some(v) = o.italic {
                props.push(format!("italic:{}", v));
            }
            if let Some(v) = o.underline {
                props.push(format!("underline:{}", v));
            }
            if let Some(v) = o.strikeout {
                props.push(format!("strikeout:{}", v));
            }
            if let Some(c) = o.fg {
                props.push(format!("color:{}", c));
            }
            if let Some(c) = o.bg {
                props.push(format!("background:{}", c));
            }
            parts.push(format!("{}=({})", quote_name(&entry.name), props.join(",")));
        }
        parts.join(" ")
    }

    /// Parse an override string and merge it into the user overrides
    ///
    /// Names not yet known get a fresh attribute id so overrides for
    /// attributes of a definition loaded later are not lost.
    pub fn apply_overrides(&mut self, text: &str) -> Result<()> {
        let mut ex = Extractor::new(text);
        loop {
            ex.skip_ws();
            if ex.at_end() {
                return Ok(());
            }
            let name = ex.read_name()?;
            ex.expect('=')?;
            ex.expect('(')?;
            let mut overrides = Style::default();
            ex.skip_ws();
            if !ex.test(')') {
                loop {
                    let prop = ex.read_word()?;
                    ex.expect(':')?;
                    let value = ex.read_value()?;
                    apply_property(&mut overrides, &prop, &value)
                        .map_err(|message| ex.error(message))?;
                    if ex.test(')') {
                        break;
                    }
                    ex.expect(',')?;
                }
            }
            let id = self.id(&name);
            let entry = &mut self.entries[id.0];
            entry.overrides = entry.overrides.overlay(&overrides);
        }
    }
}

fn apply_property(style: &mut Style, prop: &str, value: &str) -> std::result::Result<(), String> {
    let flag = || match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("expected true or false for '{}', got '{}'", prop, value)),
    };
    let color = || Color::parse(value).ok_or_else(|| format!("invalid color '{}'", value));
    match prop {
        "bold" => style.bold = Some(flag()?),
        "italic" => style.italic = Some(flag()?),
        "underline" => style.underline = Some(flag()?),
        "strikeout" => style.strikeout = Some(flag()?),
        "color" => style.fg = Some(color()?),
        "background" => style.bg = Some(color()?),
        _ => return Err(format!("unknown property '{}'", prop)),
    }
    Ok(())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn quote_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(is_word_char) {
        return name.to_string();
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// A cursor over the override string
struct Extractor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Extractor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> HighlightError {
        HighlightError::Overrides {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Consume `c` (after optional whitespace) if it is next
    fn test(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.test(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn read_word(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected a name"));
        }
        Ok(self.text[start..self.pos].to_string())
    }

    fn read_name(&mut self) -> Result<String> {
        self.skip_ws();
        if self.peek() != Some('"') {
            return self.read_word();
        }
        self.bump();
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(name),
                Some('\\') => match self.bump() {
                    Some(c) => name.push(c),
                    None => break,
                },
                Some(c) => name.push(c),
                None => break,
            }
        }
        Err(self.error("unterminated quoted name"))
    }

    fn read_value(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ',' && c != ')' && !c.is_whitespace()) {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected a value"));
        }
        Ok(self.text[start..self.pos].to_string())
    }
}
