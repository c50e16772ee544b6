//! Language definitions for syntax highlighting
//!
//! A [`LanguageDefinition`] is parsed once from a declarative TOML
//! description that mirrors the Kate highlighting format:
//!
//! ```toml
//! name = "Example"
//! extensions = ["ex"]
//!
//! [lists]
//! keywords = ["if", "else"]
//!
//! [[contexts]]
//! name = "Normal"
//! attribute = "Normal Text"
//! rules = [
//!     { type = "keyword", String = "keywords", attribute = "Keyword" },
//!     { type = "DetectChar", char = '"', attribute = "String", context = "String" },
//! ]
//!
//! [[contexts]]
//! name = "String"
//! attribute = "String"
//! lineEndContext = "#pop"
//! rules = [{ type = "DetectChar", char = '"', attribute = "String", context = "#pop" }]
//!
//! [[itemDatas]]
//! name = "Keyword"
//! defStyleNum = "dsKeyword"
//! ```
//!
//! Broken references never abort the parse: an unknown context, list or
//! rule kind is reported through `log` and the affected rule or
//! transition is left out.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::attributes::{AttributeId, AttributeTable};
use super::context::{Context, ContextId, Contexts, Transition};
use super::default_style::DefaultStyle;
use super::rules::{ListId, Matcher, RegexMatcher, Rule, StringSet};
use super::style::{Color, Style};
use crate::error::Result;

const HLC_OCT: &str = r"0[0-7]+";
const HLC_HEX: &str = r"0[xX][0-9a-fA-F]+";
const HLC_STRING_CHAR: &str = r#"\\(?:[abefnrtv"'?\\]|x[0-9a-fA-F]+|[0-7]+)"#;
const HLC_CHAR: &str = r#"'(?:\\(?:[abefnrtv"'?\\]|x[0-9a-fA-F]+|[0-7]+)|[^'\\])'"#;

/// A complete language definition for syntax highlighting
#[derive(Debug, Clone)]
pub struct LanguageDefinition {
    /// Language name (e.g., "Ruby", "Python")
    pub name: String,
    /// File extensions (e.g., ["rb"], ["py", "pyw"])
    pub extensions: Vec<String>,
    pub contexts: Contexts,
    /// Keyword lists referenced by `keyword` rules
    pub lists: Vec<StringSet>,
    /// The definition's item datas, linked to the basic attributes
    pub attributes: AttributeTable,
}

impl LanguageDefinition {
    /// Create a new empty language definition
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extensions: Vec::new(),
            contexts: Contexts::new(),
            lists: Vec::new(),
            attributes: AttributeTable::new(),
        }
    }

    /// Add a file extension
    pub fn add_extension(&mut self, ext: &str) {
        self.extensions.push(ext.to_string());
    }

    /// Add a keyword list to the side table
    pub fn add_list(&mut self, list: StringSet) -> ListId {
        self.lists.push(list);
        ListId(self.lists.len() - 1)
    }

    pub fn initial_context(&self) -> Option<ContextId> {
        self.contexts.initial()
    }

    /// Parse a definition from TOML source
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: DefinitionFile = toml::from_str(source)?;
        Ok(Builder::new(&file).build())
    }

    /// Load a definition from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionFile {
    name: String,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default = "default_true")]
    case_sensitive: bool,
    #[serde(default)]
    lists: HashMap<String, Vec<String>>,
    #[serde(default)]
    contexts: Vec<ContextDecl>,
    #[serde(default)]
    item_datas: Vec<ItemDataDecl>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextDecl {
    name: String,
    attribute: Option<String>,
    line_end_context: Option<String>,
    line_begin_context: Option<String>,
    fallthrough_context: Option<String>,
    #[serde(default)]
    rules: Vec<RuleDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDecl {
    #[serde(rename = "type")]
    kind: String,
    attribute: Option<String>,
    context: Option<String>,
    #[serde(rename = "char")]
    ch: Option<String>,
    char1: Option<String>,
    #[serde(rename = "String")]
    string: Option<String>,
    #[serde(default)]
    look_ahead: bool,
    #[serde(default)]
    first_non_space: bool,
    column: Option<usize>,
    #[serde(default)]
    dynamic: bool,
    insensitive: Option<bool>,
    #[serde(default)]
    minimal: bool,
    #[serde(default)]
    children: Vec<RuleDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDataDecl {
    name: String,
    def_style_num: Option<String>,
    color: Option<String>,
    background_color: Option<String>,
    bold: Option<bool>,
    italic: Option<bool>,
    underline: Option<bool>,
    #[serde(alias = "strikeout")]
    strike_out: Option<bool>,
}

fn single_char(value: Option<&str>) -> Option<char> {
    let mut chars = value?.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn parse_color(value: Option<&str>, item: &str) -> Option<Color> {
    let value = value?;
    let color = Color::parse(value);
    if color.is_none() {
        log::warn!("item data '{}': invalid color '{}'", item, value);
    }
    color
}

/// Turns the deserialized description into a definition
struct Builder<'a> {
    file: &'a DefinitionFile,
    language: LanguageDefinition,
    list_ids: HashMap<(String, bool), ListId>,
    flattened: HashMap<String, Vec<Rule>>,
}

impl<'a> Builder<'a> {
    fn new(file: &'a DefinitionFile) -> Self {
        let mut language = LanguageDefinition::new(&file.name);
        language.extensions = file.extensions.clone();
        Self {
            file,
            language,
            list_ids: HashMap::new(),
            flattened: HashMap::new(),
        }
    }

    fn build(mut self) -> LanguageDefinition {
        let file = self.file;
        for item in &file.item_datas {
            self.add_item_data(item);
        }
        for decl in &file.contexts {
            if self.language.contexts.id(&decl.name).is_some() {
                log::warn!("{}: context '{}' declared twice, the last one wins", file.name, decl.name);
            }
            self.language.contexts.declare(&decl.name);
        }

        let mut built = HashSet::new();
        for name in file.contexts.iter().map(|c| c.name.as_str()) {
            if !built.insert(name) {
                continue;
            }
            let (Some(decl), Some(id)) = (self.context_decl(name), self.language.contexts.id(name)) else {
                continue;
            };
            let mut context = Context::new(id, name, self.context_attribute(decl));
            context.rules = self.rules_of(name, &mut Vec::new());
            context.line_end = decl.line_end_context.as_deref().map(|t| self.resolve_target(t));
            context.line_begin = decl.line_begin_context.as_deref().map(|t| self.resolve_target(t));
            context.fallthrough = decl.fallthrough_context.as_deref().map(|t| self.resolve_target(t));
            self.language.contexts.insert(context);
        }

        log::debug!(
            "{}: {} contexts, {} lists, {} attributes",
            file.name,
            self.language.contexts.len(),
            self.language.lists.len(),
            self.language.attributes.len()
        );
        self.language
    }

    fn add_item_data(&mut self, item: &ItemDataDecl) {
        let table = &mut self.language.attributes;
        let id = table.id(&item.name);
        let basic = item.def_style_num.as_deref().and_then(|name| {
            let ds = DefaultStyle::from_name(name);
            if ds.is_none() {
                log::warn!("item data '{}': unknown default style '{}'", item.name, name);
            }
            ds.map(|ds| AttributeId(ds.index()))
        });
        table.set_basic(id, basic);
        table.set_style(
            id,
            Style {
                fg: parse_color(item.color.as_deref(), &item.name),
                bg: parse_color(item.background_color.as_deref(), &item.name),
                bold: item.bold,
                italic: item.italic,
                underline: item.underline,
                strikeout: item.strike_out,
            },
        );
    }

    /// The last declaration of a context name
    fn context_decl(&self, name: &str) -> Option<&'a ContextDecl> {
        self.file.contexts.iter().rev().find(|c| c.name == name)
    }

    fn context_attribute(&mut self, decl: &ContextDecl) -> AttributeId {
        let file = self.file;
        let name = decl
            .attribute
            .as_deref()
            .or_else(|| file.item_datas.first().map(|i| i.name.as_str()))
            .unwrap_or("");
        self.language.attributes.id(name)
    }

    /// Resolve `#stay`, `#pop`, `#pop#pop`... or a context name
    fn resolve_target(&self, target: &str) -> Transition {
        let target = target.trim();
        if target.is_empty() || target == "#stay" {
            return Transition::Stay;
        }
        if target.starts_with("#pop") {
            let mut rest = target;
            let mut pops = 0;
            while let Some(r) = rest.strip_prefix("#pop") {
                pops += 1;
                rest = r;
            }
            if !rest.is_empty() {
                log::warn!("{}: unsupported context target '{}', using {} pop(s)", self.file.name, target, pops);
            }
            return Transition::Pop(pops);
        }
        match self.language.contexts.id(target) {
            Some(id) => Transition::Push(id),
            None => {
                log::warn!("{}: unknown context '{}'", self.file.name, target);
                Transition::Stay
            }
        }
    }

    /// The rules of a context with `IncludeRules` flattened in
    fn rules_of(&mut self, name: &str, visiting: &mut Vec<String>) -> Vec<Rule> {
        self.flatten(name, visiting).0
    }

    /// Flatten `name` below the contexts in `visiting`
    ///
    /// The flag is set when a recursive re-entry was dropped anywhere
    /// below. Such a result depends on the path it was reached by, so only
    /// results without one are memoized.
    fn flatten(&mut self, name: &str, visiting: &mut Vec<String>) -> (Vec<Rule>, bool) {
        if let Some(rules) = self.flattened.get(name) {
            return (rules.clone(), false);
        }
        if visiting.iter().any(|v| v == name) {
            log::warn!("{}: recursive inclusion of context '{}'", self.file.name, name);
            return (Vec::new(), true);
        }
        let Some(decl) = self.context_decl(name) else {
            log::warn!("{}: cannot include unknown context '{}'", self.file.name, name);
            return (Vec::new(), false);
        };

        visiting.push(name.to_string());
        let default_attribute = self.context_attribute(decl);
        let mut rules = Vec::new();
        let mut cut = false;
        for rule in &decl.rules {
            if rule.kind == "IncludeRules" {
                match rule.context.as_deref() {
                    Some(target) => {
                        let (included, inner) = self.flatten(target, visiting);
                        rules.extend(included);
                        cut |= inner;
                    }
                    None => log::warn!("{}: IncludeRules without context in '{}'", self.file.name, name),
                }
            } else if let Some(rule) = self.convert(rule, default_attribute) {
                rules.push(rule);
            }
        }
        visiting.pop();

        if !cut {
            self.flattened.insert(name.to_string(), rules.clone());
        }
        (rules, cut)
    }

    fn list_id(&mut self, name: &str, insensitive: bool) -> Option<ListId> {
        let key = (name.to_string(), insensitive);
        if let Some(&id) = self.list_ids.get(&key) {
            return Some(id);
        }
        let words = self.file.lists.get(name)?;
        let id = self.language.add_list(StringSet::new(words, insensitive));
        self.list_ids.insert(key, id);
        Some(id)
    }

    fn convert(&mut self, decl: &RuleDecl, default_attribute: AttributeId) -> Option<Rule> {
        let insensitive = decl.insensitive.unwrap_or(false);
        let ch = single_char(decl.ch.as_deref());
        let ch1 = single_char(decl.char1.as_deref());
        let string = decl.string.as_deref();

        let file = self.file;
        let missing = |what: &str| {
            log::warn!("{}: {} rule without {}", file.name, decl.kind, what);
        };

        let attribute = match decl.attribute.as_deref() {
            Some(name) => self.language.attributes.id(name),
            None => default_attribute,
        };

        let mut rule = match decl.kind.as_str() {
            "keyword" => {
                let Some(name) = string else {
                    missing("String");
                    return None;
                };
                let insensitive = decl.insensitive.unwrap_or(!file.case_sensitive);
                match self.list_id(name, insensitive) {
                    Some(list) => Rule::keyword(list, attribute),
                    None => {
                        log::warn!("{}: unknown keyword list '{}'", file.name, name);
                        return None;
                    }
                }
            }
            kind => {
                let matcher = match kind {
                    "DetectChar" => {
                        let Some(c) = ch else {
                            missing("char");
                            return None;
                        };
                        let pattern = if decl.dynamic && c.is_ascii_digit() {
                            format!("%{}", c)
                        } else {
                            c.to_string()
                        };
                        Matcher::Literal { pattern, insensitive: false }
                    }
                    "Detect2Chars" => {
                        let (Some(c), Some(c1)) = (ch, ch1) else {
                            missing("char and char1");
                            return None;
                        };
                        Matcher::Literal { pattern: format!("{}{}", c, c1), insensitive: false }
                    }
                    "AnyChar" => {
                        let Some(set) = string else {
                            missing("String");
                            return None;
                        };
                        Matcher::CharClass(set.to_string())
                    }
                    "StringDetect" => {
                        let Some(s) = string else {
                            missing("String");
                            return None;
                        };
                        Matcher::Literal { pattern: s.to_string(), insensitive }
                    }
                    "WordDetect" => {
                        let Some(s) = string else {
                            missing("String");
                            return None;
                        };
                        Matcher::StringSet(StringSet::new([s], insensitive))
                    }
                    "RegExpr" => {
                        let Some(s) = string else {
                            missing("String");
                            return None;
                        };
                        Matcher::Regex(RegexMatcher::new(s, insensitive, decl.minimal))
                    }
                    "RangeDetect" => {
                        let (Some(c), Some(c1)) = (ch, ch1) else {
                            missing("char and char1");
                            return None;
                        };
                        Matcher::Range { open: c.to_string(), close: c1.to_string() }
                    }
                    "Int" => Matcher::Int,
                    "Float" => Matcher::Float,
                    "DetectIdentifier" => Matcher::Identifier,
                    "DetectSpaces" => Matcher::Whitespace,
                    "LineContinue" => Matcher::LineContinuation(ch.unwrap_or('\\')),
                    "HlCOct" => Matcher::Regex(RegexMatcher::new(HLC_OCT, false, false)),
                    "HlCHex" => Matcher::Regex(RegexMatcher::new(HLC_HEX, false, false)),
                    "HlCStringChar" => Matcher::Regex(RegexMatcher::new(HLC_STRING_CHAR, false, false)),
                    "HlCChar" => Matcher::Regex(RegexMatcher::new(HLC_CHAR, false, false)),
                    other => {
                        log::warn!("{}: unknown rule type '{}'", file.name, other);
                        return None;
                    }
                };
                Rule::new(matcher, attribute)
            }
        };

        rule.transition = decl
            .context
            .as_deref()
            .map_or(Transition::Stay, |t| self.resolve_target(t));
        rule.lookahead = decl.look_ahead;
        rule.first_non_space = decl.first_non_space;
        rule.column = decl.column;
        rule.dynamic = decl.dynamic;
        rule.children = decl
            .children
            .iter()
            .filter_map(|child| self.convert(child, attribute))
            .collect();
        Some(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::rules::MatcherRef;

    const SAMPLE: &str = r##"
name = "Sample"
extensions = ["smp"]

[lists]
keywords = ["def", "end", "if"]

[[contexts]]
name = "Normal"
attribute = "Normal Text"
rules = [
    { type = "keyword", String = "keywords", attribute = "Keyword" },
    { type = "keyword", String = "missing", attribute = "Keyword" },
    { type = "DetectChar", char = '"', attribute = "String", context = "String" },
    { type = "IncludeRules", context = "Numbers" },
    { type = "HlCHex", attribute = "Number" },
    { type = "Sparkle", attribute = "Number" },
    { type = "DetectChar", char = "#", attribute = "Comment", context = "Comment" },
]

[[contexts]]
name = "String"
attribute = "String"
lineEndContext = "#pop"
rules = [
    { type = "DetectChar", char = '"', attribute = "String", context = "#pop" },
    { type = "Detect2Chars", char = "%", char1 = "{", context = "Nowhere" },
]

[[contexts]]
name = "Numbers"
attribute = "Number"
rules = [
    { type = "Float", attribute = "Number" },
    { type = "IncludeRules", context = "Numbers" },
]

[[contexts]]
name = "Comment"
attribute = "Comment"
lineEndContext = "#pop#pop"
fallthroughContext = "#stay"

[[itemDatas]]
name = "Normal Text"
defStyleNum = "dsNormal"

[[itemDatas]]
name = "Keyword"
defStyleNum = "dsKeyword"
color = "#0000ff"

[[itemDatas]]
name = "String"
defStyleNum = "dsString"

[[itemDatas]]
name = "Number"
defStyleNum = "dsBogus"
bold = true
"##;

    #[test]
    fn test_context_ids_are_dense() {
        let lang = LanguageDefinition::from_toml_str(SAMPLE).unwrap();
        assert_eq!(lang.name, "Sample");
        assert_eq!(lang.extensions, vec!["smp".to_string()]);
        assert_eq!(lang.initial_context(), Some(1));
        assert_eq!(lang.contexts.id("Normal"), Some(1));
        assert_eq!(lang.contexts.id("String"), Some(2));
        assert_eq!(lang.contexts.id("Numbers"), Some(3));
        assert_eq!(lang.contexts.id("Comment"), Some(4));
    }

    #[test]
    fn test_rules_degrade_silently() {
        let lang = LanguageDefinition::from_toml_str(SAMPLE).unwrap();
        let normal = lang.contexts.by_name("Normal").unwrap();
        // keyword, string, included float, hex, comment; missing list and
        // unknown rule kind are dropped
        assert_eq!(normal.rules.len(), 5);
        assert!(matches!(normal.rules[0].matcher, MatcherRef::List(ListId(0))));
        assert_eq!(normal.rules[1].transition, Transition::Push(2));
        assert!(matches!(normal.rules[2].matcher, MatcherRef::Owned(Matcher::Float)));
        assert_eq!(lang.lists.len(), 1);

        let string = lang.contexts.by_name("String").unwrap();
        assert_eq!(string.rules[0].transition, Transition::Pop(1));
        assert_eq!(string.rules[1].transition, Transition::Stay);
        assert_eq!(string.line_end, Some(Transition::Pop(1)));
    }

    #[test]
    fn test_recursive_include_is_broken() {
        let lang = LanguageDefinition::from_toml_str(SAMPLE).unwrap();
        let numbers = lang.contexts.by_name("Numbers").unwrap();
        assert_eq!(numbers.rules.len(), 1);
    }

    const NORMAL_FIRST: &str = r##"
name = "Mutual"

[[contexts]]
name = "Normal"
rules = [
    { type = "DetectChar", char = "n" },
    { type = "IncludeRules", context = "X" },
]

[[contexts]]
name = "X"
rules = [
    { type = "DetectChar", char = "x" },
    { type = "IncludeRules", context = "Normal" },
]
"##;

    const X_FIRST: &str = r##"
name = "Mutual"

[[contexts]]
name = "X"
rules = [
    { type = "DetectChar", char = "x" },
    { type = "IncludeRules", context = "Normal" },
]

[[contexts]]
name = "Normal"
rules = [
    { type = "DetectChar", char = "n" },
    { type = "IncludeRules", context = "X" },
]
"##;

    #[test]
    fn test_mutual_include_ignores_declaration_order() {
        for source in [NORMAL_FIRST, X_FIRST] {
            let lang = LanguageDefinition::from_toml_str(source).unwrap();
            let x = lang.contexts.by_name("X").unwrap();
            let normal = lang.contexts.by_name("Normal").unwrap();
            assert_eq!(x.rules.len(), 2);
            assert_eq!(normal.rules.len(), 2);
            // each context keeps its own rule first
            assert!(matches!(
                &x.rules[0].matcher,
                MatcherRef::Owned(Matcher::Literal { pattern, .. }) if pattern == "x"
            ));
            assert!(matches!(
                &normal.rules[0].matcher,
                MatcherRef::Owned(Matcher::Literal { pattern, .. }) if pattern == "n"
            ));
        }
    }

    #[test]
    fn test_pop_targets() {
        let lang = LanguageDefinition::from_toml_str(SAMPLE).unwrap();
        let comment = lang.contexts.by_name("Comment").unwrap();
        assert_eq!(comment.line_end, Some(Transition::Pop(2)));
        assert_eq!(comment.fallthrough, Some(Transition::Stay));
        assert!(comment.rules.is_empty());
        // "Comment" is not an item data; it still gets an attribute id
        assert!(lang.attributes.lookup("Comment").is_some());
    }

    #[test]
    fn test_item_datas() {
        let lang = LanguageDefinition::from_toml_str(SAMPLE).unwrap();
        let table = &lang.attributes;
        assert_eq!(table.lookup("Normal Text"), Some(AttributeId(0)));
        assert_eq!(table.lookup("Keyword"), Some(AttributeId(1)));

        let keyword = table.lookup("Keyword").unwrap();
        assert_eq!(table.default_style(keyword), Some(DefaultStyle::Keyword));
        assert_eq!(table.style(keyword).fg, Some(Color::rgb(0, 0, 255)));

        let number = table.lookup("Number").unwrap();
        assert_eq!(table.basic_id(number), None);
        assert!(table.style(number).is_bold());
    }

    #[test]
    fn test_insensitive_keywords() {
        let source = r##"
name = "Loud"
caseSensitive = false
[lists]
kw = ["select"]
[[contexts]]
name = "Normal"
rules = [{ type = "keyword", String = "kw", attribute = "Keyword" }]
"##;
        let lang = LanguageDefinition::from_toml_str(source).unwrap();
        assert!(lang.lists[0].contains("SELECT"));
        assert_eq!(lang.lists[0].match_at("SeLeCt *", 0), Some(6));
    }

    #[test]
    fn test_dynamic_detect_char() {
        let source = r##"
name = "Dyn"
[[contexts]]
name = "Normal"
rules = [{ type = "DetectChar", char = "1", dynamic = true, context = "#pop" }]
"##;
        let lang = LanguageDefinition::from_toml_str(source).unwrap();
        let rule = &lang.contexts.by_name("Normal").unwrap().rules[0];
        assert!(rule.dynamic);
        assert!(matches!(
            &rule.matcher,
            MatcherRef::Owned(Matcher::Literal { pattern, .. }) if pattern == "%1"
        ));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(LanguageDefinition::from_toml_str("name = ").is_err());
        assert!(LanguageDefinition::from_toml_str("extensions = []").is_err());
    }
}
