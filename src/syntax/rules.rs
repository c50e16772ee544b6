//! Pattern rules for syntax highlighting
//!
//! A rule is an atomic matcher tried at one position of a line. On
//! success it reports where the match ends, which attribute to paint it
//! with and which context transition to perform.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::ops::Bound;

use regex::{Captures, Regex, RegexBuilder};

use super::attributes::AttributeId;
use super::context::Transition;

/// Characters that make up identifiers for keyword-boundary purposes
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace `%1`..`%9` in a dynamic pattern with captured arguments
///
/// Missing arguments substitute as empty strings. With `escape` set the
/// arguments are regex-escaped first.
pub fn substitute<'a>(pattern: &'a str, args: &[String], escape: bool) -> Cow<'a, str> {
    if !pattern.contains('%') {
        return Cow::Borrowed(pattern);
    }
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(n) = chars.peek().and_then(|d| d.to_digit(10)).filter(|&n| n > 0) {
                chars.next();
                if let Some(arg) = args.get(n as usize - 1) {
                    if escape {
                        out.push_str(&regex::escape(arg));
                    } else {
                        out.push_str(arg);
                    }
                }
                continue;
            }
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Byte offset reached after advancing `n` characters into `s`
fn advance_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Length in bytes of the longest common prefix, on a char boundary
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}

/// Everything a rule sees while matching one line
pub struct MatchInput<'a> {
    /// The complete line text
    pub line: &'a str,
    /// Id of the current highlighting pass
    pub generation: u64,
    /// Arguments captured when the current context was pushed
    pub args: &'a [String],
    /// Side table of shared keyword lists
    pub lists: &'a [StringSet],
}

/// A successful rule match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Byte offset where the match ends
    pub end: usize,
    /// Captured groups, handed to a pushed context as its arguments
    pub captures: Vec<String>,
}

impl RuleMatch {
    fn at(end: usize) -> Self {
        Self {
            end,
            captures: Vec::new(),
        }
    }
}

/// Index of a shared keyword list in the definition's side table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(pub usize);

/// A set of keywords matched with keyword-boundary semantics
///
/// The longest member starting at the position wins, provided neither the
/// character before nor the one after the match is a word character.
#[derive(Debug, Clone, Default)]
pub struct StringSet {
    words: BTreeSet<String>,
    insensitive: bool,
    max_chars: usize,
}

impl StringSet {
    pub fn new<I, S>(words: I, insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: BTreeSet<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .map(|w| if insensitive { w.to_lowercase() } else { w })
            .collect();
        let max_chars = words.iter().map(|w| w.chars().count()).max().unwrap_or(0);
        Self {
            words,
            insensitive,
            max_chars,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        if self.insensitive {
            self.words.contains(&word.to_lowercase())
        } else {
            self.words.contains(word)
        }
    }

    /// Match the longest member starting at `index`
    pub fn match_at(&self, line: &str, index: usize) -> Option<usize> {
        if !line.is_char_boundary(index) {
            return None;
        }
        if line[..index].chars().next_back().is_some_and(is_word_char) {
            return None;
        }
        let rest = &line[index..];
        let window = &rest[..advance_chars(rest, self.max_chars)];
        let key: Cow<str> = if self.insensitive {
            Cow::Owned(window.to_lowercase())
        } else {
            Cow::Borrowed(window)
        };

        // Walk down from the upper bound of the key; every probe either is a
        // prefix of the key or narrows the bound to the shared prefix.
        let mut upper: Bound<&str> = Bound::Included(&*key);
        loop {
            let candidate = self.words.range::<str, _>((Bound::Unbounded, upper)).next_back()?;
            if key.starts_with(candidate.as_str()) {
                let end = index + advance_chars(rest, candidate.chars().count());
                if !line[end..].chars().next().is_some_and(is_word_char) {
                    return Some(end);
                }
                upper = Bound::Excluded(candidate.as_str());
            } else {
                let common = common_prefix_len(&key, candidate);
                if common == 0 {
                    return None;
                }
                upper = Bound::Included(&key[..common]);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    WordBoundary,
    NotWordBoundary,
    LineStart,
}

/// Cheap precondition checked before running the regex engine
#[derive(Debug, Clone, Copy, Default)]
struct Prefilter {
    anchor: Option<Anchor>,
    first: Option<char>,
}

impl Prefilter {
    fn analyze(pattern: &str, insensitive: bool) -> Self {
        if has_top_level_alternation(pattern) {
            return Self::default();
        }
        let (anchor, rest) = if let Some(rest) = pattern.strip_prefix("\\b") {
            (Some(Anchor::WordBoundary), rest)
        } else if let Some(rest) = pattern.strip_prefix("\\B") {
            (Some(Anchor::NotWordBoundary), rest)
        } else if let Some(rest) = pattern.strip_prefix('^') {
            (Some(Anchor::LineStart), rest)
        } else {
            (None, pattern)
        };
        let first = plain_first_char(rest).filter(|c| !insensitive || c.is_ascii());
        Self { anchor, first }
    }

    fn admits(&self, line: &str, index: usize, insensitive: bool) -> bool {
        let next = line[index..].chars().next();
        if let Some(anchor) = self.anchor {
            let before = line[..index].chars().next_back().is_some_and(is_word_char);
            let after = next.is_some_and(is_word_char);
            let ok = match anchor {
                Anchor::WordBoundary => before != after,
                Anchor::NotWordBoundary => before == after,
                Anchor::LineStart => index == 0,
            };
            if !ok {
                return false;
            }
        }
        match (self.first, next) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(f), Some(c)) if insensitive => f.eq_ignore_ascii_case(&c),
            (Some(f), Some(c)) => f == c,
        }
    }
}

fn has_top_level_alternation(pattern: &str) -> bool {
    let mut depth = 0usize;
    let mut in_class = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => depth = depth.saturating_sub(1),
            '|' if !in_class && depth == 0 => return true,
            _ => {}
        }
    }
    false
}

fn plain_first_char(pattern: &str) -> Option<char> {
    let mut chars = pattern.chars();
    let c = chars.next()?;
    // '%' may open a dynamic placeholder
    if "\\[](){}.^$|?*+%".contains(c) {
        return None;
    }
    match chars.next() {
        // the first character is optional
        Some('?') | Some('*') | Some('{') => None,
        _ => Some(c),
    }
}

/// Outcome of the last search of a static regex within one pass
#[derive(Debug, Clone, Copy, Default)]
struct SearchCache {
    generation: u64,
    from: usize,
    /// Start of the next match at or after `from`, `usize::MAX` if none
    next: usize,
}

/// A regular expression rule
///
/// Static patterns are compiled once. The search cache is a performance
/// aid only: a search from `from` that found its next match at `next`
/// proves no match starts in `[from, next)` on the same line, so within
/// the same generation those positions are rejected without searching.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pattern: String,
    insensitive: bool,
    minimal: bool,
    compiled: Option<Regex>,
    prefilter: Prefilter,
    cache: Cell<SearchCache>,
    dynamic_cache: RefCell<Option<(String, Regex)>>,
}

impl RegexMatcher {
    /// Create a matcher; a pattern that fails to compile never matches
    pub fn new(pattern: &str, insensitive: bool, minimal: bool) -> Self {
        let compiled = match Self::build(pattern, insensitive, minimal) {
            Ok(re) => Some(re),
            Err(e) => {
                log::warn!("invalid regular expression '{}': {}", pattern, e);
                None
            }
        };
        Self {
            pattern: pattern.to_string(),
            insensitive,
            minimal,
            compiled,
            prefilter: Prefilter::analyze(pattern, insensitive),
            cache: Cell::new(SearchCache::default()),
            dynamic_cache: RefCell::new(None),
        }
    }

    fn build(pattern: &str, insensitive: bool, minimal: bool) -> Result<Regex, regex::Error> {
        RegexBuilder::new(pattern)
            .case_insensitive(insensitive)
            .swap_greed(minimal)
            .build()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the static pattern compiled
    pub fn is_valid(&self) -> bool {
        self.compiled.is_some()
    }

    fn captures(caps: &Captures<'_>) -> Vec<String> {
        caps.iter()
            .skip(1)
            .map(|g| g.map_or_else(String::new, |m| m.as_str().to_string()))
            .collect()
    }

    fn match_at(&self, input: &MatchInput<'_>, index: usize, dynamic: bool) -> Option<RuleMatch> {
        if !self.prefilter.admits(input.line, index, self.insensitive) {
            return None;
        }
        if dynamic {
            return self.match_dynamic(input, index);
        }
        let re = self.compiled.as_ref()?;

        let cached = self.cache.get();
        if cached.generation == input.generation && cached.from <= index && index < cached.next {
            return None;
        }

        let (next, result) = match re.captures_at(input.line, index) {
            Some(caps) => {
                // group 0 always participates in a match
                let whole = caps.get(0)?;
                if whole.start() == index {
                    (index, Some(RuleMatch { end: whole.end(), captures: Self::captures(&caps) }))
                } else {
                    (whole.start(), None)
                }
            }
            None => (usize::MAX, None),
        };
        self.cache.set(SearchCache {
            generation: input.generation,
            from: index,
            next,
        });
        result
    }

    fn match_dynamic(&self, input: &MatchInput<'_>, index: usize) -> Option<RuleMatch> {
        let pattern = substitute(&self.pattern, input.args, true);
        let mut slot = self.dynamic_cache.borrow_mut();
        let fresh = !matches!(&*slot, Some((p, _)) if *p == pattern);
        if fresh {
            let re = Self::build(&pattern, self.insensitive, self.minimal).ok()?;
            *slot = Some((pattern.into_owned(), re));
        }
        let (_, re) = slot.as_ref()?;
        let caps = re.captures_at(input.line, index)?;
        let whole = caps.get(0)?;
        (whole.start() == index).then(|| RuleMatch {
            end: whole.end(),
            captures: Self::captures(&caps),
        })
    }
}

/// The atomic matcher kinds
#[derive(Debug, Clone)]
pub enum Matcher {
    /// An exact string, optionally case-insensitive
    Literal { pattern: String, insensitive: bool },
    /// The longest member of a keyword set
    StringSet(StringSet),
    /// An opening string followed by a closing string later on the line
    Range { open: String, close: String },
    /// Optional `-` and one or more digits
    Int,
    /// Optional `-`, digits, optional fraction, optional exponent
    Float,
    /// `[A-Za-z][A-Za-z0-9]*` (Unicode letters and digits)
    Identifier,
    /// The given character as the very last character of the line
    LineContinuation(char),
    /// A run of spaces and tabs
    Whitespace,
    /// Exactly one character out of a set
    CharClass(String),
    Regex(RegexMatcher),
}

impl Matcher {
    fn match_at(&self, input: &MatchInput<'_>, index: usize, dynamic: bool) -> Option<RuleMatch> {
        let line = input.line;
        let rest = &line[index..];
        match self {
            Matcher::Literal { pattern, insensitive } => {
                let pattern = if dynamic {
                    substitute(pattern, input.args, false)
                } else {
                    Cow::Borrowed(pattern.as_str())
                };
                match_literal(rest, &pattern, *insensitive).map(|len| RuleMatch::at(index + len))
            }
            Matcher::StringSet(set) => set.match_at(line, index).map(RuleMatch::at),
            Matcher::Range { open, close } => {
                let (open, close) = if dynamic {
                    (substitute(open, input.args, false), substitute(close, input.args, false))
                } else {
                    (Cow::Borrowed(open.as_str()), Cow::Borrowed(close.as_str()))
                };
                if open.is_empty() || close.is_empty() || !rest.starts_with(&*open) {
                    return None;
                }
                let body = index + open.len();
                line[body..]
                    .find(&*close)
                    .map(|pos| RuleMatch::at(body + pos + close.len()))
            }
            Matcher::Int => match_int(rest).map(|len| RuleMatch::at(index + len)),
            Matcher::Float => match_float(rest).map(|len| RuleMatch::at(index + len)),
            Matcher::Identifier => {
                let mut chars = rest.char_indices();
                let (_, first) = chars.next()?;
                if !first.is_alphabetic() {
                    return None;
                }
                let len = chars
                    .find(|(_, c)| !c.is_alphanumeric())
                    .map_or(rest.len(), |(i, _)| i);
                Some(RuleMatch::at(index + len))
            }
            Matcher::LineContinuation(c) => {
                let mut chars = rest.chars();
                (chars.next() == Some(*c) && chars.next().is_none()).then(|| RuleMatch::at(line.len()))
            }
            Matcher::Whitespace => {
                let len = rest.len() - rest.trim_start_matches([' ', '\t']).len();
                (len > 0).then(|| RuleMatch::at(index + len))
            }
            Matcher::CharClass(set) => {
                let c = rest.chars().next()?;
                set.contains(c).then(|| RuleMatch::at(index + c.len_utf8()))
            }
            Matcher::Regex(re) => re.match_at(input, index, dynamic),
        }
    }
}

fn match_literal(rest: &str, pattern: &str, insensitive: bool) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }
    if !insensitive {
        return rest.starts_with(pattern).then_some(pattern.len());
    }
    let mut text = rest.char_indices();
    for p in pattern.chars() {
        let (_, t) = text.next()?;
        if !t.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    Some(text.next().map_or(rest.len(), |(i, _)| i))
}

fn count_digits(bytes: &[u8], from: usize) -> usize {
    bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count()
}

fn match_int(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let sign = usize::from(bytes.first() == Some(&b'-'));
    let digits = count_digits(bytes, sign);
    (digits > 0).then_some(sign + digits)
}

/// Matches a float; a bare exponent marker is consumed even without digits
fn match_float(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut i = usize::from(bytes.first() == Some(&b'-'));
    let int_digits = count_digits(bytes, i);
    i += int_digits;
    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        frac_digits = count_digits(bytes, i + 1);
        i += 1 + frac_digits;
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        i += 1;
        if bytes.get(i) == Some(&b'-') {
            i += 1;
        }
        i += count_digits(bytes, i);
    }
    Some(i)
}

/// The matcher a rule delegates to
#[derive(Debug, Clone)]
pub enum MatcherRef {
    /// A matcher owned by the rule
    Owned(Matcher),
    /// A keyword list shared through the definition's side table
    List(ListId),
}

/// A rule: a matcher plus its attribute, transition and constraints
#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: MatcherRef,
    /// Attribute painted over the match
    pub attribute: AttributeId,
    /// Context transition performed on match
    pub transition: Transition,
    /// Match without consuming input
    pub lookahead: bool,
    /// Only match when everything before is whitespace
    pub first_non_space: bool,
    /// Only match at this character column
    pub column: Option<usize>,
    /// Substitute `%N` placeholders from the context's arguments
    pub dynamic: bool,
    /// Rules tried right after this one matched, extending the match
    pub children: Vec<Rule>,
}

impl Rule {
    pub fn new(matcher: Matcher, attribute: AttributeId) -> Self {
        Self::with_matcher(MatcherRef::Owned(matcher), attribute)
    }

    /// A rule matching a shared keyword list
    pub fn keyword(list: ListId, attribute: AttributeId) -> Self {
        Self::with_matcher(MatcherRef::List(list), attribute)
    }

    fn with_matcher(matcher: MatcherRef, attribute: AttributeId) -> Self {
        Self {
            matcher,
            attribute,
            transition: Transition::Stay,
            lookahead: false,
            first_non_space: false,
            column: None,
            dynamic: false,
            children: Vec::new(),
        }
    }

    /// Builder: set the transition
    pub fn to(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }

    /// Builder: make the rule non-consuming
    pub fn lookahead(mut self) -> Self {
        self.lookahead = true;
        self
    }

    /// Builder: require only whitespace before the match
    pub fn first_non_space(mut self) -> Self {
        self.first_non_space = true;
        self
    }

    /// Builder: require a fixed column
    pub fn at_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    /// Builder: enable placeholder substitution
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Builder: append a child rule
    pub fn with_child(mut self, child: Rule) -> Self {
        self.children.push(child);
        self
    }

    /// Try this rule at `index`
    pub fn matches(&self, input: &MatchInput<'_>, index: usize) -> Option<RuleMatch> {
        let line = input.line;
        if index > line.len() || !line.is_char_boundary(index) {
            return None;
        }
        if let Some(column) = self.column {
            if line[..index].chars().count() != column {
                return None;
            }
        }
        if self.first_non_space && !line[..index].chars().all(char::is_whitespace) {
            return None;
        }

        let mut found = match &self.matcher {
            MatcherRef::Owned(matcher) => matcher.match_at(input, index, self.dynamic)?,
            MatcherRef::List(list) => RuleMatch::at(input.lists.get(list.0)?.match_at(line, index)?),
        };
        if self.lookahead {
            found.end = index;
        }

        for child in &self.children {
            if let Some(extension) = child.matches(input, found.end) {
                found.end = extension.end;
                break;
            }
        }
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(line: &'a str, args: &'a [String], lists: &'a [StringSet]) -> MatchInput<'a> {
        MatchInput {
            line,
            generation: 1,
            args,
            lists,
        }
    }

    fn end_of(rule: &Rule, line: &str, index: usize) -> Option<usize> {
        rule.matches(&input(line, &[], &[]), index).map(|m| m.end)
    }

    fn rule(matcher: Matcher) -> Rule {
        Rule::new(matcher, AttributeId(0))
    }

    #[test]
    fn test_literal() {
        let r = rule(Matcher::Literal { pattern: "=>".into(), insensitive: false });
        assert_eq!(end_of(&r, "a => b", 2), Some(4));
        assert_eq!(end_of(&r, "a => b", 1), None);

        let r = rule(Matcher::Literal { pattern: "BEGIN".into(), insensitive: true });
        assert_eq!(end_of(&r, "begin end", 0), Some(5));
        assert_eq!(end_of(&r, "beg", 0), None);
    }

    #[test]
    fn test_string_set_longest_member() {
        let set = StringSet::new(["if", "iffy", "in", "include"], false);
        assert_eq!(set.match_at("include x", 0), Some(7));
        assert_eq!(set.match_at("iffy", 0), Some(4));
        assert_eq!(set.match_at("in(", 0), Some(2));
        assert_eq!(set.match_at("x if y", 2), Some(4));
        assert_eq!(set.match_at("is", 0), None);
    }

    #[test]
    fn test_string_set_keyword_boundaries() {
        let set = StringSet::new(["if"], false);
        assert_eq!(set.match_at("iffy", 0), None);
        assert_eq!(set.match_at("elif", 2), None);
        assert_eq!(set.match_at("if_x", 0), None);
        assert_eq!(set.match_at("(if)", 1), Some(3));
        assert_eq!(set.match_at("if", 0), Some(2));
    }

    #[test]
    fn test_string_set_falls_back_to_shorter_member() {
        // "end" is blocked by the trailing word character; "en d" is not
        let set = StringSet::new(["e", "end", "en d"], false);
        assert_eq!(set.match_at("endx", 0), None);
        assert_eq!(set.match_at("en d", 0), Some(4));
        assert_eq!(set.match_at("e+", 0), Some(1));
    }

    #[test]
    fn test_string_set_insensitive() {
        let set = StringSet::new(["Select", "FROM"], true);
        assert!(set.contains("select"));
        assert_eq!(set.match_at("SELECT a from b", 0), Some(6));
        assert_eq!(set.match_at("SELECT a from b", 9), Some(13));
    }

    #[test]
    fn test_string_set_rejects_index_inside_char() {
        let set = StringSet::new(["if"], false);
        assert_eq!(set.match_at("é if", 1), None);
        assert_eq!(set.match_at("é if", 3), Some(5));
        assert_eq!(set.match_at("if", 9), None);
    }

    #[test]
    fn test_range() {
        let r = rule(Matcher::Range { open: "<".into(), close: ">".into() });
        assert_eq!(end_of(&r, "a <b> c", 2), Some(5));
        assert_eq!(end_of(&r, "a <b c", 2), None);
        assert_eq!(end_of(&r, "a b> c", 2), None);
    }

    #[test]
    fn test_int() {
        let r = rule(Matcher::Int);
        assert_eq!(end_of(&r, "123abc", 0), Some(3));
        assert_eq!(end_of(&r, "-42", 0), Some(3));
        assert_eq!(end_of(&r, "-", 0), None);
        assert_eq!(end_of(&r, "x1", 0), None);
    }

    #[test]
    fn test_float() {
        let r = rule(Matcher::Float);
        assert_eq!(end_of(&r, "12.5", 0), Some(4));
        assert_eq!(end_of(&r, "12.5e", 0), Some(5));
        assert_eq!(end_of(&r, "1e-3", 0), Some(4));
        assert_eq!(end_of(&r, "-.5E2", 0), Some(5));
        assert_eq!(end_of(&r, "7", 0), Some(1));
        assert_eq!(end_of(&r, "3.times", 0), Some(1));
        assert_eq!(end_of(&r, "-.", 0), None);
        assert_eq!(end_of(&r, "e5", 0), None);
    }

    #[test]
    fn test_identifier() {
        let r = rule(Matcher::Identifier);
        assert_eq!(end_of(&r, "abc9 x", 0), Some(4));
        assert_eq!(end_of(&r, "a_b", 0), Some(1));
        assert_eq!(end_of(&r, "9abc", 0), None);
        assert_eq!(end_of(&r, "_abc", 0), None);
    }

    #[test]
    fn test_line_continuation() {
        let r = rule(Matcher::LineContinuation('\\'));
        assert_eq!(end_of(&r, "a = 1 + \\", 8), Some(9));
        assert_eq!(end_of(&r, "a \\ b", 2), None);
    }

    #[test]
    fn test_whitespace_and_char_class() {
        let ws = rule(Matcher::Whitespace);
        assert_eq!(end_of(&ws, "a \t b", 1), Some(4));
        assert_eq!(end_of(&ws, "ab", 1), None);

        let ops = rule(Matcher::CharClass("+-*/".into()));
        assert_eq!(end_of(&ops, "a*b", 1), Some(2));
        assert_eq!(end_of(&ops, "a*b", 0), None);
    }

    #[test]
    fn test_regex_anchored_at_index() {
        let r = rule(Matcher::Regex(RegexMatcher::new(r"[0-9]+", false, false)));
        assert_eq!(end_of(&r, "ab 12", 0), None);
        assert_eq!(end_of(&r, "ab 12", 3), Some(5));
    }

    #[test]
    fn test_regex_prefilters() {
        let r = rule(Matcher::Regex(RegexMatcher::new(r"\bdef\b", false, false)));
        assert_eq!(end_of(&r, "def x", 0), Some(3));
        assert_eq!(end_of(&r, "undef x", 2), None);

        let r = rule(Matcher::Regex(RegexMatcher::new(r"^#.*", false, false)));
        assert_eq!(end_of(&r, "#x", 0), Some(2));
        assert_eq!(end_of(&r, "a #x", 2), None);

        // alternation disables the first-character shortcut
        let r = rule(Matcher::Regex(RegexMatcher::new(r"a|b", false, false)));
        assert_eq!(end_of(&r, "b", 0), Some(1));

        let r = rule(Matcher::Regex(RegexMatcher::new(r"x?y", false, false)));
        assert_eq!(end_of(&r, "y", 0), Some(1));
    }

    #[test]
    fn test_regex_search_cache_within_generation() {
        let r = rule(Matcher::Regex(RegexMatcher::new(r"[0-9]+", false, false)));
        let line = "abc 42";
        let lists: Vec<StringSet> = Vec::new();
        let at = |generation: u64, index: usize| {
            let input = MatchInput { line, generation, args: &[], lists: &lists };
            r.matches(&input, index).map(|m| m.end)
        };
        assert_eq!(at(5, 0), None);
        assert_eq!(at(5, 1), None);
        assert_eq!(at(5, 4), Some(6));
        assert_eq!(at(6, 4), Some(6));
        assert_eq!(at(6, 5), Some(6));
    }

    #[test]
    fn test_regex_captures_and_invalid_pattern() {
        let r = rule(Matcher::Regex(RegexMatcher::new(r"<<(\w+)", false, false)));
        let found = r.matches(&input("x = <<EOS", &[], &[]), 4).unwrap();
        assert_eq!(found.end, 9);
        assert_eq!(found.captures, vec!["EOS".to_string()]);

        let bad = RegexMatcher::new(r"(unclosed", false, false);
        assert!(!bad.is_valid());
        assert_eq!(end_of(&rule(Matcher::Regex(bad)), "(unclosed", 0), None);
    }

    #[test]
    fn test_regex_minimal_and_insensitive() {
        let r = rule(Matcher::Regex(RegexMatcher::new(r"<.+>", false, true)));
        assert_eq!(end_of(&r, "<a> <b>", 0), Some(3));
        let r = rule(Matcher::Regex(RegexMatcher::new(r"select", true, false)));
        assert_eq!(end_of(&r, "SELECT", 0), Some(6));
    }

    #[test]
    fn test_dynamic_substitution() {
        let args = vec!["EOS".to_string()];
        let literal = rule(Matcher::Literal { pattern: "%1".into(), insensitive: false }).dynamic();
        assert_eq!(literal.matches(&input("EOS", &args, &[]), 0).map(|m| m.end), Some(3));
        assert_eq!(literal.matches(&input("EOX", &args, &[]), 0), None);
        // without captured arguments the placeholder is empty and never matches
        assert_eq!(literal.matches(&input("EOS", &[], &[]), 0), None);

        let args = vec!["a.b".to_string()];
        let re = rule(Matcher::Regex(RegexMatcher::new(r"^%1$", false, false))).dynamic();
        assert!(re.matches(&input("a.b", &args, &[]), 0).is_some());
        assert!(re.matches(&input("axb", &args, &[]), 0).is_none());
    }

    #[test]
    fn test_substitute() {
        let args = vec!["x".to_string(), "y+".to_string()];
        assert_eq!(substitute("%1-%2", &args, false), "x-y+");
        assert_eq!(substitute("%1-%2", &args, true), r"x-y\+");
        assert_eq!(substitute("100%", &args, false), "100%");
        assert_eq!(substitute("%3%0", &args, false), "%0");
    }

    #[test]
    fn test_column_and_first_non_space() {
        let r = rule(Matcher::Literal { pattern: "#".into(), insensitive: false }).at_column(0);
        assert_eq!(end_of(&r, "#x", 0), Some(1));
        assert_eq!(end_of(&r, " #x", 1), None);

        let r = rule(Matcher::Literal { pattern: "=begin".into(), insensitive: false }).first_non_space();
        assert_eq!(end_of(&r, "  =begin", 2), Some(8));
        assert_eq!(end_of(&r, "x =begin", 2), None);
    }

    #[test]
    fn test_lookahead_and_children() {
        let r = rule(Matcher::Literal { pattern: "\"".into(), insensitive: false }).lookahead();
        assert_eq!(end_of(&r, "\"a\"", 0), Some(0));

        let r = rule(Matcher::Literal { pattern: "0".into(), insensitive: false })
            .with_child(rule(Matcher::CharClass("xX".into())))
            .with_child(rule(Matcher::CharClass("bB".into())));
        assert_eq!(end_of(&r, "0x1", 0), Some(2));
        assert_eq!(end_of(&r, "0b1", 0), Some(2));
        assert_eq!(end_of(&r, "01", 0), Some(1));
    }

    #[test]
    fn test_shared_list_reference() {
        let lists = vec![StringSet::new(["def", "end"], false)];
        let r = Rule::keyword(ListId(0), AttributeId(3));
        assert_eq!(r.matches(&input("def f", &[], &lists), 0).map(|m| m.end), Some(3));
        let dangling = Rule::keyword(ListId(7), AttributeId(3));
        assert_eq!(dangling.matches(&input("def f", &[], &lists), 0), None);
    }
}
