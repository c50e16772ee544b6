//! Contexts and context transitions
//!
//! A context is a lexical mode (plain code, inside a string, inside a
//! comment ...) holding an ordered list of rules and the transitions taken
//! at line boundaries or when nothing matches.

use std::collections::HashMap;

use super::attributes::AttributeId;
use super::rules::{MatchInput, Rule};

/// Dense context id, starting at 1
pub type ContextId = u32;

/// What a match does to the context stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Transition {
    #[default]
    Stay,
    Push(ContextId),
    /// Pop this many levels (never below the initial entry)
    Pop(u32),
}

impl Transition {
    /// Decode the signed form: 0 stays, positive pushes, negative pops
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Transition::Stay,
            n if n > 0 => Transition::Push(n.unsigned_abs()),
            n => Transition::Pop(n.unsigned_abs()),
        }
    }

    /// Encode as the signed form
    pub fn raw(&self) -> i32 {
        match *self {
            Transition::Stay => 0,
            Transition::Push(id) => i32::try_from(id).unwrap_or(i32::MAX),
            Transition::Pop(n) => i32::try_from(n).map_or(i32::MIN, |n| -n),
        }
    }

    pub fn is_stay(&self) -> bool {
        *self == Transition::Stay
    }
}

/// Result of matching a context at one position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMatch {
    /// Where the match ends; equal to the start for zero-width transitions
    pub end: usize,
    pub captures: Vec<String>,
    pub transition: Transition,
    pub attribute: AttributeId,
}

/// A named lexical mode
#[derive(Debug, Clone)]
pub struct Context {
    pub id: ContextId,
    pub name: String,
    pub rules: Vec<Rule>,
    /// Attribute for text no rule claims
    pub attribute: AttributeId,
    pub fallthrough: Option<Transition>,
    pub line_begin: Option<Transition>,
    pub line_end: Option<Transition>,
}

impl Context {
    pub fn new(id: ContextId, name: &str, attribute: AttributeId) -> Self {
        Self {
            id,
            name: name.to_string(),
            rules: Vec::new(),
            attribute,
            fallthrough: None,
            line_begin: None,
            line_end: None,
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    fn transition_at(&self, end: usize, transition: Transition) -> ContextMatch {
        ContextMatch {
            end,
            captures: Vec::new(),
            transition,
            attribute: self.attribute,
        }
    }

    /// Match this context at `index` (`None` is the position before the line)
    ///
    /// All rules are tried. The first one that matches is taken and a later
    /// one only replaces it by ending strictly further, so equal-length
    /// matches go to the first declared rule.
    pub fn match_at(&self, input: &MatchInput<'_>, index: Option<usize>) -> Option<ContextMatch> {
        let index = match index {
            None => {
                if let Some(t) = self.line_begin.filter(|t| !t.is_stay()) {
                    return Some(self.transition_at(0, t));
                }
                0
            }
            Some(index) => index,
        };

        if index >= input.line.len() {
            return self
                .line_end
                .filter(|t| !t.is_stay())
                .map(|t| self.transition_at(index, t));
        }

        let mut best: Option<(&Rule, usize, Vec<String>)> = None;
        for rule in &self.rules {
            if let Some(found) = rule.matches(input, index) {
                if best.as_ref().map_or(true, |(_, end, _)| found.end > *end) {
                    best = Some((rule, found.end, found.captures));
                }
            }
        }
        if let Some((rule, end, captures)) = best {
            return Some(ContextMatch {
                end,
                captures,
                transition: rule.transition,
                attribute: rule.attribute,
            });
        }

        self.fallthrough
            .filter(|t| !t.is_stay())
            .map(|t| self.transition_at(index, t))
    }
}

/// The registry of a definition's contexts
#[derive(Debug, Clone, Default)]
pub struct Contexts {
    contexts: Vec<Context>,
    ids: HashMap<String, ContextId>,
}

impl Contexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context name, returning its id
    ///
    /// Ids are dense from 1 in order of first registration.
    pub fn declare(&mut self, name: &str) -> ContextId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = ContextId::try_from(self.contexts.len() + 1).unwrap_or(ContextId::MAX);
        self.contexts.push(Context::new(id, name, AttributeId(0)));
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Add or replace a context; its id is taken from its name
    pub fn insert(&mut self, mut context: Context) -> ContextId {
        let id = self.declare(&context.name);
        context.id = id;
        self.contexts[id as usize - 1] = context;
        id
    }

    pub fn id(&self, name: &str) -> Option<ContextId> {
        self.ids.get(name).copied()
    }

    pub fn get(&self, id: ContextId) -> Option<&Context> {
        (id as usize).checked_sub(1).and_then(|i| self.contexts.get(i))
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        (id as usize).checked_sub(1).and_then(move |i| self.contexts.get_mut(i))
    }

    pub fn by_name(&self, name: &str) -> Option<&Context> {
        self.id(name).and_then(|id| self.get(id))
    }

    /// The first registered context
    pub fn initial(&self) -> Option<ContextId> {
        (!self.contexts.is_empty()).then_some(1)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.contexts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::rules::{Matcher, StringSet};

    fn lit(s: &str, attr: usize) -> Rule {
        Rule::new(Matcher::Literal { pattern: s.into(), insensitive: false }, AttributeId(attr))
    }

    fn run(ctx: &Context, line: &str, index: Option<usize>) -> Option<ContextMatch> {
        let lists: Vec<StringSet> = Vec::new();
        let input = MatchInput { line, generation: 1, args: &[], lists: &lists };
        ctx.match_at(&input, index)
    }

    #[test]
    fn test_transition_raw() {
        assert_eq!(Transition::from_raw(0), Transition::Stay);
        assert_eq!(Transition::from_raw(3), Transition::Push(3));
        assert_eq!(Transition::from_raw(-2), Transition::Pop(2));
        assert_eq!(Transition::Pop(2).raw(), -2);
        assert_eq!(Transition::Push(5).raw(), 5);
        assert_eq!(Transition::Stay.raw(), 0);
    }

    #[test]
    fn test_longest_match_wins() {
        let mut ctx = Context::new(1, "Normal", AttributeId(0));
        ctx.add_rule(lit("=", 1));
        ctx.add_rule(lit("==", 2));
        let m = run(&ctx, "a == b", Some(2)).unwrap();
        assert_eq!(m.end, 4);
        assert_eq!(m.attribute, AttributeId(2));
    }

    #[test]
    fn test_equal_length_keeps_first_declared() {
        let mut ctx = Context::new(1, "Normal", AttributeId(0));
        ctx.add_rule(lit("ab", 1));
        ctx.add_rule(Rule::new(Matcher::Identifier, AttributeId(2)));
        let m = run(&ctx, "ab", Some(0)).unwrap();
        assert_eq!(m.attribute, AttributeId(1));
    }

    #[test]
    fn test_lookahead_transition_is_selected() {
        let mut ctx = Context::new(1, "Normal", AttributeId(0));
        ctx.add_rule(lit("#", 1).lookahead().to(Transition::Push(2)));
        let m = run(&ctx, "# c", Some(0)).unwrap();
        assert_eq!(m.end, 0);
        assert_eq!(m.transition, Transition::Push(2));
    }

    #[test]
    fn test_fallthrough_and_no_match() {
        let mut ctx = Context::new(1, "Normal", AttributeId(7));
        ctx.add_rule(lit("x", 1));
        assert_eq!(run(&ctx, "y", Some(0)), None);

        ctx.fallthrough = Some(Transition::Pop(1));
        let m = run(&ctx, "y", Some(0)).unwrap();
        assert_eq!(m.end, 0);
        assert_eq!(m.transition, Transition::Pop(1));
        assert_eq!(m.attribute, AttributeId(7));

        ctx.fallthrough = Some(Transition::Stay);
        assert_eq!(run(&ctx, "y", Some(0)), None);
    }

    #[test]
    fn test_line_boundaries() {
        let mut ctx = Context::new(1, "Normal", AttributeId(0));
        ctx.add_rule(lit("a", 1));
        // no line-begin context: behaves like index 0
        assert_eq!(run(&ctx, "a", None).map(|m| m.end), Some(1));
        assert_eq!(run(&ctx, "a", Some(1)), None);

        ctx.line_begin = Some(Transition::Push(2));
        ctx.line_end = Some(Transition::Pop(1));
        let begin = run(&ctx, "a", None).unwrap();
        assert_eq!((begin.end, begin.transition), (0, Transition::Push(2)));
        let end = run(&ctx, "a", Some(1)).unwrap();
        assert_eq!((end.end, end.transition), (1, Transition::Pop(1)));
    }

    #[test]
    fn test_contexts_registry() {
        let mut contexts = Contexts::new();
        assert_eq!(contexts.initial(), None);
        assert_eq!(contexts.declare("Normal"), 1);
        assert_eq!(contexts.declare("String"), 2);
        assert_eq!(contexts.declare("Normal"), 1);
        assert_eq!(contexts.initial(), Some(1));

        let mut string = Context::new(0, "String", AttributeId(4));
        string.add_rule(lit("\"", 4));
        assert_eq!(contexts.insert(string), 2);
        assert_eq!(contexts.get(2).map(|c| c.rules.len()), Some(1));
        assert_eq!(contexts.by_name("String").map(|c| c.id), Some(2));
        assert!(contexts.get(0).is_none());
        assert!(contexts.get(3).is_none());
    }
}
