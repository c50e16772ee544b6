//! Syntax highlighting module
//!
//! A language definition is a set of named contexts, each an ordered list
//! of rules. Lines are highlighted one at a time by a [`BlockHighlighter`]
//! that carries a stack of contexts from the end of one line to the start
//! of the next; the [`SyntaxManager`] loads definitions and the
//! [`HighlightCache`] keeps line results for incremental re-highlighting.

mod style;
mod default_style;
mod attributes;
mod rules;
mod context;
mod state;
mod language;
mod highlighter;
mod manager;
mod brackets;
mod builtin;

pub use style::{Color, Element, Span, Style};
pub use default_style::DefaultStyle;
pub use attributes::{AttributeId, AttributeTable};
pub use rules::{ListId, Matcher, MatcherRef, RegexMatcher, Rule, StringSet};
pub use context::{Context, ContextId, Contexts, Transition};
pub use state::{HighlighterState, StackEntry, StateCache, StateId};
pub use language::LanguageDefinition;
pub use highlighter::{BlockHighlighter, BlockResult};
pub use manager::{HighlightCache, SyntaxManager};
pub use brackets::find_matching_bracket;
