//! Highlighter state: the context stack carried from line to line
//!
//! States are interned per highlighter so a line's end state can be stored
//! as a small integer and compared cheaply.

use std::collections::HashMap;

use super::attributes::AttributeId;
use super::context::{ContextId, Contexts, Transition};
use super::rules::{MatchInput, StringSet};

/// One level of the context stack
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackEntry {
    pub context: ContextId,
    /// Arguments captured by the rule that pushed this context
    pub args: Vec<String>,
}

/// Outcome of one [`HighlighterState::match_at`] step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Default attribute of the context that was on top before the step
    pub default_attribute: AttributeId,
    /// End offset and attribute of a successful match
    pub matched: Option<(usize, AttributeId)>,
}

/// A non-empty stack of contexts; the bottom entry is the initial context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HighlighterState {
    stack: Vec<StackEntry>,
}

impl HighlighterState {
    pub fn new(initial: ContextId) -> Self {
        Self {
            stack: vec![StackEntry {
                context: initial,
                args: Vec::new(),
            }],
        }
    }

    pub fn top(&self) -> &StackEntry {
        // the stack is never empty
        &self.stack[self.stack.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.stack
    }

    /// Apply a transition
    ///
    /// Popping at least as many levels as there are above the initial
    /// entry leaves just the initial context with no arguments.
    pub fn apply(&mut self, transition: Transition, args: Vec<String>) {
        match transition {
            Transition::Stay => {}
            Transition::Push(context) => self.stack.push(StackEntry { context, args }),
            Transition::Pop(n) => {
                let n = n as usize;
                if n >= self.stack.len() {
                    self.stack.truncate(1);
                    self.stack[0].args.clear();
                } else {
                    self.stack.truncate(self.stack.len() - n);
                }
            }
        }
    }

    /// Match the top context at `index` and apply the resulting transition
    pub fn match_at(
        &mut self,
        contexts: &Contexts,
        lists: &[StringSet],
        line: &str,
        generation: u64,
        index: Option<usize>,
    ) -> StepResult {
        let Some(context) = contexts.get(self.top().context) else {
            return StepResult {
                default_attribute: AttributeId(0),
                matched: None,
            };
        };
        let default_attribute = context.attribute;

        let input = MatchInput {
            line,
            generation,
            args: &self.top().args,
            lists,
        };
        let Some(found) = context.match_at(&input, index) else {
            return StepResult {
                default_attribute,
                matched: None,
            };
        };

        self.apply(found.transition, found.captures);
        StepResult {
            default_attribute,
            matched: Some((found.end, found.attribute)),
        }
    }
}

/// Interned state id, valid for the highlighter that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub usize);

/// Interning table of highlighter states
#[derive(Debug, Default)]
pub struct StateCache {
    ids: HashMap<HighlighterState, StateId>,
    states: Vec<HighlighterState>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id of a structurally equal state, assigning one on first sight
    pub fn intern(&mut self, state: HighlighterState) -> StateId {
        if let Some(&id) = self.ids.get(&state) {
            return id;
        }
        let id = StateId(self.states.len());
        self.states.push(state.clone());
        self.ids.insert(state, id);
        id
    }

    pub fn get(&self, id: StateId) -> Option<&HighlighterState> {
        self.states.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.states.clear();
    }
}
