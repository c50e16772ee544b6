//! Per-line highlighting driver
//!
//! [`BlockHighlighter`] runs the context-stack machine across one line of
//! text, starting from the end state of the previous line, and reports the
//! styled spans, the element metadata and the interned end state.

use std::cell::Cell;
use std::rc::Rc;

use super::attributes::AttributeId;
use super::language::LanguageDefinition;
use super::state::{HighlighterState, StateCache, StateId};
use super::style::{Element, Span};

/// Consecutive zero-width matches tolerated at one position
const MAX_ZERO_WIDTH_STEPS: usize = 32;

thread_local! {
    /// Pass counter shared by every highlighter on this thread
    static GENERATION: Cell<u64> = const { Cell::new(0) };
}

/// A generation no earlier pass on this thread has used
///
/// Regex search caches live in the shared language and are keyed by it.
fn next_generation() -> u64 {
    GENERATION.with(|g| {
        let next = g.get() + 1;
        g.set(next);
        next
    })
}

/// Result of highlighting one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    /// Spans covering the whole line, in order
    pub spans: Vec<Span>,
    /// Metadata for consumers such as bracket matching
    pub elements: Vec<Element>,
    /// State at end of line (for next line)
    pub state: StateId,
}

/// Highlights lines of one document with one language
pub struct BlockHighlighter {
    language: Rc<LanguageDefinition>,
    states: StateCache,
}

/// Collects spans and elements for one line
struct LineOutput<'a> {
    language: &'a LanguageDefinition,
    spans: Vec<Span>,
    elements: Vec<Element>,
}

impl LineOutput<'_> {
    fn basic(&self, attribute: AttributeId) -> Option<AttributeId> {
        self.language.attributes.basic_id(attribute)
    }

    fn span(&mut self, start: usize, end: usize, attribute: AttributeId) {
        if end > start {
            self.spans.push(Span::new(start, end, attribute, self.basic(attribute)));
        }
    }

    fn element(&mut self, start: usize, end: usize, attribute: AttributeId) {
        if end > start {
            self.elements.push(Element {
                start,
                len: end - start,
                basic: self.basic(attribute),
            });
        }
    }
}

/// Text up to the current position that no rule claimed
struct PendingRun {
    start: usize,
    /// First non-whitespace character of the run
    element_start: Option<usize>,
    attribute: AttributeId,
}

impl PendingRun {
    fn flush(self, end: usize, out: &mut LineOutput<'_>) {
        out.span(self.start, end, self.attribute);
        if let Some(element_start) = self.element_start {
            out.element(element_start, end, self.attribute);
        }
    }
}

impl BlockHighlighter {
    pub fn new(language: Rc<LanguageDefinition>) -> Self {
        Self {
            language,
            states: StateCache::new(),
        }
    }

    pub fn language(&self) -> &LanguageDefinition {
        &self.language
    }

    /// The state a document starts in
    pub fn initial_state(&self) -> HighlighterState {
        HighlighterState::new(self.language.initial_context().unwrap_or(1))
    }

    /// Look up an interned state
    pub fn state(&self, id: StateId) -> Option<&HighlighterState> {
        self.states.get(id)
    }

    /// Intern a state
    pub fn intern(&mut self, state: HighlighterState) -> StateId {
        self.states.intern(state)
    }

    /// Forget all interned states; previously returned ids become invalid
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// Highlight one line starting from the previous line's end state
    ///
    /// `None`, or an id this highlighter does not know, starts from the
    /// initial state.
    pub fn highlight_block(&mut self, text: &str, previous: Option<StateId>) -> BlockResult {
        let mut state = previous
            .and_then(|id| self.states.get(id))
            .cloned()
            .unwrap_or_else(|| self.initial_state());
        let (spans, elements) = self.run(text, &mut state);
        BlockResult {
            spans,
            elements,
            state: self.states.intern(state),
        }
    }

    fn run(&mut self, text: &str, state: &mut HighlighterState) -> (Vec<Span>, Vec<Element>) {
        let generation = next_generation();
        let language = &*self.language;
        let contexts = &language.contexts;
        let lists = &language.lists[..];

        let mut out = LineOutput {
            language,
            spans: Vec::new(),
            elements: Vec::new(),
        };
        let mut pending: Option<PendingRun> = None;
        let mut index: Option<usize> = None;
        let mut zero_width_steps = 0;

        while index.unwrap_or(0) < text.len() {
            let pos = index.unwrap_or(0);
            let step = state.match_at(contexts, lists, text, generation, index);

            let matched = step.matched.filter(|&(end, _)| {
                if end > pos {
                    zero_width_steps = 0;
                    true
                } else {
                    zero_width_steps += 1;
                    zero_width_steps <= MAX_ZERO_WIDTH_STEPS
                }
            });

            match matched {
                Some((end, attribute)) => {
                    if let Some(run) = pending.take() {
                        run.flush(pos, &mut out);
                    }
                    out.span(pos, end, attribute);
                    out.element(pos, end, attribute);
                    index = Some(end);
                }
                None => {
                    if step.matched.is_some() {
                        log::debug!("{}: zero-width transitions stalled at {}", language.name, pos);
                    }
                    zero_width_steps = 0;
                    // pos < text.len() on a char boundary
                    let c = text[pos..].chars().next().unwrap_or(' ');
                    let run = pending.get_or_insert(PendingRun {
                        start: pos,
                        element_start: None,
                        attribute: step.default_attribute,
                    });
                    if run.element_start.is_none() && !c.is_whitespace() {
                        run.element_start = Some(pos);
                    }
                    index = Some(pos + c.len_utf8());
                }
            }
        }

        let end = index.unwrap_or(0).min(text.len());
        if let Some(run) = pending.take() {
            run.flush(end, &mut out);
        }
        if end < text.len() {
            let attribute = contexts
                .get(state.top().context)
                .map_or(AttributeId(0), |c| c.attribute);
            out.span(end, text.len(), attribute);
        }

        // Let a line-end context take effect for the next line
        state.match_at(contexts, lists, text, generation, Some(text.len()));

        (out.spans, out.elements)
    }
}
