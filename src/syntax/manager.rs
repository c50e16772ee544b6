//! Syntax highlighting manager
//!
//! This module provides the SyntaxManager that coordinates language
//! detection, highlighter creation, and per-line caching.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use super::attributes::{AttributeId, AttributeTable};
use super::builtin;
use super::highlighter::BlockHighlighter;
use super::language::LanguageDefinition;
use super::state::StateId;
use super::style::{Element, Span, Style};
use crate::error::{HighlightError, Result};

#[derive(Debug, Clone, Default)]
struct LineEntry {
    /// State the line was highlighted from
    start: Option<StateId>,
    /// State at end of line
    end: Option<StateId>,
    /// Cached spans (None = needs recomputation)
    spans: Option<Vec<Span>>,
    elements: Vec<Element>,
}

/// Per-buffer highlighting cache
///
/// State ids are only meaningful for the highlighter that produced them;
/// call [`HighlightCache::invalidate_all`] when switching highlighters.
#[derive(Debug, Default)]
pub struct HighlightCache {
    /// Language for this buffer (None if no highlighting)
    pub language: Option<String>,
    lines: Vec<LineEntry>,
}

impl HighlightCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language for this buffer
    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
        self.invalidate_all();
    }

    /// Invalidate cache from a specific line onwards
    pub fn invalidate_from(&mut self, line: usize) {
        for entry in self.lines.iter_mut().skip(line) {
            entry.spans = None;
        }
    }

    /// Invalidate a single edited line
    pub fn invalidate_line(&mut self, line: usize) {
        if let Some(entry) = self.lines.get_mut(line) {
            entry.spans = None;
        }
    }

    /// Invalidate entire cache
    pub fn invalidate_all(&mut self) {
        self.lines.clear();
    }

    /// Make room for `count` lines inserted before `at`
    pub fn insert_lines(&mut self, at: usize, count: usize) {
        let at = at.min(self.lines.len());
        self.lines
            .splice(at..at, std::iter::repeat_with(LineEntry::default).take(count));
    }

    /// Drop `count` lines starting at `at`; the line now at `at` is re-checked
    pub fn remove_lines(&mut self, at: usize, count: usize) {
        let at = at.min(self.lines.len());
        let end = at.saturating_add(count).min(self.lines.len());
        self.lines.drain(at..end);
        self.invalidate_line(at);
    }

    /// Bring the cache up to date with `lines`
    ///
    /// Dirty lines and lines whose start state changed are highlighted
    /// again; everything else is reused. Returns the number of lines
    /// highlighted.
    pub fn update<S: AsRef<str>>(&mut self, highlighter: &mut BlockHighlighter, lines: &[S]) -> usize {
        self.lines.resize_with(lines.len(), LineEntry::default);
        let mut previous: Option<StateId> = None;
        let mut highlighted = 0;
        for (entry, text) in self.lines.iter_mut().zip(lines) {
            if entry.spans.is_none() || entry.start != previous {
                let result = highlighter.highlight_block(text.as_ref(), previous);
                entry.start = previous;
                entry.end = Some(result.state);
                entry.spans = Some(result.spans);
                entry.elements = result.elements;
                highlighted += 1;
            }
            previous = entry.end;
        }
        highlighted
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Cached spans of a line, if up to date
    pub fn spans(&self, line: usize) -> Option<&[Span]> {
        self.lines.get(line)?.spans.as_deref()
    }

    /// Element metadata of a line, if up to date
    pub fn elements(&self, line: usize) -> Option<&[Element]> {
        let entry = self.lines.get(line)?;
        entry.spans.as_ref().map(|_| entry.elements.as_slice())
    }

    pub fn end_state(&self, line: usize) -> Option<StateId> {
        self.lines.get(line)?.end
    }
}

/// A buffer's cache and the highlighter that fills it
struct BufferHighlight {
    cache: HighlightCache,
    highlighter: Option<BlockHighlighter>,
}

/// Main syntax highlighting manager
pub struct SyntaxManager {
    /// Loaded language definitions
    languages: HashMap<String, Rc<LanguageDefinition>>,
    /// Extension to language name mapping
    extension_map: HashMap<String, String>,
    /// Basic attributes shared by all languages
    basic: AttributeTable,
    /// Per-buffer caches (buffer index -> cache)
    buffers: HashMap<usize, BufferHighlight>,
    /// Whether syntax highlighting is enabled
    pub enabled: bool,
}

impl SyntaxManager {
    /// Create a new syntax manager with built-in languages
    pub fn new() -> Self {
        let mut manager = Self::empty();
        for lang in builtin::all_languages() {
            manager.add_language(lang);
        }
        manager
    }

    /// Create a manager without any languages
    pub fn empty() -> Self {
        Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
            basic: AttributeTable::basic(),
            buffers: HashMap::new(),
            enabled: true,
        }
    }

    /// Add a language definition, replacing one with the same name
    pub fn add_language(&mut self, lang: LanguageDefinition) {
        let name = lang.name.clone();
        for ext in &lang.extensions {
            self.extension_map.insert(ext.to_lowercase(), name.clone());
        }
        if self.languages.insert(name.clone(), Rc::new(lang)).is_some() {
            log::info!("replaced language definition '{}'", name);
        }
    }

    /// Load every `*.toml` definition in a directory
    ///
    /// Files that fail to parse are skipped with a warning. Returns the
    /// number of definitions loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match LanguageDefinition::from_file(&path) {
                Ok(lang) => {
                    log::debug!("loaded '{}' from {}", lang.name, path.display());
                    self.add_language(lang);
                    loaded += 1;
                }
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
        Ok(loaded)
    }

    /// Detect language from filename
    pub fn detect_language(&self, filename: &Path) -> Option<&str> {
        let ext = filename.extension()?.to_str()?.to_lowercase();
        self.extension_map.get(&ext).map(|s| s.as_str())
    }

    /// Get a language definition by name
    pub fn get_language(&self, name: &str) -> Option<Rc<LanguageDefinition>> {
        self.languages.get(name).cloned()
    }

    /// Create a fresh highlighter for a language
    pub fn highlighter(&self, name: &str) -> Result<BlockHighlighter> {
        self.get_language(name)
            .map(BlockHighlighter::new)
            .ok_or_else(|| HighlightError::UnknownLanguage(name.to_string()))
    }

    /// The basic attributes
    pub fn basic_attributes(&self) -> &AttributeTable {
        &self.basic
    }

    /// Apply user style overrides to the basic attributes
    pub fn apply_style_overrides(&mut self, overrides: &str) -> Result<()> {
        self.basic.apply_overrides(overrides)
    }

    /// The style to render an attribute of a language with
    pub fn style_for(&self, language: &LanguageDefinition, attribute: AttributeId) -> Style {
        language.attributes.effective_style(attribute, &self.basic)
    }

    /// Set language for a buffer based on filename
    pub fn set_buffer_language(&mut self, buffer_idx: usize, filename: Option<&Path>) {
        let lang_name = filename
            .and_then(|f| self.detect_language(f))
            .map(|s| s.to_string());
        self.set_buffer_language_name(buffer_idx, lang_name);
    }

    /// Set language for a buffer by name (None disables highlighting)
    pub fn set_buffer_language_name(&mut self, buffer_idx: usize, lang_name: Option<String>) {
        let highlighter = lang_name.as_deref().and_then(|name| self.highlighter(name).ok());
        let buffer = self.buffers.entry(buffer_idx).or_insert_with(|| BufferHighlight {
            cache: HighlightCache::new(),
            highlighter: None,
        });
        buffer.cache.set_language(lang_name.filter(|_| highlighter.is_some()));
        buffer.highlighter = highlighter;
    }

    /// Get the cache of a buffer
    pub fn get_cache(&self, buffer_idx: usize) -> Option<&HighlightCache> {
        self.buffers.get(&buffer_idx).map(|b| &b.cache)
    }

    /// Remove cache for a buffer (when buffer is closed)
    pub fn remove_cache(&mut self, buffer_idx: usize) {
        self.buffers.remove(&buffer_idx);
    }

    /// Invalidate cache from a line onwards
    pub fn invalidate_from(&mut self, buffer_idx: usize, line: usize) {
        if let Some(buffer) = self.buffers.get_mut(&buffer_idx) {
            buffer.cache.invalidate_from(line);
        }
    }

    /// Re-highlight a buffer's stale lines; returns how many were highlighted
    pub fn update_buffer<S: AsRef<str>>(&mut self, buffer_idx: usize, lines: &[S]) -> usize {
        if !self.enabled {
            return 0;
        }
        match self.buffers.get_mut(&buffer_idx) {
            Some(BufferHighlight {
                cache,
                highlighter: Some(highlighter),
            }) => cache.update(highlighter, lines),
            _ => 0,
        }
    }

    /// Spans of a buffer line. Empty if there is no highlighting.
    pub fn line_spans(&self, buffer_idx: usize, line_idx: usize) -> Vec<Span> {
        if !self.enabled {
            return Vec::new();
        }
        self.get_cache(buffer_idx)
            .and_then(|cache| cache.spans(line_idx))
            .map(|spans| spans.to_vec())
            .unwrap_or_default()
    }

    /// List available languages
    pub fn list_languages(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.languages.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Toggle syntax highlighting on/off
    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }
}

impl Default for SyntaxManager {
    fn default() -> Self {
        Self::new()
    }
}
