//! Bracket matching over highlighted lines
//!
//! Brackets inside strings, character literals and comments are content,
//! not structure, and are skipped using the cached element metadata.

use super::default_style::DefaultStyle;
use super::manager::HighlightCache;

fn pair(c: char) -> Option<(char, char, bool)> {
    match c {
        '(' => Some(('(', ')', true)),
        '[' => Some(('[', ']', true)),
        '{' => Some(('{', '}', true)),
        ')' => Some(('(', ')', false)),
        ']' => Some(('[', ']', false)),
        '}' => Some(('{', '}', false)),
        _ => None,
    }
}

/// Whether byte `column` of `line` lies in a quoted element
fn is_quoted(cache: &HighlightCache, line: usize, column: usize) -> bool {
    cache.elements(line).is_some_and(|elements| {
        elements.iter().any(|e| {
            e.contains(column)
                && e
                    .basic
                    .and_then(|b| DefaultStyle::from_index(b.0))
                    .is_some_and(|ds| ds.is_quoted())
        })
    })
}

/// Find the bracket matching the one at (`line`, `column`)
///
/// `column` is a byte offset. Returns `None` when there is no bracket
/// there, when that bracket is quoted, or when it is unbalanced. Lines the
/// cache has no elements for are scanned as plain text.
pub fn find_matching_bracket<S: AsRef<str>>(
    lines: &[S],
    cache: &HighlightCache,
    line: usize,
    column: usize,
) -> Option<(usize, usize)> {
    let text = lines.get(line)?.as_ref();
    let c = text.get(column..)?.chars().next()?;
    let (open, close, forward) = pair(c)?;
    if is_quoted(cache, line, column) {
        return None;
    }

    let mut depth = 0usize;
    let mut visit = |l: usize, pos: usize, ch: char| -> bool {
        if is_quoted(cache, l, pos) {
            return false;
        }
        let (deeper, shallower) = if forward { (open, close) } else { (close, open) };
        if ch == deeper {
            depth += 1;
        } else if ch == shallower {
            depth -= 1;
            return depth == 0;
        }
        false
    };

    if forward {
        for (l, text) in lines.iter().enumerate().skip(line) {
            let text = text.as_ref();
            let start = if l == line { column } else { 0 };
            for (i, ch) in text[start..].char_indices() {
                if visit(l, start + i, ch) {
                    return Some((l, start + i));
                }
            }
        }
    } else {
        for l in (0..=line).rev() {
            let text = lines[l].as_ref();
            let end = if l == line { column + c.len_utf8() } else { text.len() };
            for (pos, ch) in text[..end].char_indices().rev() {
                if visit(l, pos, ch) {
                    return Some((l, pos));
                }
            }
        }
    }
    None
}
