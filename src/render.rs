//! Terminal output of highlighted lines using crossterm

use std::io::Write;

use crossterm::{
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
};

use crate::error::Result;
use crate::syntax::{Color, LanguageDefinition, Span, Style, SyntaxManager};

fn term_color(color: Color) -> crossterm::style::Color {
    crossterm::style::Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

/// Expand tabs to spaces; `column` is the display column so far
fn expand_tabs(text: &str, column: &mut usize, tab_width: usize) -> String {
    let tab_width = tab_width.max(1);
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\t' {
            let n = tab_width - (*column % tab_width);
            out.extend(std::iter::repeat(' ').take(n));
            *column += n;
        } else {
            out.push(c);
            *column += 1;
        }
    }
    out
}

/// Writes highlighted lines to a terminal or any other writer
pub struct Renderer<W: Write> {
    out: W,
    /// Emit escape sequences
    pub color: bool,
    pub line_numbers: bool,
    pub tab_width: usize,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            color: true,
            line_numbers: false,
            tab_width: 8,
        }
    }

    fn set_style(&mut self, style: &Style) -> Result<()> {
        if let Some(fg) = style.fg {
            queue!(self.out, SetForegroundColor(term_color(fg)))?;
        }
        if let Some(bg) = style.bg {
            queue!(self.out, SetBackgroundColor(term_color(bg)))?;
        }
        if style.is_bold() {
            queue!(self.out, SetAttribute(Attribute::Bold))?;
        }
        if style.is_italic() {
            queue!(self.out, SetAttribute(Attribute::Italic))?;
        }
        if style.is_underline() {
            queue!(self.out, SetAttribute(Attribute::Underlined))?;
        }
        if style.is_strikeout() {
            queue!(self.out, SetAttribute(Attribute::CrossedOut))?;
        }
        Ok(())
    }

    /// Reset all attributes
    fn reset_attributes(&mut self) -> Result<()> {
        queue!(self.out, ResetColor, SetAttribute(Attribute::Reset))?;
        Ok(())
    }

    /// Write one line with its spans
    pub fn write_line(
        &mut self,
        number: usize,
        text: &str,
        spans: &[Span],
        language: &LanguageDefinition,
        manager: &SyntaxManager,
    ) -> Result<()> {
        if self.line_numbers {
            if self.color {
                queue!(self.out, SetAttribute(Attribute::Dim))?;
            }
            queue!(self.out, Print(format!("{:>5} ", number)))?;
            if self.color {
                queue!(self.out, SetAttribute(Attribute::NormalIntensity))?;
            }
        }

        let mut column = 0;
        let mut written = 0;
        for span in spans {
            if span.start < written || span.end > text.len() {
                continue;
            }
            if span.start > written {
                let plain = expand_tabs(&text[written..span.start], &mut column, self.tab_width);
                queue!(self.out, Print(plain))?;
            }
            let piece = expand_tabs(&text[span.start..span.end], &mut column, self.tab_width);
            let style = manager.style_for(language, span.attribute);
            if self.color && !style.is_default() {
                self.set_style(&style)?;
                queue!(self.out, Print(piece))?;
                self.reset_attributes()?;
            } else {
                queue!(self.out, Print(piece))?;
            }
            written = span.end;
        }
        if written < text.len() {
            let rest = expand_tabs(&text[written..], &mut column, self.tab_width);
            queue!(self.out, Print(rest))?;
        }
        queue!(self.out, Print("\n"))?;
        Ok(())
    }

    /// Write the span table of a line: `line start end attribute`
    pub fn write_spans(&mut self, number: usize, spans: &[Span], language: &LanguageDefinition) -> Result<()> {
        for span in spans {
            let name = language.attributes.name(span.attribute).unwrap_or("?");
            writeln!(self.out, "{}\t{}\t{}\t{}", number, span.start, span.end, name)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
