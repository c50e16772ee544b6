//! Built-in language definitions
//!
//! The definitions are embedded TOML sources in the same format that
//! [`SyntaxManager::load_dir`](super::SyntaxManager::load_dir) reads from
//! disk.

use super::language::LanguageDefinition;

const SOURCES: &[(&str, &str)] = &[
    ("ruby.toml", include_str!("ruby.toml")),
    ("python.toml", include_str!("python.toml")),
];

/// Get all built-in language definitions
pub fn all_languages() -> Vec<LanguageDefinition> {
    SOURCES
        .iter()
        .filter_map(|(file, source)| match LanguageDefinition::from_toml_str(source) {
            Ok(lang) => Some(lang),
            Err(e) => {
                log::error!("built-in definition {} is invalid: {}", file, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::highlighter::BlockHighlighter;
    use std::rc::Rc;

    fn language(name: &str) -> Rc<LanguageDefinition> {
        let lang = all_languages().into_iter().find(|l| l.name == name).unwrap();
        Rc::new(lang)
    }

    fn attribute_names(hl: &mut BlockHighlighter, text: &str) -> Vec<(String, String)> {
        let result = hl.highlight_block(text, None);
        let attrs = &hl.language().attributes;
        result
            .spans
            .iter()
            .map(|s| (text[s.start..s.end].to_string(), attrs.name(s.attribute).unwrap_or("").to_string()))
            .collect()
    }

    fn has(spans: &[(String, String)], text: &str, attribute: &str) -> bool {
        spans.iter().any(|(t, a)| t == text && a == attribute)
    }

    #[test]
    fn test_builtins_parse() {
        let languages = all_languages();
        assert_eq!(languages.len(), SOURCES.len());
        for lang in &languages {
            assert!(lang.initial_context().is_some(), "{} has no contexts", lang.name);
            assert!(!lang.extensions.is_empty());
        }
    }

    #[test]
    fn test_ruby_line() {
        let mut hl = BlockHighlighter::new(language("Ruby"));
        let spans = attribute_names(&mut hl, "def greet(name) puts \"hi #{name}\" end # TODO");
        assert!(has(&spans, "def", "Keyword"));
        assert!(has(&spans, "puts", "Kernel Method"));
        assert!(has(&spans, "#{", "Substitution"));
        assert!(has(&spans, "end", "Keyword"));
        assert!(has(&spans, "TODO", "Alert"));
    }

    #[test]
    fn test_ruby_heredoc() {
        let mut hl = BlockHighlighter::new(language("Ruby"));
        let initial = hl.highlight_block("", None).state;

        let first = hl.highlight_block("text = <<~EOS", None);
        assert_ne!(first.state, initial);
        let body = hl.highlight_block("  EOT is not the end", Some(first.state));
        assert_eq!(body.state, first.state);
        let last = hl.highlight_block("  EOS", Some(body.state));
        assert_eq!(last.state, initial);
    }

    #[test]
    fn test_ruby_embedded_documentation() {
        let mut hl = BlockHighlighter::new(language("Ruby"));
        let initial = hl.highlight_block("x = 1", None).state;
        let begin = hl.highlight_block("=begin", None);
        assert_ne!(begin.state, initial);
        let text = hl.highlight_block("x = 1 =end", Some(begin.state));
        assert_eq!(text.state, begin.state);
        assert_eq!(hl.highlight_block("=end", Some(text.state)).state, initial);
    }

    #[test]
    fn test_python_line() {
        let mut hl = BlockHighlighter::new(language("Python"));
        let spans = attribute_names(&mut hl, "if x is None: print(0x1F, 2.5j, 'a\\n')");
        assert!(has(&spans, "if", "Keyword"));
        assert!(has(&spans, "None", "Special Variable"));
        assert!(has(&spans, "print", "Builtin Function"));
        assert!(has(&spans, "0x1F", "Hex"));
        assert!(has(&spans, "2.5j", "Float"));
        assert!(has(&spans, "\\n", "String Char"));
    }

    #[test]
    fn test_python_docstring_spans_lines() {
        let mut hl = BlockHighlighter::new(language("Python"));
        let initial = hl.highlight_block("", None).state;
        let open = hl.highlight_block("    \"\"\"Docstring", None);
        assert_ne!(open.state, initial);
        let close = hl.highlight_block("    with (parens)\"\"\"", Some(open.state));
        assert_eq!(close.state, initial);

        // single-quoted strings end with the line
        assert_eq!(hl.highlight_block("s = 'open", None).state, initial);
    }
}
