//! genhl - highlight source files on the terminal

use std::env;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use genhl::config::Config;
use genhl::error::{HighlightError, Result};
use genhl::render::Renderer;
use genhl::syntax::{HighlightCache, LanguageDefinition, SyntaxManager};

/// Parsed command line
#[derive(Debug, Default)]
struct Options {
    language: Option<String>,
    definition: Option<PathBuf>,
    spans: bool,
    list: bool,
    file: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut opts = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-V" => {
                print_version();
                return Ok(None);
            }
            "--language" | "-l" => {
                let value = iter
                    .next()
                    .ok_or_else(|| HighlightError::Message(format!("{} needs a language name", arg)))?;
                opts.language = Some(value.clone());
            }
            "--definition" | "-d" => {
                let value = iter
                    .next()
                    .ok_or_else(|| HighlightError::Message(format!("{} needs a file", arg)))?;
                opts.definition = Some(PathBuf::from(value));
            }
            "--spans" => opts.spans = true,
            "--list" => opts.list = true,
            "-" => opts.file = None,
            other if other.starts_with('-') => {
                return Err(HighlightError::Message(format!("unknown option '{}'", other)));
            }
            other => opts.file = Some(PathBuf::from(other)),
        }
    }

    Ok(Some(opts))
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some(opts) = parse_args(&args)? else {
        return Ok(());
    };

    let config = Config::load();
    let mut manager = SyntaxManager::new();
    if let Some(dir) = &config.definitions_dir {
        match manager.load_dir(dir) {
            Ok(n) => log::info!("loaded {} definitions from {}", n, dir.display()),
            Err(e) => log::warn!("cannot read {}: {}", dir.display(), e),
        }
    }
    if let Some(styles) = &config.styles {
        manager.apply_style_overrides(styles)?;
    }

    let explicit = match &opts.definition {
        Some(path) => {
            let lang = LanguageDefinition::from_file(path)?;
            let name = lang.name.clone();
            manager.add_language(lang);
            Some(name)
        }
        None => opts.language.clone(),
    };

    if opts.list {
        for name in manager.list_languages() {
            let exts = manager
                .get_language(name)
                .map(|l| l.extensions.join(", "))
                .unwrap_or_default();
            println!("{:<16} {}", name, exts);
        }
        return Ok(());
    }

    let text = read_input(opts.file.as_deref())?;
    let lines: Vec<&str> = text.lines().collect();

    let name = explicit
        .or_else(|| {
            opts.file
                .as_deref()
                .and_then(|f| manager.detect_language(f))
                .map(|s| s.to_string())
        })
        .ok_or_else(|| HighlightError::Message("cannot detect language, use -l".to_string()))?;
    let language: Rc<LanguageDefinition> = manager
        .get_language(&name)
        .ok_or_else(|| HighlightError::UnknownLanguage(name.clone()))?;

    let mut highlighter = manager.highlighter(&name)?;
    let mut cache = HighlightCache::new();
    let count = cache.update(&mut highlighter, &lines);
    log::debug!("highlighted {} lines as {}", count, name);

    let stdout = io::stdout();
    let color = config.color && stdout.is_terminal();
    let mut renderer = Renderer::new(stdout.lock());
    renderer.color = color;
    renderer.line_numbers = config.show_line_numbers;
    renderer.tab_width = config.tab_width;

    for (i, line) in lines.iter().enumerate() {
        let spans = cache.spans(i).unwrap_or(&[]);
        if opts.spans {
            renderer.write_spans(i + 1, spans, &language)?;
        } else {
            renderer.write_line(i + 1, line, spans, &language, &manager)?;
        }
    }
    renderer.flush()?;

    Ok(())
}

fn print_usage() {
    println!("genhl {} - generic syntax highlighter", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: genhl [OPTIONS] [FILE]");
    println!();
    println!("Reads standard input when FILE is missing or '-'.");
    println!();
    println!("Options:");
    println!("  -l, --language NAME     Highlight as language NAME");
    println!("  -d, --definition FILE   Load a TOML language definition and use it");
    println!("      --spans             Print the span table instead of colored text");
    println!("      --list              List available languages");
    println!("  -h, --help              Show this help message");
    println!("  -V, --version           Show version information");
    println!();
    println!("Settings are read from ~/.genhl.conf; set RUST_LOG=debug for diagnostics.");
}

fn print_version() {
    println!("genhl {}", env!("CARGO_PKG_VERSION"));
    println!("Context-stack highlighting of Kate-style language definitions");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("genhl").chain(list.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn test_parse_args() {
        let opts = parse_args(&args(&["-l", "Ruby", "--spans", "a.txt"])).unwrap().unwrap();
        assert_eq!(opts.language.as_deref(), Some("Ruby"));
        assert!(opts.spans);
        assert_eq!(opts.file, Some(PathBuf::from("a.txt")));

        let opts = parse_args(&args(&["-d", "x.toml", "-"])).unwrap().unwrap();
        assert_eq!(opts.definition, Some(PathBuf::from("x.toml")));
        assert_eq!(opts.file, None);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["-l"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }
}
